//! 存储层模块
//!
//! ## 模块结构
//!
//! - [`fs`](fs::NoteFs) - 本地文件系统抽象（笔记与镜像读写）
//! - [`object_store`](object_store::ObjectStore) - 远端对象存储

pub mod fs;
pub mod object_store;

pub use fs::{FileTimes, LocalFs, NoteFs};
pub use object_store::{DirectoryStore, ListPage, MemoryStore, ObjectEntry, ObjectStore};
