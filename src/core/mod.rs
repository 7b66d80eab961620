pub mod config;
pub mod embed;
pub mod engine;
pub mod identity;
pub mod links;
pub mod mirror;
pub mod note;
pub mod parser;
pub mod publisher;
pub mod report;
pub mod scanner;
pub mod staleness;

// 重新导出常用类型
pub use config::{ConfigOverrides, MirrorConfig, PublishConfig, StoreConfig};
pub use embed::{EmbedIssue, EmbedResolver, ResolvedContent};
pub use engine::Engine;
pub use identity::ensure_identity;
pub use links::rewrite_links;
pub use mirror::{MirrorTarget, MirrorWriter};
pub use note::{FrontmatterDelta, Note};
pub use publisher::{PublishReport, Publisher};
pub use report::{NoteFailure, NoteOutcome, RunSummary};
pub use scanner::VaultIndex;
pub use staleness::{needs_publish, RemoteIndex, SkipReason, Staleness};
