//! 文件系统抽象
//!
//! 引擎对笔记、镜像目录的所有读写都经过 [`NoteFs`]，
//! 测试可以包装 [`LocalFs`] 来统计写入次数。

use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

/// 文件时间戳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTimes {
    /// 最后修改时间
    pub modified: DateTime<Utc>,
    /// 创建时间（文件系统不支持时回退为修改时间）
    pub created: DateTime<Utc>,
}

/// 引擎使用的文件系统操作
pub trait NoteFs: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// 原子写入：先写临时文件再重命名
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    fn times(&self, path: &Path) -> io::Result<FileTimes>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// 本地磁盘实现
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl NoteFs for LocalFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        Ok(())
    }

    fn times(&self, path: &Path) -> io::Result<FileTimes> {
        let meta = fs::metadata(path)?;
        let modified = meta.modified()?;
        let created = meta.created().unwrap_or(modified);
        Ok(FileTimes {
            modified: to_utc(modified),
            created: to_utc(created),
        })
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub(crate) fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}
