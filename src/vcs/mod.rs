//! 版本控制模块
//!
//! 发布结束后把 git 镜像工作区提交为一个新版本

pub mod git_engine;

pub use git_engine::MirrorRepo;

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

/// 提交镜像工作区
///
/// # Arguments
///
/// * `root` - 镜像仓库根目录
/// * `published` - 本次发布的笔记数，写入提交消息
///
/// # Returns
///
/// 新提交的信息，没有变更时为 `None`
pub fn commit_mirror(root: &Path, published: usize) -> Result<Option<CommitInfo>> {
    let repo = MirrorRepo::open_or_init(root)?;
    let message = format!("Publish {} note(s)", published);
    if repo.commit_if_changed(&message)?.is_none() {
        return Ok(None);
    }

    let head = repo.head_info()?;
    if let Some(head) = &head {
        tracing::info!("Mirror HEAD: {}", head.to_short());
    }
    Ok(head)
}

/// 提交信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Git OID
    pub oid: String,
    /// 提交消息
    pub message: String,
    /// 作者
    pub author: String,
    /// 时间戳
    pub timestamp: String,
}

impl CommitInfo {
    /// 简短格式（用于 --oneline）
    pub fn to_short(&self) -> String {
        let short_oid = &self.oid[..self.oid.len().min(7)];
        format!("{} - {}", short_oid, self.message.trim_end())
    }
}
