//! 镜像仓库的 Git 操作
//!
//! 使用 libgit2 (git2 crate)，不依赖系统 git 命令

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use git2::{IndexAddOption, Oid, Repository, Signature};
use std::path::{Path, PathBuf};

use crate::vcs::CommitInfo;

/// 没有配置 user.name/user.email 时使用的作者
pub const FALLBACK_AUTHOR: &str = "vaultsync <vaultsync@localhost>";

/// 镜像仓库
pub struct MirrorRepo {
    repo: Repository,
    path: PathBuf,
}

impl MirrorRepo {
    /// 打开镜像仓库，不存在时初始化
    pub fn open_or_init(root: &Path) -> Result<Self> {
        if !root.join(".git").exists() {
            Repository::init(root)
                .with_context(|| format!("Failed to init git repo at {:?}", root))?;
            tracing::info!("Initialized mirror repository at {:?}", root);
        }

        let repo = Repository::open(root)
            .with_context(|| format!("Failed to open git repo at {:?}", root))?;

        Ok(Self {
            repo,
            path: root.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 暂存工作区内的全部文件
    pub fn stage_all(&self) -> Result<()> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// 暂存全部文件并提交
    ///
    /// 暂存后的树与 HEAD 相同时不提交
    ///
    /// # Returns
    ///
    /// 新提交的 OID，没有变更时为 `None`
    pub fn commit_if_changed(&self, message: &str) -> Result<Option<Oid>> {
        self.stage_all()?;

        let tree_oid = self.repo.index()?.write_tree()?;
        let parent = self.head_commit()?;
        if let Some(parent) = &parent {
            if parent.tree_id() == tree_oid {
                tracing::debug!("Mirror tree unchanged, skipping commit");
                return Ok(None);
            }
        }

        let tree = self.repo.find_tree(tree_oid)?;
        let signature = parse_signature(&self.default_author())?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .context("Failed to create mirror commit")?;

        Ok(Some(oid))
    }

    /// 获取当前 HEAD 的提交信息
    pub fn head_info(&self) -> Result<Option<CommitInfo>> {
        Ok(self.head_commit()?.as_ref().map(commit_info))
    }

    /// 作者：优先读取 git config，其次使用默认值
    fn default_author(&self) -> String {
        if let Ok(config) = self.repo.config() {
            if let (Ok(name), Ok(email)) = (
                config.get_string("user.name"),
                config.get_string("user.email"),
            ) {
                return format!("{} <{}>", name, email);
            }
        }
        FALLBACK_AUTHOR.to_string()
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Some(head.peel_to_commit()?))
    }
}

fn commit_info(commit: &git2::Commit<'_>) -> CommitInfo {
    CommitInfo {
        oid: commit.id().to_string(),
        message: commit.message().unwrap_or("").to_string(),
        author: commit.author().to_string(),
        timestamp: format_timestamp(commit.time()),
    }
}

/// 格式化 git2::Time 为字符串
fn format_timestamp(time: git2::Time) -> String {
    let datetime: DateTime<Utc> = Utc
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_default();
    datetime.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 解析 `Name <email>` 格式的作者
fn parse_signature(author: &str) -> Result<Signature<'static>> {
    let time = git2::Time::new(Utc::now().timestamp(), 0);

    let (name, email) = match author.split_once('<') {
        Some((name, email)) => (name.trim(), email.trim_end_matches('>').trim()),
        None => (author.trim(), author.trim()),
    };
    Signature::new(name, email, &time).map_err(|e| anyhow!("Invalid author {:?}: {}", author, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_or_init() {
        let temp = TempDir::new().unwrap();
        let repo = MirrorRepo::open_or_init(temp.path()).unwrap();
        assert!(temp.path().join(".git").exists());
        assert_eq!(repo.path(), temp.path());
        assert!(repo.head_info().unwrap().is_none());

        // 再次打开已有仓库
        assert!(MirrorRepo::open_or_init(temp.path()).is_ok());
    }

    #[test]
    fn test_commit_if_changed() {
        let temp = TempDir::new().unwrap();
        let repo = MirrorRepo::open_or_init(temp.path()).unwrap();

        fs::create_dir_all(temp.path().join("images")).unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();
        fs::write(temp.path().join("images/p.png"), [1u8]).unwrap();

        let first = repo.commit_if_changed("Publish 1 note(s)").unwrap();
        assert!(first.is_some());

        // 没有变化时不提交
        assert!(repo.commit_if_changed("Publish 0 note(s)").unwrap().is_none());

        fs::write(temp.path().join("a.md"), "a2").unwrap();
        let second = repo.commit_if_changed("Publish 1 note(s)").unwrap();
        assert!(second.is_some());
        assert_ne!(first, second);

        let head = repo.head_info().unwrap().unwrap();
        assert_eq!(Some(head.oid), second.map(|oid| oid.to_string()));
        assert!(head.message.contains("Publish 1 note(s)"));

        let parent = repo.repo.find_commit(second.unwrap()).unwrap().parent_id(0).unwrap();
        assert_eq!(Some(parent), first);
    }

    #[test]
    fn test_parse_signature() {
        let sig = parse_signature("User Name <user@example.com>").unwrap();
        assert_eq!(sig.name(), Some("User Name"));
        assert_eq!(sig.email(), Some("user@example.com"));

        let sig = parse_signature("SimpleUser").unwrap();
        assert_eq!(sig.name(), Some("SimpleUser"));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = format_timestamp(git2::Time::new(0, 0));
        assert_eq!(ts, "1970-01-01 00:00:00");
    }
}
