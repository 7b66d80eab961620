//! 镜像仓库集成测试

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vaultsync::vcs::{commit_mirror, CommitInfo, MirrorRepo};

fn commit_count(root: &Path) -> usize {
    let repo = git2::Repository::open(root).unwrap();
    let mut revwalk = repo.revwalk().unwrap();
    revwalk.push_head().unwrap();
    revwalk.count()
}

#[test]
fn test_commit_info_short() {
    let info = CommitInfo {
        oid: "abc123456789".to_string(),
        message: "Publish 2 note(s)".to_string(),
        author: "Test <test@example.com>".to_string(),
        timestamp: "2024-01-01 00:00:00".to_string(),
    };

    assert_eq!(info.to_short(), "abc1234 - Publish 2 note(s)");
}

#[test]
fn test_commit_info_short_with_short_oid() {
    let info = CommitInfo {
        oid: "abc".to_string(),
        message: "Publish 1 note(s)\n".to_string(),
        author: "Test <test@example.com>".to_string(),
        timestamp: "2024-01-01 00:00:00".to_string(),
    };

    assert_eq!(info.to_short(), "abc - Publish 1 note(s)");
}

#[test]
fn test_commit_mirror_initializes_repo() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("Note.md"), "body").unwrap();

    let commit = commit_mirror(temp.path(), 1).unwrap().unwrap();
    assert!(temp.path().join(".git").exists());
    assert!(commit.message.contains("Publish 1 note(s)"));
    assert!(!commit.author.is_empty());
    assert_eq!(commit.timestamp.len(), "2024-01-01 00:00:00".len());

    let repo = MirrorRepo::open_or_init(temp.path()).unwrap();
    assert_eq!(repo.head_info().unwrap(), Some(commit));
}

#[test]
fn test_commit_mirror_skips_unchanged_tree() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("images")).unwrap();
    fs::write(temp.path().join("images/a.png"), [0u8, 1]).unwrap();

    assert!(commit_mirror(temp.path(), 1).unwrap().is_some());
    assert!(commit_mirror(temp.path(), 0).unwrap().is_none());

    assert_eq!(commit_count(temp.path()), 1);
}

#[test]
fn test_commit_mirror_picks_up_nested_files() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a.md"), "a").unwrap();
    commit_mirror(temp.path(), 1).unwrap();

    fs::create_dir_all(temp.path().join("topics/deep")).unwrap();
    fs::write(temp.path().join("topics/deep/b.md"), "b").unwrap();
    assert!(commit_mirror(temp.path(), 1).unwrap().is_some());

    assert_eq!(commit_count(temp.path()), 2);
}
