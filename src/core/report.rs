//! 运行结果
//!
//! 每篇笔记得到一个 [`NoteOutcome`]，整次运行汇总为 [`RunSummary`]。

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::staleness::SkipReason;
use crate::vcs::CommitInfo;

/// 单篇笔记内可恢复的失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteFailure {
    /// 失败的操作，例如 `upload note`、`copy image diagram.png`
    pub operation: String,
    pub detail: String,
}

impl NoteFailure {
    pub fn new(operation: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for NoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.detail)
    }
}

/// 单篇笔记的处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NoteOutcome {
    /// 已发布（可能带部分失败）
    Published {
        path: PathBuf,
        guid: String,
        front_matter_rewritten: bool,
        uploaded: bool,
        images_uploaded: usize,
        mirrored: bool,
        /// 嵌入或链接无法解析等编写问题
        warnings: Vec<String>,
        failures: Vec<NoteFailure>,
    },
    /// dry-run 下将会发布
    Planned {
        path: PathBuf,
        guid: Option<String>,
        front_matter_rewrite: bool,
        mirror: bool,
    },
    /// 跳过
    Skipped {
        path: PathBuf,
        reason: SkipReason,
        front_matter_rewritten: bool,
    },
    /// 处理中止
    Failed { path: PathBuf, failure: NoteFailure },
}

impl NoteOutcome {
    pub fn path(&self) -> &Path {
        match self {
            NoteOutcome::Published { path, .. }
            | NoteOutcome::Planned { path, .. }
            | NoteOutcome::Skipped { path, .. }
            | NoteOutcome::Failed { path, .. } => path,
        }
    }

    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// frontmatter 是否被改写
    pub fn front_matter_rewritten(&self) -> bool {
        match self {
            NoteOutcome::Published {
                front_matter_rewritten,
                ..
            }
            | NoteOutcome::Skipped {
                front_matter_rewritten,
                ..
            } => *front_matter_rewritten,
            NoteOutcome::Planned {
                front_matter_rewrite,
                ..
            } => *front_matter_rewrite,
            NoteOutcome::Failed { .. } => false,
        }
    }

    /// 本次运行是否触及该笔记（发布、计划发布或改写了 frontmatter）
    pub fn is_touched(&self) -> bool {
        match self {
            NoteOutcome::Published { .. } | NoteOutcome::Planned { .. } => true,
            NoteOutcome::Skipped {
                front_matter_rewritten,
                ..
            } => *front_matter_rewritten,
            NoteOutcome::Failed { .. } => false,
        }
    }

    pub fn failures(&self) -> Vec<&NoteFailure> {
        match self {
            NoteOutcome::Published { failures, .. } => failures.iter().collect(),
            NoteOutcome::Failed { failure, .. } => vec![failure],
            _ => Vec::new(),
        }
    }
}

/// 运行汇总
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub outcomes: Vec<NoteOutcome>,
    /// 镜像仓库的新提交
    pub mirror_commit: Option<CommitInfo>,
    pub mirror_commit_error: Option<String>,
}

impl RunSummary {
    pub fn new(dry_run: bool, mut outcomes: Vec<NoteOutcome>) -> Self {
        outcomes.sort_by(|a, b| a.path().cmp(b.path()));
        Self {
            dry_run,
            outcomes,
            mirror_commit: None,
            mirror_commit_error: None,
        }
    }

    pub fn published_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NoteOutcome::Published { .. } | NoteOutcome::Planned { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NoteOutcome::Skipped { .. }))
            .count()
    }

    pub fn mirrored_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NoteOutcome::Published { mirrored: true, .. }))
            .count()
    }

    /// 所有失败，附带笔记路径
    pub fn failures(&self) -> Vec<(&Path, &NoteFailure)> {
        self.outcomes
            .iter()
            .flat_map(|o| o.failures().into_iter().map(move |f| (o.path(), f)))
            .collect()
    }

    /// 是否存在单篇笔记的失败（镜像提交失败不计入）
    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }

    /// 面向终端的汇总文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        let title = if self.dry_run { "Publish Plan" } else { "Publish Summary" };
        out.push_str(&format!("\n=== {} ===\n", title));

        for outcome in self.outcomes.iter().filter(|o| o.is_touched()) {
            let guid = match outcome {
                NoteOutcome::Published { guid, .. } => guid.as_str(),
                NoteOutcome::Planned { guid, .. } => guid.as_deref().unwrap_or("(new)"),
                _ => "-",
            };
            let action = match outcome {
                NoteOutcome::Published { mirrored: true, .. } => "published+mirrored",
                NoteOutcome::Published { .. } => "published",
                NoteOutcome::Planned { mirror: true, .. } => "would publish+mirror",
                NoteOutcome::Planned { .. } => "would publish",
                _ => "front matter only",
            };
            out.push_str(&format!(
                "{}  guid={}  fileUpdated={}  {}\n",
                outcome.file_name(),
                guid,
                outcome.front_matter_rewritten(),
                action
            ));
        }

        out.push_str(&format!(
            "Notes published: {}\nNotes skipped: {}\nNotes mirrored: {}\n",
            self.published_count(),
            self.skipped_count(),
            self.mirrored_count()
        ));

        if let Some(commit) = &self.mirror_commit {
            out.push_str(&format!(
                "Mirror commit: {}  ({}, {})\n",
                commit.to_short(),
                commit.author,
                commit.timestamp
            ));
        }

        let failures = self.failures();
        if !failures.is_empty() || self.mirror_commit_error.is_some() {
            out.push_str("\nErrors:\n");
            for (path, failure) in failures {
                out.push_str(&format!("  - {}: {}\n", path.display(), failure));
            }
            if let Some(error) = &self.mirror_commit_error {
                out.push_str(&format!("  - mirror commit: {}\n", error));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::new(
            false,
            vec![
                NoteOutcome::Skipped {
                    path: PathBuf::from("/v/b.md"),
                    reason: SkipReason::NotPublished,
                    front_matter_rewritten: true,
                },
                NoteOutcome::Published {
                    path: PathBuf::from("/v/a.md"),
                    guid: "abcd1234".to_string(),
                    front_matter_rewritten: false,
                    uploaded: true,
                    images_uploaded: 0,
                    mirrored: true,
                    warnings: Vec::new(),
                    failures: vec![NoteFailure::new("upload image x.png", "boom")],
                },
                NoteOutcome::Failed {
                    path: PathBuf::from("/v/c.md"),
                    failure: NoteFailure::new("read note", "denied"),
                },
            ],
        );

        // 按路径排序
        assert_eq!(summary.outcomes[0].file_name(), "a.md");
        assert_eq!(summary.published_count(), 1);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.mirrored_count(), 1);
        assert_eq!(summary.failures().len(), 2);
        assert!(summary.has_failures());

        let text = summary.render();
        assert!(text.contains("a.md  guid=abcd1234  fileUpdated=false  published+mirrored"));
        assert!(text.contains("b.md  guid=-  fileUpdated=true  front matter only"));
        assert!(text.contains("upload image x.png: boom"));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary::new(
            true,
            vec![NoteOutcome::Planned {
                path: PathBuf::from("/v/a.md"),
                guid: None,
                front_matter_rewrite: true,
                mirror: false,
            }],
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcomes"][0]["status"], "planned");
        assert_eq!(json["dry_run"], true);
    }

    #[test]
    fn test_summary_shows_mirror_commit() {
        let mut summary = RunSummary::new(false, Vec::new());
        summary.mirror_commit = Some(CommitInfo {
            oid: "0123456789abcdef".to_string(),
            message: "Publish 1 note(s)\n".to_string(),
            author: "Test <test@example.com>".to_string(),
            timestamp: "2024-01-01 00:00:00".to_string(),
        });
        summary.mirror_commit_error = Some("index locked".to_string());

        let text = summary.render();
        assert!(text.contains(
            "Mirror commit: 0123456 - Publish 1 note(s)  (Test <test@example.com>, 2024-01-01 00:00:00)"
        ));
        assert!(text.contains("  - mirror commit: index locked"));
        assert!(!summary.has_failures());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["mirror_commit"]["oid"], "0123456789abcdef");
    }
}
