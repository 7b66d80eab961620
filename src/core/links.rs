//! 链接改写
//!
//! 把 `[[目标]]` 改写为指向目标笔记的相对路径链接 `[目标](../dir/目标.md)`，
//! 发布后的文档无需笔记库的名称解析也能跳转。

use std::path::Path;

use crate::core::parser::wiki_link::{encode_uri, is_url_like, replace_refs};
use crate::core::scanner::VaultIndex;

/// 改写结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenLinks {
    pub content: String,
    /// 找不到目标、原样保留的链接
    pub unresolved: Vec<String>,
}

/// 改写笔记中的 wiki 链接
///
/// # Arguments
///
/// * `content` - 正文
/// * `note_path` - 当前笔记路径，相对路径以其所在目录为基准
/// * `vault` - 笔记库索引
pub fn rewrite_links(content: &str, note_path: &Path, vault: &VaultIndex) -> RewrittenLinks {
    let base = note_path.parent().unwrap_or_else(|| Path::new(""));
    let mut unresolved = Vec::new();

    let content = replace_refs(content, |r| {
        if r.embed || is_url_like(&r.target) {
            return None;
        }

        let Some(target) = vault.find_note(&r.target) else {
            if !unresolved.contains(&r.target) {
                unresolved.push(r.target.clone());
            }
            return None;
        };

        let relative = pathdiff::diff_paths(target, base)?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        Some(format!("[{}]({})", r.display(), encode_uri(&relative)))
    });

    RewrittenLinks {
        content,
        unresolved,
    }
}
