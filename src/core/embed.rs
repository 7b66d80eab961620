//! 嵌入解析
//!
//! 把 `![[笔记]]` 替换成被嵌入笔记的正文（去掉其 frontmatter），
//! 被嵌入的正文中的嵌入继续展开，直到不再有可展开的笔记嵌入。
//! 图片嵌入保留原样，只收集文件名，交给发布阶段按渠道渲染。
//!
//! 展开沿嵌入路径维护一个栈：
//! - 目标已在栈中 -> 循环，保留标记并记录
//! - 栈深度超过上限 -> 保留标记并记录
//! - 找不到目标 -> 保留标记并记录

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::parser::frontmatter::{strip_frontmatter, Frontmatter};
use crate::core::parser::wiki_link::{is_image_name, replace_refs, EmbedKind};
use crate::core::scanner::VaultIndex;
use crate::storage::NoteFs;

/// 默认最大嵌入深度
pub const DEFAULT_MAX_EMBED_DEPTH: usize = 16;

/// 嵌入解析中发现的问题，均不致命
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbedIssue {
    /// 笔记库中没有同名笔记
    Missing { name: String },
    /// 嵌入形成循环，`chain` 为循环路径上的笔记名
    Cycle { chain: Vec<String> },
    /// 超过最大嵌入深度
    TooDeep { name: String },
    /// 读取被嵌入笔记失败
    Unreadable { name: String, error: String },
}

impl fmt::Display for EmbedIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedIssue::Missing { name } => write!(f, "embed target not found: {}", name),
            EmbedIssue::Cycle { chain } => write!(f, "embed cycle: {}", chain.join(" -> ")),
            EmbedIssue::TooDeep { name } => write!(f, "embed depth limit reached at: {}", name),
            EmbedIssue::Unreadable { name, error } => {
                write!(f, "failed to read embedded note {}: {}", name, error)
            }
        }
    }
}

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedContent {
    /// 展开后的正文，图片嵌入仍为 `![[name]]`
    pub content: String,
    /// 需要上传的图片文件名（去重，保持出现顺序）
    pub images: Vec<String>,
    pub issues: Vec<EmbedIssue>,
}

#[derive(Default)]
struct ExpandState {
    images: Vec<String>,
    issues: Vec<EmbedIssue>,
    bodies: HashMap<PathBuf, Result<String, String>>,
}

impl ExpandState {
    fn add_image(&mut self, name: &str) {
        if !self.images.iter().any(|i| i == name) {
            self.images.push(name.to_string());
        }
    }
}

/// 嵌入解析器
pub struct EmbedResolver<'a> {
    vault: &'a VaultIndex,
    fs: &'a dyn NoteFs,
    max_depth: usize,
}

impl<'a> EmbedResolver<'a> {
    pub fn new(vault: &'a VaultIndex, fs: &'a dyn NoteFs, max_depth: usize) -> Self {
        Self {
            vault,
            fs,
            max_depth,
        }
    }

    /// 展开笔记正文中的嵌入
    ///
    /// # Arguments
    ///
    /// * `note_path` - 当前笔记路径，自身嵌入按循环处理
    /// * `content` - 正文
    /// * `frontmatter` - 当前笔记的 frontmatter，`links` 中的 `img` 也会被上传
    pub fn resolve(&self, note_path: &Path, content: &str, frontmatter: &Frontmatter) -> ResolvedContent {
        let mut state = ExpandState::default();
        let mut stack = vec![note_path.to_path_buf()];

        let content = self.expand(content, &mut stack, &mut state);

        for name in frontmatter.image_links() {
            if is_image_name(&name) {
                state.add_image(&name);
            } else {
                tracing::debug!("Ignoring non-image front matter link {:?}", name);
            }
        }

        ResolvedContent {
            content,
            images: state.images,
            issues: state.issues,
        }
    }

    fn expand(&self, content: &str, stack: &mut Vec<PathBuf>, state: &mut ExpandState) -> String {
        replace_refs(content, |r| {
            if !r.embed {
                return None;
            }
            match EmbedKind::classify(&r.target) {
                EmbedKind::Image(name) => {
                    state.add_image(&name);
                    None
                }
                EmbedKind::Note(name) => self.splice(&name, stack, state),
            }
        })
    }

    /// 返回替换嵌入标记的文本；`None` 表示保留标记
    fn splice(&self, name: &str, stack: &mut Vec<PathBuf>, state: &mut ExpandState) -> Option<String> {
        let Some(path) = self.vault.find_note(name) else {
            state.issues.push(EmbedIssue::Missing {
                name: name.to_string(),
            });
            return None;
        };

        if stack.iter().any(|p| p == path) {
            let mut chain: Vec<String> = stack.iter().map(|p| note_name(p)).collect();
            chain.push(note_name(path));
            state.issues.push(EmbedIssue::Cycle { chain });
            return None;
        }

        if stack.len() > self.max_depth {
            state.issues.push(EmbedIssue::TooDeep {
                name: name.to_string(),
            });
            return None;
        }

        let body = state
            .bodies
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                self.fs
                    .read_to_string(path)
                    .map(|raw| strip_frontmatter(&raw).trim_end_matches(['\n', '\r']).to_string())
                    .map_err(|e| e.to_string())
            })
            .clone();

        let body = match body {
            Ok(body) => body,
            Err(error) => {
                state.issues.push(EmbedIssue::Unreadable {
                    name: name.to_string(),
                    error,
                });
                return None;
            }
        };

        stack.push(path.to_path_buf());
        let expanded = self.expand(&body, stack, state);
        stack.pop();
        Some(expanded)
    }
}

fn note_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
