//! 笔记数据模型
//!
//! 每次运行都重新从磁盘读取；只有在分配身份或镜像 URL 时才回写 frontmatter。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::core::parser::frontmatter::{self, Frontmatter, KEY_CREATED, KEY_GIT_URL, KEY_GUID};
use crate::storage::NoteFs;

/// 远端对象键：`{guid}.md`
pub fn object_key(guid: &str) -> String {
    format!("{}.md", guid)
}

/// 一篇笔记
#[derive(Debug, Clone)]
pub struct Note {
    /// 文件路径，本地状态的唯一标识
    pub path: PathBuf,
    pub frontmatter: Frontmatter,
    /// 去掉 frontmatter 后的 Markdown 正文
    pub body: String,
    pub modified: DateTime<Utc>,
    pub created: DateTime<Utc>,
}

impl Note {
    /// 从文件系统读取笔记
    pub fn load(fs: &dyn NoteFs, path: &Path) -> Result<Self> {
        let content = fs
            .read_to_string(path)
            .with_context(|| format!("Failed to read note {:?}", path))?;
        let times = fs
            .times(path)
            .with_context(|| format!("Failed to stat note {:?}", path))?;

        let (yaml, body) = frontmatter::split_frontmatter(&content);
        let frontmatter = match yaml {
            Some(yaml) => Frontmatter::parse(yaml)
                .with_context(|| format!("Failed to parse front matter of {:?}", path))?,
            None => Frontmatter::new(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            frontmatter,
            body: body.to_string(),
            modified: times.modified,
            created: times.created,
        })
    }

    /// 文件名去掉扩展名，即笔记名
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn object_key(&self) -> Option<String> {
        self.frontmatter.guid().map(|guid| object_key(&guid))
    }

    /// 在内存中应用 frontmatter 变更
    pub fn apply(&mut self, delta: &FrontmatterDelta) {
        delta.apply_to(&mut self.frontmatter);
    }

    /// 渲染完整文件内容（frontmatter + 正文）
    pub fn render(&self) -> Result<String> {
        frontmatter::render_document(&self.frontmatter, &self.body)
    }

    /// 把当前 frontmatter 写回文件，并刷新修改时间
    ///
    /// 所有对笔记文件的写入都经过这里
    pub fn persist(&mut self, fs: &dyn NoteFs) -> Result<()> {
        let rendered = self.render()?;
        fs.write(&self.path, rendered.as_bytes())
            .with_context(|| format!("Failed to rewrite front matter of {:?}", self.path))?;

        let times = fs
            .times(&self.path)
            .with_context(|| format!("Failed to stat note {:?}", self.path))?;
        self.modified = times.modified;
        tracing::debug!("Rewrote front matter of {:?}", self.path);
        Ok(())
    }
}

/// frontmatter 变更
///
/// 身份分配与镜像 URL 计算都只返回变更，由 [`Note::persist`] 统一落盘
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrontmatterDelta {
    pub created: Option<String>,
    pub guid: Option<String>,
    pub git_url: Option<String>,
}

impl FrontmatterDelta {
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.guid.is_none() && self.git_url.is_none()
    }

    /// 合并两个变更，`other` 中的字段优先
    pub fn merge(self, other: FrontmatterDelta) -> FrontmatterDelta {
        FrontmatterDelta {
            created: other.created.or(self.created),
            guid: other.guid.or(self.guid),
            git_url: other.git_url.or(self.git_url),
        }
    }

    pub fn apply_to(&self, frontmatter: &mut Frontmatter) {
        if let Some(created) = &self.created {
            frontmatter.set_str(KEY_CREATED, created);
        }
        if let Some(guid) = &self.guid {
            frontmatter.set_str(KEY_GUID, guid);
        }
        if let Some(git_url) = &self.git_url {
            frontmatter.set_str(KEY_GIT_URL, git_url);
        }
    }
}
