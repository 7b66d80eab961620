//! git 镜像
//!
//! 镜像目录布局：
//!
//! ```text
//! <mirror_root>/<rel_dir>/<Note>.md
//! <mirror_root>/images/<image>
//! ```
//!
//! `rel_dir` 为笔记所在目录相对于配置子目录的路径。
//! 只有同时满足以下条件的笔记才会被镜像：
//! 1. 配置了镜像根目录与子目录
//! 2. 笔记位于子目录下
//! 3. 笔记 frontmatter 中已经声明了 `gitURL` 字段

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

use crate::core::config::MirrorConfig;
use crate::core::note::{FrontmatterDelta, Note};
use crate::core::parser::wiki_link::{
    encode_uri, encode_uri_component, image_basename, render_image_embeds,
};
use crate::core::report::NoteFailure;
use crate::core::scanner::VaultIndex;
use crate::storage::NoteFs;

/// 镜像中共享的图片目录
pub const IMAGES_DIR: &str = "images";

/// 一篇笔记的镜像位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTarget {
    /// 相对镜像根目录的目录
    pub rel_dir: PathBuf,
    /// 镜像文件的绝对路径
    pub file_path: PathBuf,
    /// 镜像文件的公开 URL
    pub url: String,
}

/// 计算笔记的镜像位置，不满足镜像条件时返回 `None`
pub fn resolve_target(config: &MirrorConfig, vault_root: &Path, note: &Note) -> Option<MirrorTarget> {
    let (Some(root), Some(subdir)) = (&config.root, &config.subdir) else {
        return None;
    };
    if !note.frontmatter.has_git_url() {
        return None;
    }

    let subdir_abs = vault_root.join(subdir);
    let note_dir = note.path.parent()?;
    let rel_dir = note_dir.strip_prefix(&subdir_abs).ok()?.to_path_buf();
    let file_name = note.file_name();

    let mut segments: Vec<String> = rel_dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(encode_uri_component(&s.to_string_lossy())),
            _ => None,
        })
        .collect();
    segments.push(encode_uri_component(&file_name));
    let rel_url = segments.join("/");

    let url = match &config.url_prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), rel_url),
        None => rel_url,
    };

    Some(MirrorTarget {
        file_path: root.join(&rel_dir).join(&file_name),
        rel_dir,
        url,
    })
}

/// 镜像 URL 与 frontmatter 中记录的不一致时返回更新
pub fn url_delta(target: &MirrorTarget, note: &Note) -> FrontmatterDelta {
    if note.frontmatter.git_url().as_deref() == Some(target.url.as_str()) {
        return FrontmatterDelta::default();
    }
    FrontmatterDelta {
        git_url: Some(target.url.clone()),
        ..Default::default()
    }
}

/// 从镜像笔记指向共享图片目录的相对链接
pub fn image_link(rel_dir: &Path, image: &str) -> String {
    let depth = rel_dir
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();
    let mut link = "../".repeat(depth);
    link.push_str(IMAGES_DIR);
    link.push('/');
    link.push_str(image_basename(image));
    encode_uri(&link)
}

pub fn hash_content(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// 复制文件，目标内容相同时跳过
///
/// # Returns
///
/// 是否实际写入
pub fn copy_if_changed(fs: &dyn NoteFs, source: &Path, target: &Path) -> Result<bool> {
    let content = fs
        .read(source)
        .with_context(|| format!("Failed to read {:?}", source))?;

    if fs.exists(target) {
        if let Ok(existing) = fs.read(target) {
            if hash_content(&existing) == hash_content(&content) {
                return Ok(false);
            }
        }
    }

    if let Some(parent) = target.parent() {
        fs.create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    fs.write(target, &content)
        .with_context(|| format!("Failed to write {:?}", target))?;
    Ok(true)
}

/// 镜像写入器
pub struct MirrorWriter<'a> {
    fs: &'a dyn NoteFs,
    vault: &'a VaultIndex,
    root: &'a Path,
}

impl<'a> MirrorWriter<'a> {
    pub fn new(fs: &'a dyn NoteFs, vault: &'a VaultIndex, root: &'a Path) -> Self {
        Self { fs, vault, root }
    }

    /// 把笔记写入镜像
    ///
    /// 图片复制到共享目录，嵌入改写为相对链接；复制失败的图片保留原始标记。
    /// 镜像文件不包含 frontmatter。
    ///
    /// # Returns
    ///
    /// (是否写入镜像文件, 失败列表)
    pub fn write(&self, target: &MirrorTarget, content: &str, images: &[String]) -> (bool, Vec<NoteFailure>) {
        let mut failures = Vec::new();
        let mut copied = Vec::new();
        let images_dir = self.root.join(IMAGES_DIR);

        for image in images {
            let Some(source) = self.vault.find_file(image) else {
                failures.push(NoteFailure::new(
                    format!("locate image {}", image),
                    "not found in vault",
                ));
                continue;
            };
            match copy_if_changed(self.fs, source, &images_dir.join(image_basename(image))) {
                Ok(written) => {
                    if written {
                        tracing::debug!("Copied image {} into mirror", image);
                    }
                    copied.push(image.as_str());
                }
                Err(e) => failures.push(NoteFailure::new(
                    format!("copy image {}", image),
                    format!("{:#}", e),
                )),
            }
        }

        let mirrored = render_image_embeds(content, |name| {
            copied
                .contains(&name)
                .then(|| image_link(&target.rel_dir, name))
        });

        let result = target
            .file_path
            .parent()
            .map(|parent| self.fs.create_dir_all(parent))
            .transpose()
            .and_then(|_| self.fs.write(&target.file_path, mirrored.as_bytes()));

        match result {
            Ok(()) => (true, failures),
            Err(e) => {
                failures.push(NoteFailure::new(
                    "write mirror file",
                    format!("{:?}: {}", target.file_path, e),
                ));
                (false, failures)
            }
        }
    }
}
