//! 双通道发布
//!
//! 1. 对象存储：笔记以 `{guid}.md` 上传，图片以去掉目录的文件名上传，均覆盖写入
//! 2. git 镜像：仅对满足镜像条件的笔记，写入去掉 frontmatter 的副本
//!
//! 两个通道得到同一内容的两种渲染：对象存储中的图片指向同名对象，
//! 镜像中的图片指向共享的 `images/` 目录。
//!
//! 调用前 frontmatter 必须已经落盘。

use futures_util::future::join_all;
use std::path::Path;

use crate::core::mirror::{MirrorTarget, MirrorWriter};
use crate::core::note::Note;
use crate::core::parser::frontmatter::render_document;
use crate::core::parser::wiki_link::{encode_uri, image_basename, render_image_embeds};
use crate::core::report::NoteFailure;
use crate::core::scanner::VaultIndex;
use crate::storage::{NoteFs, ObjectStore};

/// 单篇笔记的发布结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: bool,
    pub images_uploaded: usize,
    pub mirrored: bool,
    pub failures: Vec<NoteFailure>,
}

/// 渲染对象存储中的笔记正文
///
/// frontmatter + `# 标题` + 分隔线 + 内容，图片嵌入改为同名对象链接
pub fn render_object_body(note: &Note, content: &str) -> anyhow::Result<String> {
    let content = render_image_embeds(content, |name| Some(encode_uri(image_basename(name))));
    let body = format!("# {}\n\n---\n\n{}", note.name(), content);
    render_document(&note.frontmatter, &body)
}

/// 发布器
pub struct Publisher<'a> {
    store: &'a dyn ObjectStore,
    fs: &'a dyn NoteFs,
    vault: &'a VaultIndex,
    mirror_root: Option<&'a Path>,
}

impl<'a> Publisher<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        fs: &'a dyn NoteFs,
        vault: &'a VaultIndex,
        mirror_root: Option<&'a Path>,
    ) -> Self {
        Self {
            store,
            fs,
            vault,
            mirror_root,
        }
    }

    /// 发布一篇笔记
    ///
    /// 上传失败不会中断其他上传，所有失败收集到报告中
    ///
    /// # Arguments
    ///
    /// * `note` - 已分配 guid 的笔记
    /// * `content` - 嵌入与链接处理后的正文
    /// * `images` - 需要上传的图片文件名
    /// * `mirror` - 镜像位置，`None` 表示不镜像
    pub async fn publish(
        &self,
        note: &Note,
        content: &str,
        images: &[String],
        mirror: Option<&MirrorTarget>,
    ) -> PublishReport {
        let mut report = PublishReport::default();

        let Some(key) = note.object_key() else {
            report
                .failures
                .push(NoteFailure::new("upload note", "note has no guid"));
            return report;
        };

        let note_upload = async {
            let body = render_object_body(note, content)?;
            self.store.put(&key, body.into_bytes()).await
        };
        let image_uploads = join_all(images.iter().map(|name| self.upload_image(name)));
        let (note_result, image_results) = tokio::join!(note_upload, image_uploads);

        match note_result {
            Ok(()) => {
                report.uploaded = true;
                tracing::debug!("Uploaded {} for {:?}", key, note.path);
            }
            Err(e) => report
                .failures
                .push(NoteFailure::new(format!("upload note {}", key), format!("{:#}", e))),
        }
        for result in image_results {
            match result {
                Ok(()) => report.images_uploaded += 1,
                Err(failure) => report.failures.push(failure),
            }
        }

        if let (Some(target), Some(root)) = (mirror, self.mirror_root) {
            let writer = MirrorWriter::new(self.fs, self.vault, root);
            let (mirrored, failures) = writer.write(target, content, images);
            report.mirrored = mirrored;
            report.failures.extend(failures);
            if mirrored {
                tracing::debug!("Mirrored {:?} to {:?}", note.path, target.file_path);
            }
        }

        report
    }

    async fn upload_image(&self, name: &str) -> Result<(), NoteFailure> {
        let operation = format!("upload image {}", name);
        let path = self
            .vault
            .find_file(name)
            .ok_or_else(|| NoteFailure::new(operation.as_str(), "not found in vault"))?;
        let bytes = self
            .fs
            .read(path)
            .map_err(|e| NoteFailure::new(operation.as_str(), format!("{:?}: {}", path, e)))?;
        self.store
            .put(image_basename(name), bytes)
            .await
            .map_err(|e| NoteFailure::new(operation.as_str(), format!("{:#}", e)))
    }
}
