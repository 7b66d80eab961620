//! 发布引擎
//!
//! 一次运行的流程：
//!
//! 1. 扫描笔记库（失败则中止）
//! 2. 列举对象存储，构建远端快照（失败则中止）
//! 3. 以有限并发逐篇处理笔记：
//!    身份补全 -> 过期判定 -> 镜像 URL -> frontmatter 落盘 -> 嵌入展开 -> 链接改写 -> 发布
//! 4. 等待所有笔记完成，汇总结果
//! 5. 可选：提交镜像仓库
//!
//! 单篇笔记的失败只影响该笔记，记录在 [`NoteOutcome`] 中。

use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config::PublishConfig;
use crate::core::embed::EmbedResolver;
use crate::core::identity::ensure_identity;
use crate::core::links::rewrite_links;
use crate::core::mirror;
use crate::core::note::Note;
use crate::core::publisher::Publisher;
use crate::core::report::{NoteFailure, NoteOutcome, RunSummary};
use crate::core::scanner::VaultIndex;
use crate::core::staleness::{self, RemoteIndex, Staleness};
use crate::storage::{DirectoryStore, LocalFs, NoteFs, ObjectStore};
use crate::vcs;

/// 单次运行共享的只读状态
struct RunContext {
    vault: VaultIndex,
    index: RemoteIndex,
    dry_run: bool,
}

/// 发布引擎
pub struct Engine {
    config: PublishConfig,
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn NoteFs>,
}

impl Engine {
    /// 使用指定的对象存储与文件系统创建引擎
    pub fn new(config: PublishConfig, store: Arc<dyn ObjectStore>, fs: Arc<dyn NoteFs>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store, fs })
    }

    /// 按配置创建目录对象存储与本地文件系统
    pub fn from_config(config: PublishConfig) -> Result<Self> {
        let dir = config
            .store
            .dir
            .clone()
            .context("No object store configured (set store.dir or PUBLISH_STORE_DIR)")?;
        let store = DirectoryStore::new(dir, config.store.page_size);
        Self::new(config, Arc::new(store), Arc::new(LocalFs))
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// 列举对象存储，构建远端快照
    pub async fn build_index(&self) -> Result<RemoteIndex> {
        RemoteIndex::build(self.store.as_ref()).await
    }

    /// 执行一次发布
    ///
    /// # Arguments
    ///
    /// * `dry_run` - 只判定不写入：不改写笔记、不上传、不写镜像
    ///
    /// # Returns
    ///
    /// 所有笔记处理完成后的汇总；扫描或列举失败时返回错误
    pub async fn run(&self, dry_run: bool) -> Result<RunSummary> {
        let vault = VaultIndex::scan(&self.config.vault_root, &self.config.scan_exclusions())?;
        info!("Found {} note(s) in {:?}", vault.notes().len(), vault.root());

        let index = self.build_index().await?;
        info!("Remote index has {} object(s)", index.len());

        let ctx = RunContext {
            vault,
            index,
            dry_run,
        };

        let outcomes: Vec<NoteOutcome> = stream::iter(ctx.vault.notes())
            .map(|path| self.process_note(&ctx, path))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        let mut summary = RunSummary::new(dry_run, outcomes);

        if !dry_run && self.config.mirror.commit {
            if let Some(root) = &self.config.mirror.root {
                match vcs::commit_mirror(root, summary.mirrored_count()) {
                    Ok(commit) => summary.mirror_commit = commit,
                    Err(e) => {
                        warn!("Failed to commit mirror {:?}: {:#}", root, e);
                        summary.mirror_commit_error = Some(format!("{:#}", e));
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn process_note(&self, ctx: &RunContext, path: &Path) -> NoteOutcome {
        let fs = self.fs.as_ref();

        let mut note = match Note::load(fs, path) {
            Ok(note) => note,
            Err(e) => return failed(path, "load note", format!("{:#}", e)),
        };

        let identity = ensure_identity(&note);
        note.apply(&identity);

        if let Staleness::Skip(reason) = staleness::check(&note, &ctx.index) {
            debug!("Skipping {:?}: {:?}", path, reason);
            let rewrite = !ctx.dry_run && !identity.is_empty();
            if rewrite {
                if let Err(e) = note.persist(fs) {
                    return failed(path, "persist front matter", format!("{:#}", e));
                }
            }
            return NoteOutcome::Skipped {
                path: path.to_path_buf(),
                reason,
                front_matter_rewritten: rewrite,
            };
        }

        info!("Processing modified note {:?}", path);

        let target = mirror::resolve_target(&self.config.mirror, ctx.vault.root(), &note);
        let url = target
            .as_ref()
            .map(|t| mirror::url_delta(t, &note))
            .unwrap_or_default();
        note.apply(&url);
        let delta = identity.clone().merge(url);

        if ctx.dry_run {
            return NoteOutcome::Planned {
                path: path.to_path_buf(),
                // 新分配的 guid 不会落盘
                guid: identity.guid.is_none().then(|| note.frontmatter.guid()).flatten(),
                front_matter_rewrite: !delta.is_empty(),
                mirror: target.is_some(),
            };
        }

        if !delta.is_empty() {
            if let Err(e) = note.persist(fs) {
                return failed(path, "persist front matter", format!("{:#}", e));
            }
        }

        let Some(guid) = note.frontmatter.guid() else {
            return failed(path, "assign identity", "publishable note has no guid");
        };

        let mut warnings = Vec::new();

        let resolved = EmbedResolver::new(&ctx.vault, fs, self.config.max_embed_depth).resolve(
            &note.path,
            &note.body,
            &note.frontmatter,
        );
        for issue in &resolved.issues {
            warn!("{:?}: {}", path, issue);
            warnings.push(issue.to_string());
        }

        let links = rewrite_links(&resolved.content, &note.path, &ctx.vault);
        for name in &links.unresolved {
            warn!("{:?}: link target not found: {}", path, name);
            warnings.push(format!("link target not found: {}", name));
        }

        let publisher = Publisher::new(
            self.store.as_ref(),
            fs,
            &ctx.vault,
            self.config.mirror.root.as_deref(),
        );
        let report = publisher
            .publish(&note, &links.content, &resolved.images, target.as_ref())
            .await;
        for failure in &report.failures {
            warn!("{:?}: {}", path, failure);
        }

        NoteOutcome::Published {
            path: path.to_path_buf(),
            guid,
            front_matter_rewritten: !delta.is_empty(),
            uploaded: report.uploaded,
            images_uploaded: report.images_uploaded,
            mirrored: report.mirrored,
            warnings,
            failures: report.failures,
        }
    }
}

fn failed(path: &Path, operation: &str, detail: impl std::fmt::Display) -> NoteOutcome {
    let failure = NoteFailure::new(operation, detail);
    warn!("{:?}: {}", path, failure);
    NoteOutcome::Failed {
        path: PathBuf::from(path),
        failure,
    }
}
