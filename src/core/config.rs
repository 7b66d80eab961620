//! 发布配置
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! 1. 默认值
//! 2. TOML 配置文件
//! 3. 环境变量（支持 `.env`）与命令行参数
//!
//! ## 配置格式
//!
//! ```toml
//! vault_root = "/home/me/vault"
//! concurrency = 8
//!
//! [store]
//! dir = "/mnt/bucket"
//!
//! [mirror]
//! root = "/home/me/notes-mirror"
//! subdir = "Public"
//! url_prefix = "https://github.com/me/notes/blob/main"
//! commit = true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::embed::DEFAULT_MAX_EMBED_DEPTH;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// 对象存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// 对象存储目录
    pub dir: Option<PathBuf>,
    /// 每页列举的对象数
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// git 镜像配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// 镜像仓库工作目录
    pub root: Option<PathBuf>,
    /// 笔记库中需要镜像的子目录（相对笔记库根目录）
    pub subdir: Option<PathBuf>,
    /// 镜像文件的公开 URL 前缀
    pub url_prefix: Option<String>,
    /// 运行结束后提交镜像仓库
    pub commit: bool,
}

impl MirrorConfig {
    /// 镜像根目录与子目录都配置时才启用
    pub fn is_enabled(&self) -> bool {
        self.root.is_some() && self.subdir.is_some()
    }
}

/// 发布配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// 笔记库根目录
    pub vault_root: PathBuf,
    pub store: StoreConfig,
    pub mirror: MirrorConfig,
    /// 同时处理的笔记数上限
    pub concurrency: usize,
    /// 最大嵌入深度
    pub max_embed_depth: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            vault_root: PathBuf::from("."),
            store: StoreConfig::default(),
            mirror: MirrorConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
        }
    }
}

/// 命令行或环境变量提供的覆盖项
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub vault_root: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub mirror_root: Option<PathBuf>,
    pub mirror_subdir: Option<PathBuf>,
    pub mirror_url: Option<String>,
    pub commit_mirror: bool,
    pub concurrency: Option<usize>,
}

impl PublishConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 TOML 文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 应用覆盖项
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(vault_root) = overrides.vault_root {
            self.vault_root = vault_root;
        }
        if let Some(dir) = overrides.store_dir {
            self.store.dir = Some(dir);
        }
        if let Some(root) = overrides.mirror_root {
            self.mirror.root = Some(root);
        }
        if let Some(subdir) = overrides.mirror_subdir {
            self.mirror.subdir = Some(subdir);
        }
        if let Some(url) = overrides.mirror_url {
            self.mirror.url_prefix = Some(url);
        }
        if overrides.commit_mirror {
            self.mirror.commit = true;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        if self.store.page_size == 0 {
            anyhow::bail!("store.page_size must be at least 1");
        }
        if self.max_embed_depth == 0 {
            anyhow::bail!("max_embed_depth must be at least 1");
        }
        if self.mirror.commit && !self.mirror.is_enabled() {
            anyhow::bail!("mirror.commit requires both mirror.root and mirror.subdir");
        }
        Ok(())
    }

    /// 笔记库内需要跳过扫描的目录
    pub fn scan_exclusions(&self) -> Vec<PathBuf> {
        [self.store.dir.as_ref(), self.mirror.root.as_ref()]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}
