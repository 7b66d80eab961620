use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::config::ConfigOverrides;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "vaultsync")]
#[command(about = "Incremental publisher for a Markdown vault")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// 所有子命令共享的参数，均可由环境变量提供
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "VAULTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Vault root directory
    #[arg(long, global = true, env = "BASE_MD_DIR")]
    pub vault: Option<PathBuf>,

    /// Object store directory
    #[arg(long, global = true, env = "PUBLISH_STORE_DIR")]
    pub store: Option<PathBuf>,

    /// Git mirror working tree
    #[arg(long, global = true, env = "GIT_REPO_ABSDIR")]
    pub mirror: Option<PathBuf>,

    /// Vault subdirectory mirrored to git
    #[arg(long, global = true, env = "GIT_PUBLISH_SUBDIR")]
    pub git_subdir: Option<PathBuf>,

    /// Public URL prefix of the git mirror
    #[arg(long, global = true, env = "GIT_REPO_URL")]
    pub git_url: Option<String>,

    /// Maximum number of notes processed at once
    #[arg(long, global = true, env = "PUBLISH_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            vault_root: self.vault.clone(),
            store_dir: self.store.clone(),
            mirror_root: self.mirror.clone(),
            mirror_subdir: self.git_subdir.clone(),
            mirror_url: self.git_url.clone(),
            commit_mirror: false,
            concurrency: self.concurrency,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish every modified note
    Publish(PublishArgs),

    /// Show what would be published without writing anything
    Plan(PlanArgs),

    /// List the objects currently in the store
    Index(IndexArgs),

    /// Write a config file from the current flags and environment
    Init(InitArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PublishArgs {
    /// Evaluate notes without writing, uploading or mirroring
    #[arg(long)]
    pub dry_run: bool,

    /// Commit the git mirror after publishing
    #[arg(long)]
    pub commit_mirror: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {}

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Path of the config file to write
    #[arg(default_value = "vaultsync.toml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
