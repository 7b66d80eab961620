use super::*;
use crate::core::{Engine, PublishConfig, RunSummary};
use anyhow::Result;
use tracing::{error, info};

/// 按 默认值 -> 配置文件 -> 环境变量/命令行 的顺序加载配置
pub fn load_config(global: &GlobalArgs, commit_mirror: bool) -> Result<PublishConfig> {
    let base = match &global.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            PublishConfig::from_file(path)?
        }
        None => PublishConfig::new(),
    };

    let mut overrides = global.overrides();
    overrides.commit_mirror = commit_mirror;
    let config = base.with_overrides(overrides);
    config.validate()?;
    Ok(config)
}

pub async fn publish(global: &GlobalArgs, args: PublishArgs) -> Result<()> {
    let config = load_config(global, args.commit_mirror)?;
    info!("Publishing vault {:?}", config.vault_root);

    let engine = Engine::from_config(config)?;
    let summary = engine.run(args.dry_run).await.map_err(|e| {
        error!("Publish aborted: {:#}", e);
        e
    })?;
    report(&summary, args.json)
}

pub async fn plan(global: &GlobalArgs, args: PlanArgs) -> Result<()> {
    let config = load_config(global, false)?;
    let engine = Engine::from_config(config)?;
    let summary = engine.run(true).await?;
    report(&summary, args.json)
}

pub async fn index(global: &GlobalArgs, _args: IndexArgs) -> Result<()> {
    let config = load_config(global, false)?;
    let engine = Engine::from_config(config)?;
    let index = engine.build_index().await?;

    for (key, last_modified) in index.entries() {
        println!("{}\t{}", key, last_modified.to_rfc3339());
    }
    info!("{} object(s)", index.len());
    Ok(())
}

/// 根据当前参数与环境变量写出配置文件
pub fn init(global: &GlobalArgs, args: InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        anyhow::bail!(
            "Config file {:?} already exists, use --force to overwrite",
            args.path
        );
    }

    let config = PublishConfig::new().with_overrides(global.overrides());
    config.save(&args.path)?;
    info!("Wrote config to {:?}", args.path);
    Ok(())
}

/// 打印汇总，存在失败时返回错误
fn report(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        print!("{}", summary.render());
    }

    if summary.has_failures() {
        anyhow::bail!("Publish completed with errors");
    }
    Ok(())
}
