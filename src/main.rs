use clap::Parser;
use vaultsync::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 中的变量作为环境变量的补充
    dotenv::dotenv().ok();

    // 解析命令行参数
    let cli = Cli::parse();

    // 初始化日志
    vaultsync::init(cli.global.verbose)?;

    // 执行命令
    match cli.command {
        Commands::Publish(args) => cli::commands::publish(&cli.global, args).await,
        Commands::Plan(args) => cli::commands::plan(&cli.global, args).await,
        Commands::Index(args) => cli::commands::index(&cli.global, args).await,
        Commands::Init(args) => cli::commands::init(&cli.global, args),
    }
}
