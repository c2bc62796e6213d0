//! MIVC Shell 主程序

mod config;
mod shell;

use clap::Parser;
use crate::config::ShellConfig;
use crate::shell::MedicalShell;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// MIVC Shell 命令行参数
#[derive(Parser, Debug)]
#[command(name = "mivc-shell")]
#[command(about = "医学影像版本管理交互式 Shell")]
struct Args {
    /// 工作目录
    #[arg(short, long, default_value = ".")]
    work_dir: String,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    let config = ShellConfig::load(args.config.as_deref())?;
    let work_dir = std::fs::canonicalize(&args.work_dir)?;
    std::env::set_current_dir(&work_dir)?;

    info!("工作目录: {}", work_dir.display());
    info!("元数据文件: {}", config.metadata_file);

    let mut shell = MedicalShell::new(work_dir, config);
    shell.ensure_initialized().await?;
    shell.run().await
}
