//! Bearsampp Panel 主程序入口
//!
//! 管理本地开发环境中的服务型组件

use anyhow::{Context, Result};
use bearsampp_panel::cli::{panel_command, standalone_command, Args};
use bearsampp_panel::config::{AppContext, ConfigLoader, TomlConfigLoader};
use bearsampp_panel::logging::{get_default_log_path, LogConfig, LoggingSystem};
use bearsampp_panel::module::UnitCatalog;
use clap::Parser;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    if let Some(command) = standalone_command(&args.command) {
        setup_logging(args, None, None)?;
        return command.execute(args).await.map_err(|e| anyhow::anyhow!(e));
    }

    let config_path = args.get_config_path();
    let loader = TomlConfigLoader::new(true);
    let config = loader
        .load_from_file(&config_path)
        .await
        .with_context(|| format!("加载配置文件失败: {}", config_path.display()))?;

    let ctx = AppContext::from_config(config);
    setup_logging(
        args,
        Some(&ctx.config().global.log_level),
        Some(get_default_log_path(ctx.logs_path())),
    )?;
    info!(
        "Bearsampp Panel v{} 启动 (根目录: {})",
        bearsampp_panel::VERSION,
        ctx.root_path().display()
    );

    spawn_signal_handler(&ctx);

    let Some(command) = panel_command(&args.command) else {
        return Ok(());
    };
    let mut catalog = UnitCatalog::new(&ctx).await;
    command
        .execute(args, &ctx, &mut catalog)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

/// 初始化日志系统
fn setup_logging(
    args: &Args,
    config_level: Option<&str>,
    file_path: Option<std::path::PathBuf>,
) -> Result<()> {
    if let Some(dir) = file_path.as_ref().and_then(|path| path.parent()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("无法创建日志目录 {}: {}", dir.display(), e);
        }
    }

    let log_config = LogConfig {
        level: args.effective_log_level(config_level),
        file_path: file_path.filter(|path| path.parent().is_some_and(|dir| dir.is_dir())),
        console: true,
        json_format: args.json_logs,
        ..Default::default()
    };

    LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;
    Ok(())
}

/// Ctrl+C 时取消根令牌，等待中的轮询和脚本会尽快返回
fn spawn_signal_handler(ctx: &AppContext) {
    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("收到中断信号，正在取消当前操作");
                cancel.cancel();
            }
            Err(e) => error!("监听中断信号失败: {}", e),
        }
    });
}
