//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑。
//! 不依赖安装目录的命令实现 [`Command`]，操作组件服务的命令实现 [`PanelCommand`]。

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{default_config_template, AppContext, ConfigLoader, TomlConfigLoader};
use crate::error::{Result, ServiceError};
use crate::module::{ServiceUnit, SymlinkOutcome, UnitCatalog};
use crate::orchestrator::{self, InstallOutcome, ServiceInfo};
use async_trait::async_trait;
use std::path::Path;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 需要应用上下文和组件目录的命令
#[async_trait]
pub trait PanelCommand: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args, ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()>;
}

/// 按 id 或服务名查找组件
fn resolve<'a>(catalog: &'a UnitCatalog, id: &str) -> Result<&'a dyn ServiceUnit> {
    catalog
        .lookup(id)
        .ok_or_else(|| ServiceError::UnknownService(id.to_string()).into())
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init {
            root_path,
            output,
            force,
        } = &args.command
        {
            self.create_config_file(root_path, output, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, root_path: &Path, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, default_config_template(root_path)).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以启用需要的组件和版本");

        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate { config_path } = &args.command {
            let path = config_path.clone().unwrap_or_else(|| args.get_config_path());
            let loader = TomlConfigLoader::new(true);
            let config = loader.load_from_file(&path).await?;

            println!("✓ 配置文件验证通过: {}", path.display());
            println!("  安装根目录: {}", config.global.root_path.display());
            let enabled: Vec<&str> = config
                .bins
                .entries()
                .into_iter()
                .filter(|(_, settings)| settings.enable)
                .map(|(id, _)| id)
                .collect();
            if enabled.is_empty() {
                println!("  启用的组件: 无");
            } else {
                println!("  启用的组件: {}", enabled.join(", "));
            }
        }
        Ok(())
    }
}

/// 状态命令
pub struct StatusCommand;

#[async_trait]
impl PanelCommand for StatusCommand {
    async fn execute(&self, args: &Args, _ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        let Commands::Status { id, format, all } = &args.command else {
            return Ok(());
        };

        let report = match id {
            Some(id) => vec![orchestrator::service_info(resolve(catalog, id)?).await],
            None => orchestrator::status_report(catalog, *all).await,
        };

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => print_status_table(&report),
        }
        Ok(())
    }
}

/// 以表格形式输出状态
fn print_status_table(report: &[ServiceInfo]) {
    if report.is_empty() {
        println!("没有已启用的组件");
        return;
    }

    println!(
        "{:<12} {:<10} {:<22} {:<6} {:<14} {:<6}",
        "组件", "版本", "服务名", "后端", "状态", "端口"
    );
    println!("{}", "-".repeat(76));
    for info in report {
        println!(
            "{:<12} {:<10} {:<22} {:<6} {:<14} {:<6}",
            info.name,
            info.version.as_deref().unwrap_or("-"),
            info.service_name,
            info.backend,
            info.status.to_string(),
            info.port.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
        );
        if let Some(error) = &info.error {
            println!("  错误: {}", error);
        }
    }
}

/// 安装命令
pub struct InstallCommand;

#[async_trait]
impl PanelCommand for InstallCommand {
    async fn execute(&self, args: &Args, ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        if let Commands::Install { id } = &args.command {
            let unit = resolve(catalog, id)?;
            let name = orchestrator::display_name_for(unit);
            match orchestrator::install_service(ctx, unit).await? {
                InstallOutcome::Installed => println!("✓ {} 已安装并启动", name),
                InstallOutcome::AlreadyInstalled => println!("{} 已安装", name),
                InstallOutcome::AlreadyRunning => println!("{} 已在运行", name),
            }
        }
        Ok(())
    }
}

/// 卸载命令
pub struct UninstallCommand;

#[async_trait]
impl PanelCommand for UninstallCommand {
    async fn execute(&self, args: &Args, _ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        if let Commands::Uninstall { id } = &args.command {
            let unit = resolve(catalog, id)?;
            orchestrator::remove_service(unit).await?;
            println!("✓ {} 已卸载", orchestrator::display_name_for(unit));
        }
        Ok(())
    }
}

/// 启动、停止、重启命令
pub struct ControlCommand;

#[async_trait]
impl PanelCommand for ControlCommand {
    async fn execute(&self, args: &Args, _ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        let (id, verb) = match &args.command {
            Commands::Start { id } => (id, "启动"),
            Commands::Stop { id } => (id, "停止"),
            Commands::Restart { id } => (id, "重启"),
            _ => return Ok(()),
        };
        let unit = resolve(catalog, id)?;
        match &args.command {
            Commands::Start { .. } => orchestrator::start_service(unit).await?,
            Commands::Stop { .. } => orchestrator::stop_service(unit).await?,
            _ => orchestrator::restart_service(unit).await?,
        }
        println!("✓ {} 已{}", orchestrator::display_name_for(unit), verb);
        Ok(())
    }
}

/// 服务注册信息命令
pub struct InfosCommand;

#[async_trait]
impl PanelCommand for InfosCommand {
    async fn execute(&self, args: &Args, _ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        let Commands::Infos { id, format } = &args.command else {
            return Ok(());
        };
        let unit = resolve(catalog, id)?;
        let infos = unit.controller().infos().await;

        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&infos)?),
            OutputFormat::Text => match infos {
                Some(infos) => {
                    println!("服务名: {}", infos.name);
                    println!("显示名称: {}", infos.display_name);
                    println!("描述: {}", infos.description);
                    println!("命令行: {}", infos.path_name);
                    println!("状态: {}", infos.state);
                }
                None => println!("{} 未注册", unit.service_name()),
            },
        }
        Ok(())
    }
}

/// 批量启停命令
pub struct BatchCommand;

#[async_trait]
impl PanelCommand for BatchCommand {
    async fn execute(&self, args: &Args, ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        let (results, verb) = match &args.command {
            Commands::StartAll => (orchestrator::start_all(ctx, catalog).await, "启动"),
            Commands::StopAll => (orchestrator::stop_all(ctx, catalog).await, "停止"),
            _ => return Ok(()),
        };

        let mut first_error = None;
        for (id, result) in results {
            match result {
                Ok(()) => println!("✓ {} 已{}", id, verb),
                Err(e) => {
                    println!("✗ {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// 重新加载命令
///
/// 组件目录构建时已重新加载并校正链接，这里输出校正结果
pub struct ReloadCommand;

#[async_trait]
impl PanelCommand for ReloadCommand {
    async fn execute(&self, _args: &Args, _ctx: &AppContext, catalog: &mut UnitCatalog) -> Result<()> {
        for (id, outcome) in catalog.link_outcomes() {
            let label = match outcome {
                SymlinkOutcome::Unchanged => "未变化",
                SymlinkOutcome::Created => "已更新",
                SymlinkOutcome::Blocked => "被普通目录占用",
                SymlinkOutcome::Failed => "更新失败",
            };
            println!("{:<12} current 链接{}", id, label);
        }
        Ok(())
    }
}

/// 不需要应用上下文的命令
pub fn standalone_command(command: &Commands) -> Option<Box<dyn Command>> {
    match command {
        Commands::Init { .. } => Some(Box::new(InitCommand)),
        Commands::Validate { .. } => Some(Box::new(ValidateCommand)),
        Commands::Version { .. } => Some(Box::new(VersionCommand)),
        _ => None,
    }
}

/// 操作组件服务的命令
pub fn panel_command(command: &Commands) -> Option<Box<dyn PanelCommand>> {
    match command {
        Commands::Status { .. } => Some(Box::new(StatusCommand)),
        Commands::Install { .. } => Some(Box::new(InstallCommand)),
        Commands::Uninstall { .. } => Some(Box::new(UninstallCommand)),
        Commands::Start { .. } | Commands::Stop { .. } | Commands::Restart { .. } => {
            Some(Box::new(ControlCommand))
        }
        Commands::Infos { .. } => Some(Box::new(InfosCommand)),
        Commands::StartAll | Commands::StopAll => Some(Box::new(BatchCommand)),
        Commands::Reload => Some(Box::new(ReloadCommand)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_command_writes_template() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("conf").join("panel.toml");
        let args = Args::try_parse_from([
            "bearsampp-panel",
            "init",
            "/opt/bearsampp",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();

        InitCommand.execute(&args).await.unwrap();
        let content = std::fs::read_to_string(&output).unwrap();
        assert!(content.contains("root_path = \"/opt/bearsampp\""));

        let config = TomlConfigLoader::new(false)
            .load_from_string(&content)
            .await
            .unwrap();
        assert!(config.bins.apache.enable);
    }

    #[tokio::test]
    async fn test_init_command_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("panel.toml");
        std::fs::write(&output, "keep").unwrap();
        let args = Args::try_parse_from([
            "bearsampp-panel",
            "init",
            "/opt/bearsampp",
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();

        InitCommand.execute(&args).await.unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "keep");
    }

    #[tokio::test]
    async fn test_validate_command_missing_file() {
        let args = Args::try_parse_from(["bearsampp-panel", "validate", "/nonexistent/panel.toml"]).unwrap();
        assert!(ValidateCommand.execute(&args).await.is_err());
    }

    #[test]
    fn test_command_dispatch() {
        let version = Args::try_parse_from(["bearsampp-panel", "version"]).unwrap();
        assert!(standalone_command(&version.command).is_some());
        assert!(panel_command(&version.command).is_none());

        let stop = Args::try_parse_from(["bearsampp-panel", "stop", "apache"]).unwrap();
        assert!(standalone_command(&stop.command).is_none());
        assert!(panel_command(&stop.command).is_some());
    }

    #[tokio::test]
    async fn test_resolve_unknown_service() {
        let ctx = AppContext::from_config(crate::config::PanelConfig {
            global: crate::config::GlobalConfig::new("/opt/bearsampp"),
            bins: Default::default(),
        });
        let catalog = UnitCatalog::new(&ctx).await;
        let err = resolve(&catalog, "php").err().unwrap();
        assert!(err.to_string().contains("php"));
        assert_eq!(resolve(&catalog, "bearsamppmysql").unwrap().id(), "mysql");
    }
}
