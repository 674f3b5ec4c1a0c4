//! PostgreSQL
//!
//! 服务由 `pg_ctl register` 注册；注册和启动前会把端口写回配置文件并在需要时初始化数据目录。

use crate::config::AppContext;
use crate::exec::batch::POSTGRESQL_INIT_TIMEOUT;
use crate::exec::Batch;
use crate::module::bins::{exe_path, log_file, BinUnit, Postgresql};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, LifecycleHooks, ServiceDescriptor, StartType};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub const ID: &str = "postgresql";
pub const SERVICE_NAME: &str = "bearsampppostgresql";

const LOCAL_CFG_CTL_EXE: &str = "postgresqlCtlExe";
const LOCAL_CFG_CONF: &str = "postgresqlConf";
const LOCAL_CFG_ALT_CONF: &str = "postgresqlAltConf";
const LOCAL_CFG_PORT: &str = "postgresqlPort";

/// PostgreSQL 钩子
#[derive(Debug, Clone)]
pub struct PostgresqlHooks {
    ctl_exe: PathBuf,
    display_name: String,
    port: Option<u16>,
    confs: Vec<PathBuf>,
    current_path: PathBuf,
    data_path: PathBuf,
    error_log: PathBuf,
    batch: Batch,
}

impl PostgresqlHooks {
    /// 把本地配置中的端口写入 `postgresql.conf`
    fn rebuild_conf(&self) {
        let Some(port) = self.port else {
            return;
        };
        for conf in &self.confs {
            let Ok(content) = std::fs::read_to_string(conf) else {
                continue;
            };
            let updated = replace_port(&content, port);
            if updated != content {
                if let Err(e) = std::fs::write(conf, updated) {
                    warn!(target: "panel", "写入 {} 失败: {}", conf.display(), e);
                }
            }
        }
    }

    async fn init_data(&self) -> bool {
        if self.data_path.is_dir() {
            return true;
        }
        info!(target: "panel", "初始化 PostgreSQL 数据目录: {}", self.data_path.display());
        self.batch
            .initialize_data("initializePostgresql", &self.current_path, POSTGRESQL_INIT_TIMEOUT)
            .await
    }

    async fn prepare(&self) -> bool {
        self.rebuild_conf();
        if !self.init_data().await {
            warn!(target: "panel", "PostgreSQL 数据目录初始化失败");
        }
        true
    }
}

#[async_trait]
impl LifecycleHooks for PostgresqlHooks {
    async fn prepare_create(&self) -> bool {
        self.prepare().await
    }

    async fn prepare_start(&self) -> bool {
        self.prepare().await
    }

    async fn custom_install(&self, descriptor: &ServiceDescriptor) -> Option<bool> {
        Some(
            self.batch
                .install_postgresql_service(
                    &self.ctl_exe,
                    &descriptor.name,
                    &self.display_name,
                    &self.data_path,
                    &self.error_log,
                )
                .await,
        )
    }

    async fn custom_uninstall(&self) -> Option<bool> {
        Some(
            self.batch
                .uninstall_postgresql_service(&self.ctl_exe, SERVICE_NAME)
                .await,
        )
    }

    fn error_log(&self) -> Option<PathBuf> {
        Some(self.error_log.clone())
    }
}

/// 替换 `port = N` 配置行
pub fn replace_port(content: &str, port: u16) -> String {
    match Regex::new(r"(?m)^port(.*?)=(.*?)(\d+)") {
        Ok(re) => re
            .replace_all(content, format!("port = {port}").as_str())
            .into_owned(),
        Err(_) => content.to_string(),
    }
}

/// PostgreSQL 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "PostgreSQL", &ctx.config().bins.postgresql, ctx)
}

/// 使用已同步的组件信息构建 PostgreSQL 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Postgresql {
    let ctl_exe = exe_path(&module, LOCAL_CFG_CTL_EXE);
    let port = module.conf_port(LOCAL_CFG_PORT);
    let confs = [LOCAL_CFG_CONF, LOCAL_CFG_ALT_CONF]
        .iter()
        .filter_map(|key| module.conf_path(key))
        .collect();
    let display_name = ctx.display_name(module.name());
    let hooks = Arc::new(PostgresqlHooks {
        ctl_exe: ctl_exe.clone(),
        display_name: display_name.clone(),
        port,
        confs,
        current_path: module.current_path().to_path_buf(),
        data_path: module.symlink_path().join("data"),
        error_log: log_file(ctx, "postgresql.log"),
        batch: ctx.batch(),
    });

    let descriptor = ServiceDescriptor::new(SERVICE_NAME, ctl_exe)
        .with_display_name(display_name)
        .with_start_type(StartType::Demand);
    let controller = options.controller(ctx, descriptor, Backend::Native, hooks.clone());
    BinUnit::new(module, port, hooks, controller)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_port() {
        let content = "listen_addresses = '*'\nport = 5432\t\t\t\t# (change requires restart)\nmax_connections = 100\n";
        let replaced = replace_port(content, 5433);
        assert!(replaced.contains("port = 5433\t"));
        assert!(replaced.contains("max_connections = 100"));
        assert!(!replaced.contains("5432"));
    }

    #[test]
    fn test_rebuild_conf() {
        let dir = tempfile::TempDir::new().unwrap();
        let conf = dir.path().join("postgresql.conf");
        let alt = dir.path().join("postgresql.conf.ber");
        std::fs::write(&conf, "port = 5432\n").unwrap();
        std::fs::write(&alt, "port=5432\n").unwrap();

        let hooks = PostgresqlHooks {
            ctl_exe: dir.path().join("pg_ctl.exe"),
            display_name: "Bearsampp PostgreSQL".to_string(),
            port: Some(5440),
            confs: vec![conf.clone(), alt.clone(), dir.path().join("missing.conf")],
            current_path: dir.path().to_path_buf(),
            data_path: dir.path().join("data"),
            error_log: dir.path().join("postgresql.log"),
            batch: Batch::new(crate::exec::ScriptRunner::new(
                dir.path(),
                std::time::Duration::from_secs(5),
            )),
        };
        hooks.rebuild_conf();

        assert_eq!(std::fs::read_to_string(&conf).unwrap(), "port = 5440\n");
        assert_eq!(std::fs::read_to_string(&alt).unwrap(), "port = 5440\n");
    }

    #[test]
    fn test_replace_port_ignores_commented_line() {
        let content = "#port = 5432\n";
        assert_eq!(replace_port(content, 5433), content);
    }
}
