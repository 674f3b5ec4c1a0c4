//! 服务型组件
//!
//! 每个子模块提供组件的钩子实现和 `build` 构造函数。

pub mod apache;
pub mod filezilla;
pub mod mailpit;
pub mod memcached;
pub mod mysql;
pub mod postgresql;
pub mod xlight;

use crate::config::AppContext;
use crate::module::component::Module;
use crate::module::unit::ServiceUnit;
use crate::registry::{service_parameters_key, Registry, RegistryKey};
use crate::service::{LifecycleHooks, ServiceController};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub use apache::ApacheHooks;
pub use filezilla::FilezillaHooks;
pub use mysql::{DbFlavor, MysqlHooks};
pub use postgresql::PostgresqlHooks;

/// 服务型组件
pub struct BinUnit<H> {
    module: Module,
    port: Option<u16>,
    hooks: Arc<H>,
    controller: ServiceController,
}

impl<H> BinUnit<H> {
    pub(crate) fn new(module: Module, port: Option<u16>, hooks: Arc<H>, controller: ServiceController) -> Self {
        Self {
            module,
            port,
            hooks,
            controller,
        }
    }

    /// 组件钩子的具体类型
    pub fn component_hooks(&self) -> &H {
        &self.hooks
    }
}

impl<H> std::fmt::Debug for BinUnit<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinUnit")
            .field("module", &self.module.id())
            .field("port", &self.port)
            .field("controller", &self.controller)
            .finish()
    }
}

#[async_trait]
impl<H: LifecycleHooks + 'static> ServiceUnit for BinUnit<H> {
    fn module(&self) -> &Module {
        &self.module
    }

    fn controller(&self) -> &ServiceController {
        &self.controller
    }

    fn hooks(&self) -> Arc<dyn LifecycleHooks> {
        self.hooks.clone()
    }

    fn port(&self) -> Option<u16> {
        self.port
    }
}

pub type Apache = BinUnit<ApacheHooks>;
pub type Mysql = BinUnit<MysqlHooks>;
pub type Postgresql = BinUnit<PostgresqlHooks>;
pub type Mailpit = BinUnit<WrappedHooks>;
pub type Memcached = BinUnit<WrappedHooks>;
pub type Xlight = BinUnit<WrappedHooks>;
pub type Filezilla = BinUnit<FilezillaHooks>;

/// 本地配置中的可执行文件路径，缺失时退回到 `current` 目录并记录警告
pub(crate) fn exe_path(module: &Module, key: &str) -> PathBuf {
    match module.conf_path(key) {
        Some(path) => path,
        None => {
            if module.is_enabled() {
                warn!(target: "panel", "{} 缺少配置项 {}", module.name(), key);
            }
            module.symlink_path().to_path_buf()
        }
    }
}

/// 组件日志文件
pub(crate) fn log_file(ctx: &AppContext, file: &str) -> PathBuf {
    ctx.logs_path().join(file)
}

/// 合并命令输出并去掉其中的可执行文件路径
pub(crate) fn strip_exe(lines: &[String], exe: &Path) -> String {
    let exe = exe.display().to_string();
    lines.join("\n").replace(&exe, "").trim().to_string()
}

/// NSSM 包装组件的钩子
///
/// 启动前把当前的启动参数写回 `Parameters\AppParameters`，端口等配置修改后无需重新注册。
#[derive(Debug, Clone)]
pub struct WrappedHooks {
    service_name: String,
    params: String,
    error_log: PathBuf,
    registry: Registry,
}

impl WrappedHooks {
    pub(crate) fn new(ctx: &AppContext, service_name: &str, params: impl Into<String>, error_log: PathBuf) -> Self {
        Self {
            service_name: service_name.to_string(),
            params: params.into(),
            error_log,
            registry: ctx.registry(),
        }
    }

    /// 当前的启动参数
    pub fn params(&self) -> &str {
        &self.params
    }
}

#[async_trait]
impl LifecycleHooks for WrappedHooks {
    async fn prepare_start(&self) -> bool {
        let subkey = service_parameters_key(&self.service_name);
        if !self
            .registry
            .exists(RegistryKey::Hklm, &subkey, Some("AppParameters"))
            .await
        {
            debug!(target: "registry", "{} 尚未注册 AppParameters", self.service_name);
            return true;
        }
        if let Err(e) = self
            .registry
            .set_expand_string_value(RegistryKey::Hklm, &subkey, "AppParameters", &self.params)
            .await
        {
            warn!(target: "registry", "更新 {} 启动参数失败: {}", self.service_name, e);
        }
        true
    }

    fn error_log(&self) -> Option<PathBuf> {
        Some(self.error_log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_exe() {
        let exe = Path::new("/opt/bearsampp/bin/mysql/current/bin/mysqld");
        let lines = vec![
            format!("{} [ERROR] unknown variable 'foo=bar'", exe.display()),
            "[ERROR] Aborting".to_string(),
        ];
        assert_eq!(
            strip_exe(&lines, exe),
            "[ERROR] unknown variable 'foo=bar'\n[ERROR] Aborting"
        );
    }
}
