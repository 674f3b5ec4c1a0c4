//! FileZilla Server
//!
//! 服务由可执行文件自带的 `/install` 与 `/uninstall` 参数注册和注销。

use crate::config::AppContext;
use crate::exec::Batch;
use crate::module::bins::{exe_path, log_file, BinUnit, Filezilla};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, LifecycleHooks, ServiceDescriptor, StartType};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub const ID: &str = "filezilla";
pub const SERVICE_NAME: &str = "bearsamppfilezilla";

const LOCAL_CFG_EXE: &str = "filezillaExe";
const LOCAL_CFG_PORT: &str = "filezillaPort";

/// FileZilla 钩子
#[derive(Debug, Clone)]
pub struct FilezillaHooks {
    exe: PathBuf,
    error_log: PathBuf,
    batch: Batch,
}

#[async_trait]
impl LifecycleHooks for FilezillaHooks {
    async fn custom_install(&self, _descriptor: &ServiceDescriptor) -> Option<bool> {
        Some(self.batch.install_filezilla_service(&self.exe).await)
    }

    async fn custom_uninstall(&self) -> Option<bool> {
        Some(self.batch.uninstall_filezilla_service(&self.exe).await)
    }

    fn error_log(&self) -> Option<PathBuf> {
        Some(self.error_log.clone())
    }
}

/// FileZilla 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "FileZilla", &ctx.config().bins.filezilla, ctx)
}

/// 使用已同步的组件信息构建 FileZilla 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Filezilla {
    let exe = exe_path(&module, LOCAL_CFG_EXE);
    let port = module.conf_port(LOCAL_CFG_PORT);
    let hooks = Arc::new(FilezillaHooks {
        exe: exe.clone(),
        error_log: log_file(ctx, "filezilla.log"),
        batch: ctx.batch(),
    });

    let descriptor = ServiceDescriptor::new(SERVICE_NAME, exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_start_type(StartType::Demand);
    let controller = options.controller(ctx, descriptor, Backend::Native, hooks.clone());
    BinUnit::new(module, port, hooks, controller)
}
