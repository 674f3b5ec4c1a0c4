//! Xlight FTP Server

use crate::config::AppContext;
use crate::module::bins::{exe_path, log_file, BinUnit, WrappedHooks, Xlight};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, ServiceDescriptor, StartType};
use std::sync::Arc;

pub const ID: &str = "xlight";
pub const SERVICE_NAME: &str = "bearsamppxlight";
pub const SERVICE_PARAMS: &str = " -startall";

const LOCAL_CFG_EXE: &str = "xlightExe";
const LOCAL_CFG_PORT: &str = "xlightPort";

/// Xlight 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "Xlight", &ctx.config().bins.xlight, ctx)
}

/// 使用已同步的组件信息构建 Xlight 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Xlight {
    let exe = exe_path(&module, LOCAL_CFG_EXE);
    let port = module.conf_port(LOCAL_CFG_PORT);

    let hooks = Arc::new(WrappedHooks::new(ctx, SERVICE_NAME, SERVICE_PARAMS, log_file(ctx, "xlight.log")));
    let descriptor = ServiceDescriptor::new(SERVICE_NAME, exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_arguments(SERVICE_PARAMS)
        .with_start_type(StartType::Demand)
        .with_stdout(log_file(ctx, "xlight.log"))
        .with_stderr(log_file(ctx, "xlight.error.log"));
    let backend = Backend::Wrapped(ctx.wrapper_config());
    let controller = options.controller(ctx, descriptor, backend, hooks.clone());
    BinUnit::new(module, port, hooks, controller)
}
