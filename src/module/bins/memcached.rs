//! Memcached

use crate::config::AppContext;
use crate::module::bins::{exe_path, log_file, BinUnit, Memcached, WrappedHooks};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, ServiceDescriptor, StartType};
use std::sync::Arc;
use tracing::warn;

pub const ID: &str = "memcached";
pub const SERVICE_NAME: &str = "bearsamppmemcached";

const LOCAL_CFG_EXE: &str = "memcachedExe";
const LOCAL_CFG_MEMORY: &str = "memcachedMemory";
const LOCAL_CFG_PORT: &str = "memcachedPort";

const DEFAULT_MEMORY: u32 = 512;
const DEFAULT_PORT: u16 = 11211;

/// Memcached 启动参数
pub fn service_params(memory: u32, port: u16) -> String {
    format!("-m {memory} -p {port} -U 0 -vv")
}

/// Memcached 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "Memcached", &ctx.config().bins.memcached, ctx)
}

/// 使用已同步的组件信息构建 Memcached 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Memcached {
    let exe = exe_path(&module, LOCAL_CFG_EXE);
    let memory = module
        .conf_value(LOCAL_CFG_MEMORY)
        .and_then(|value| value.trim().parse().ok())
        .filter(|memory| *memory > 0)
        .unwrap_or_else(|| {
            if module.is_enabled() {
                warn!(target: "panel", "{} 无效，使用默认值 {}", LOCAL_CFG_MEMORY, DEFAULT_MEMORY);
            }
            DEFAULT_MEMORY
        });
    let port = module.conf_port(LOCAL_CFG_PORT).unwrap_or(DEFAULT_PORT);
    let params = service_params(memory, port);

    let hooks = Arc::new(WrappedHooks::new(ctx, SERVICE_NAME, params.clone(), log_file(ctx, "memcached.log")));
    let descriptor = ServiceDescriptor::new(SERVICE_NAME, exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_arguments(params)
        .with_start_type(StartType::Demand)
        .with_stdout(log_file(ctx, "memcached.out.log"))
        .with_stderr(log_file(ctx, "memcached.err.log"));
    let backend = Backend::Wrapped(ctx.wrapper_config());
    let controller = options.controller(ctx, descriptor, backend, hooks.clone());
    BinUnit::new(module, Some(port), hooks, controller)
}
