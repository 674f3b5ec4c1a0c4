//! Mailpit

use crate::config::AppContext;
use crate::module::bins::{exe_path, log_file, BinUnit, Mailpit, WrappedHooks};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, ServiceDescriptor, StartType};
use std::sync::Arc;

pub const ID: &str = "mailpit";
pub const SERVICE_NAME: &str = "bearsamppmailpit";

const LOCAL_CFG_EXE: &str = "mailpitExe";
const LOCAL_CFG_WEB_ROOT: &str = "mailpitWebRoot";
const LOCAL_CFG_UI_PORT: &str = "mailpitUiPort";
const LOCAL_CFG_SMTP_PORT: &str = "mailpitSmtpPort";
const LOCAL_CFG_LISTEN: &str = "mailpitListen";

const DEFAULT_LISTEN: &str = "127.0.0.1";
const DEFAULT_UI_PORT: u16 = 8025;
const DEFAULT_SMTP_PORT: u16 = 1025;

/// Mailpit 启动参数
pub fn service_params(listen: &str, ui_port: u16, smtp_port: u16, web_root: &str) -> String {
    format!(" --listen \"{listen}:{ui_port}\" --smtp \"{listen}:{smtp_port}\" --webroot \"{web_root}\"")
}

/// Mailpit 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "Mailpit", &ctx.config().bins.mailpit, ctx)
}

/// 使用已同步的组件信息构建 Mailpit 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Mailpit {
    let exe = exe_path(&module, LOCAL_CFG_EXE);
    let listen = module.conf_value(LOCAL_CFG_LISTEN).unwrap_or(DEFAULT_LISTEN).to_string();
    let ui_port = module.conf_port(LOCAL_CFG_UI_PORT).unwrap_or(DEFAULT_UI_PORT);
    let smtp_port = module.conf_port(LOCAL_CFG_SMTP_PORT).unwrap_or(DEFAULT_SMTP_PORT);
    let web_root = module.conf_value(LOCAL_CFG_WEB_ROOT).unwrap_or("/").to_string();
    let params = service_params(&listen, ui_port, smtp_port, &web_root);

    let hooks = Arc::new(WrappedHooks::new(ctx, SERVICE_NAME, params.clone(), log_file(ctx, "mailpit.log")));
    let descriptor = ServiceDescriptor::new(SERVICE_NAME, exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_arguments(params)
        .with_start_type(StartType::Demand)
        .with_stdout(log_file(ctx, "mailpit.out.log"))
        .with_stderr(log_file(ctx, "mailpit.err.log"));
    let backend = Backend::Wrapped(ctx.wrapper_config());
    let controller = options.controller(ctx, descriptor, backend, hooks.clone());
    BinUnit::new(module, Some(smtp_port), hooks, controller)
}
