//! Apache HTTP Server

use crate::config::AppContext;
use crate::exec::{Batch, TimeoutPolicy};
use crate::module::bins::{exe_path, log_file, strip_exe, Apache, BinUnit};
use crate::module::component::{Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, CmdLineOutput, LifecycleHooks, ServiceDescriptor, StartType};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

pub const ID: &str = "apache";
pub const SERVICE_NAME: &str = "bearsamppapache";
const SERVICE_PARAMS: &str = "-k runservice";
const CMD_SYNTAX_CHECK: &str = "-t";
const SYNTAX_OK: &str = "Syntax OK";

const LOCAL_CFG_EXE: &str = "apacheExe";
const LOCAL_CFG_PORT: &str = "apachePort";

/// Apache 钩子
#[derive(Debug, Clone)]
pub struct ApacheHooks {
    exe: PathBuf,
    error_log: PathBuf,
    batch: Batch,
}

#[async_trait]
impl LifecycleHooks for ApacheHooks {
    async fn syntax_check(&self) -> Option<CmdLineOutput> {
        if !self.exe.is_file() {
            return None;
        }
        let content = format!("\"{}\" {}", self.exe.display(), CMD_SYNTAX_CHECK);
        let outcome = self
            .batch
            .exec("apacheGetCmdLineOutput", &content, TimeoutPolicy::Default)
            .await;
        outcome.lines().map(|lines| syntax_output(lines, &self.exe))
    }

    fn error_log(&self) -> Option<PathBuf> {
        Some(self.error_log.clone())
    }
}

/// `httpd -t` 最后一行为 `Syntax OK` 时通过
pub fn syntax_output(lines: &[String], exe: &std::path::Path) -> CmdLineOutput {
    let syntax_ok = lines.last().is_some_and(|line| line.trim() == SYNTAX_OK);
    let shown = if syntax_ok {
        &lines[..lines.len() - 1]
    } else {
        lines
    };
    CmdLineOutput::new(syntax_ok, strip_exe(shown, exe))
}

/// Apache 组件信息，尚未加载
pub fn module(ctx: &AppContext) -> Module {
    Module::new(ModuleKind::Bin, ID, "Apache", &ctx.config().bins.apache, ctx)
}

/// 使用已同步的组件信息构建 Apache 组件
pub fn build(ctx: &AppContext, module: Module, options: BuildOptions<'_>) -> Apache {
    let exe = exe_path(&module, LOCAL_CFG_EXE);
    let port = module.conf_port(LOCAL_CFG_PORT);
    let hooks = Arc::new(ApacheHooks {
        exe: exe.clone(),
        error_log: log_file(ctx, "apache_error.log"),
        batch: ctx.batch(),
    });

    let descriptor = ServiceDescriptor::new(SERVICE_NAME, exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_arguments(SERVICE_PARAMS)
        .with_start_type(StartType::Demand);
    let controller = options.controller(ctx, descriptor, Backend::Native, hooks.clone());
    BinUnit::new(module, port, hooks, controller)
}
