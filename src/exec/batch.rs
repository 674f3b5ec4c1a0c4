//! 批处理辅助命令
//!
//! 基于 [`ScriptRunner`] 的常用 Windows 命令封装：进程/端口查询、
//! `sc config` 调整、PostgreSQL 与 FileZilla 的专用服务注册、数据目录初始化等。
//! 输出解析均为纯函数，便于在任意平台测试。

use crate::exec::request::{ExecOutcome, ExecutionRequest, ScriptKind, TimeoutPolicy};
use crate::exec::runner::ScriptRunner;
use std::path::Path;
use tracing::{debug, info, warn};

/// MySQL/MariaDB 数据目录初始化超时
pub const MYSQL_INIT_TIMEOUT: u64 = 60;
/// PostgreSQL 数据目录初始化超时
pub const POSTGRESQL_INIT_TIMEOUT: u64 = 15;

/// 空设备，用于丢弃命令输出
#[cfg(windows)]
pub const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
pub const NULL_DEVICE: &str = "/dev/null";

/// 批处理命令封装
#[derive(Debug, Clone)]
pub struct Batch {
    runner: ScriptRunner,
}

impl Batch {
    /// 创建新的批处理封装
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }

    /// 执行脚本并收集输出
    pub async fn exec(&self, basename: &str, content: &str, timeout: TimeoutPolicy) -> ExecOutcome {
        let request = ExecutionRequest::new(ScriptKind::native_shell(), basename, content).timeout(timeout);
        self.runner.run(&request).await
    }

    /// 独立执行脚本（不等待、不收集输出）
    pub async fn exec_standalone(&self, basename: &str, content: &str) -> ExecOutcome {
        let request = ExecutionRequest::new(ScriptKind::native_shell(), basename, content).standalone();
        self.runner.run(&request).await
    }

    /// 根据PID查找可执行文件名
    pub async fn find_exe_by_pid(&self, pid: u32) -> Option<String> {
        let outcome = self
            .exec(
                "findExeByPid",
                &format!("TASKLIST /FO CSV /NH /FI \"PID eq {pid}\""),
                TimeoutPolicy::Default,
            )
            .await;
        outcome.lines().and_then(parse_tasklist_exe)
    }

    /// 查找占用端口的进程，返回 `名称 (PID)` 或仅PID
    pub async fn get_process_using_port(&self, port: u16) -> Option<String> {
        let outcome = self
            .exec("getProcessUsingPort", "NETSTAT -aon", TimeoutPolicy::Default)
            .await;
        let pid = outcome.lines().and_then(|lines| parse_netstat_listening_pid(lines, port))?;

        match self.find_exe_by_pid(pid).await {
            Some(exe) => Some(format!("{exe} ({pid})")),
            None => Some(pid.to_string()),
        }
    }

    /// 获取操作系统版本信息
    pub async fn get_os_info(&self) -> Option<String> {
        self.exec("getOsInfo", "ver", TimeoutPolicy::Default)
            .await
            .into_lines()
            .and_then(|lines| lines.into_iter().next())
    }

    /// 修改服务显示名称
    pub async fn set_service_display_name(&self, service_name: &str, display_name: &str) -> bool {
        self.sc_config(
            "setServiceDisplayName",
            service_name,
            &format!("displayname= \"{display_name}\""),
        )
        .await
    }

    /// 修改服务描述
    pub async fn set_service_description(&self, service_name: &str, description: &str) -> bool {
        let outcome = self
            .exec(
                "setServiceDescription",
                &format!("sc description {service_name} \"{description}\""),
                TimeoutPolicy::Default,
            )
            .await;
        sc_succeeded(&outcome)
    }

    /// 修改服务启动类型（auto/delayed-auto/demand/disabled）
    pub async fn set_service_start_type(&self, service_name: &str, start_type: &str) -> bool {
        self.sc_config(
            "setServiceStartType",
            service_name,
            &format!("start= {start_type}"),
        )
        .await
    }

    async fn sc_config(&self, basename: &str, service_name: &str, setting: &str) -> bool {
        let outcome = self
            .exec(
                basename,
                &format!("sc config {service_name} {setting}"),
                TimeoutPolicy::Default,
            )
            .await;
        sc_succeeded(&outcome)
    }

    /// 通过 pg_ctl 注册 PostgreSQL 服务
    pub async fn install_postgresql_service(
        &self,
        ctl_exe: &Path,
        service_name: &str,
        display_name: &str,
        data_dir: &Path,
        error_log: &Path,
    ) -> bool {
        let content = format!(
            "\"{}\" register -N \"{}\" -U \"LocalSystem\" -D \"{}\" -l \"{}\" -w",
            ctl_exe.display(),
            service_name,
            data_dir.display(),
            error_log.display()
        );
        let registered = self
            .exec("installPostgresqlService", &content, TimeoutPolicy::Default)
            .await
            .is_success();
        if !registered {
            return false;
        }

        info!(target: "batch", "PostgreSQL服务已注册: {}", service_name);
        self.set_service_display_name(service_name, display_name).await;
        self.set_service_description(service_name, display_name).await;
        self.set_service_start_type(service_name, "demand").await;
        true
    }

    /// 通过 pg_ctl 注销 PostgreSQL 服务
    pub async fn uninstall_postgresql_service(&self, ctl_exe: &Path, service_name: &str) -> bool {
        let content = format!("\"{}\" unregister -N \"{}\"", ctl_exe.display(), service_name);
        self.exec("uninstallPostgresqlService", &content, TimeoutPolicy::Default)
            .await
            .is_success()
    }

    /// 通过 FileZilla Server 自带参数安装服务
    pub async fn install_filezilla_service(&self, exe: &Path) -> bool {
        self.exec(
            "installFilezillaService",
            &format!("\"{}\" /install", exe.display()),
            TimeoutPolicy::Default,
        )
        .await
        .is_success()
    }

    /// 卸载 FileZilla Server 服务
    pub async fn uninstall_filezilla_service(&self, exe: &Path) -> bool {
        self.exec(
            "uninstallFilezillaService",
            &format!("\"{}\" /uninstall", exe.display()),
            TimeoutPolicy::Default,
        )
        .await
        .is_success()
    }

    /// 运行组件目录下的 init.bat 初始化数据目录
    pub async fn initialize_data(&self, basename: &str, component_path: &Path, timeout_secs: u64) -> bool {
        let init_script = component_path.join("init.bat");
        if !init_script.is_file() {
            warn!(target: "batch", "初始化脚本不存在: {}", init_script.display());
            return false;
        }

        let content = format!(
            "CD /D \"{}\"\r\n\"{}\"",
            component_path.display(),
            init_script.display()
        );
        let timeout = TimeoutPolicy::Seconds(timeout_secs);
        match self
            .exec(basename, &content, timeout)
            .await
            .into_result(basename, timeout.resolve(self.runner.default_timeout()))
        {
            Ok(_) => true,
            Err(e) => {
                warn!(target: "batch", "数据目录初始化失败 {}: {}", component_path.display(), e);
                false
            }
        }
    }

    /// 创建目录联接
    pub async fn create_symlink(&self, src: &Path, dest: &Path) -> bool {
        let content = format!("mklink /J \"{}\" \"{}\"", dest.display(), src.display());
        let ok = self
            .exec("createSymlink", &content, TimeoutPolicy::Default)
            .await
            .is_success();
        debug!(target: "batch", "创建目录联接 {} -> {}: {}", dest.display(), src.display(), ok);
        ok
    }

    /// 删除目录联接
    pub async fn remove_symlink(&self, link: &Path) -> bool {
        self.exec(
            "removeSymlink",
            &format!("rmdir /Q \"{}\"", link.display()),
            TimeoutPolicy::Default,
        )
        .await
        .is_success()
    }
}

/// `sc` 命令输出中包含失败信息时视为失败
fn sc_succeeded(outcome: &ExecOutcome) -> bool {
    match outcome.lines() {
        Some(lines) => !lines.iter().any(|line| line.contains("FAILED")),
        None => false,
    }
}

/// 解析 `TASKLIST /FO CSV /NH` 输出，返回第一列的映像名称
pub fn parse_tasklist_exe(lines: &[String]) -> Option<String> {
    let line = lines.iter().find(|line| line.starts_with('"'))?;
    let name = line.split("\",\"").next()?.trim_matches('"');
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// 解析 `NETSTAT -aon` 输出，返回监听指定端口的进程PID
pub fn parse_netstat_listening_pid(lines: &[String], port: u16) -> Option<u32> {
    let suffix = format!(":{port}");
    lines.iter().find_map(|line| {
        if !line.contains("LISTENING") {
            return None;
        }
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 5 || !columns[1].ends_with(&suffix) {
            return None;
        }
        columns.last().and_then(|pid| pid.parse().ok())
    })
}
