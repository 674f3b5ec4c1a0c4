//! 服务控制器
//!
//! 在选定的后端之上提供统一的生命周期操作。每个变更操作完成后都会
//! 重新查询状态作为确认，而不是只信任后端的返回值。

use crate::common::{poll_until, sleep_or_cancel, Probe, WaitPolicy, DEFAULT_POLL_INTERVAL};
use crate::exec::{ScriptRunner, ServiceInfos};
use crate::logging::{self, LoggingSystem};
use crate::service::backend::{Backend, ControlError, ServiceBackend};
use crate::service::descriptor::ServiceDescriptor;
use crate::service::hooks::{CmdLineOutput, LifecycleHooks};
use crate::service::status::ServiceStatus;
use crate::service::win32::Win32Error;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 最近一次操作的观察结果
#[derive(Debug, Clone, Default)]
struct Observed {
    status: Option<ServiceStatus>,
    error: Option<ControlError>,
    diagnosis: Option<CmdLineOutput>,
}

/// 服务控制器
pub struct ServiceController {
    descriptor: ServiceDescriptor,
    control: Box<dyn ServiceBackend>,
    hooks: Option<Arc<dyn LifecycleHooks>>,
    policy: WaitPolicy,
    cancel: CancellationToken,
    observed: Mutex<Observed>,
}

impl std::fmt::Debug for ServiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceController")
            .field("service", &self.descriptor.name)
            .field("backend", &self.control.label())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ServiceController {
    /// 创建新的服务控制器，后端在此处一次性确定
    pub fn new(descriptor: ServiceDescriptor, backend: Backend, runner: &ScriptRunner) -> Self {
        Self::with_backend(descriptor, backend.resolve(runner))
            .with_cancellation(runner.cancellation().clone())
    }

    /// 使用指定的后端实现创建控制器
    pub fn with_backend(descriptor: ServiceDescriptor, control: Box<dyn ServiceBackend>) -> Self {
        let policy = WaitPolicy::new(DEFAULT_POLL_INTERVAL, Some(control.pending_timeout()));
        Self {
            descriptor,
            control,
            hooks: None,
            policy,
            cancel: CancellationToken::new(),
            observed: Mutex::new(Observed::default()),
        }
    }

    /// 注入组件钩子
    pub fn with_hooks(mut self, hooks: Arc<dyn LifecycleHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// 覆盖轮询策略
    pub fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 绑定取消令牌
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// 修改服务描述，下次注册时生效
    pub fn descriptor_mut(&mut self) -> &mut ServiceDescriptor {
        &mut self.descriptor
    }

    /// 后端名称
    pub fn backend_label(&self) -> &'static str {
        self.control.label()
    }

    /// 轮询策略
    pub fn wait_policy(&self) -> WaitPolicy {
        self.policy
    }

    /// 查询服务状态
    ///
    /// 先等待一次再开始轮询；`timeout` 为 `false` 时一直等到状态稳定或被取消。
    pub async fn status(&self, timeout: bool) -> ServiceStatus {
        let policy = if timeout {
            self.policy
        } else {
            self.policy.without_timeout()
        };
        self.record_status(ServiceStatus::Unknown);

        let name = self.descriptor.name.as_str();
        let this = self;
        let outcome = poll_until(policy, &self.cancel, move || async move { this.probe(name).await }).await;

        let status = outcome.into_last().unwrap_or(ServiceStatus::Unknown);
        self.record_status(status);
        debug!(target: "win32service", "{} 状态: {} ({})", name, status, status.code());
        status
    }

    async fn probe(&self, name: &str) -> Probe<ServiceStatus> {
        match self.control.query(name).await {
            Ok(status) if status.is_settled() => Probe::Done(status),
            Ok(status) => Probe::Pending(status),
            Err(e @ ControlError::Unsupported(_)) => {
                self.record_error(e);
                Probe::Done(ServiceStatus::Unknown)
            }
            Err(e) => {
                warn!(target: "win32service", "{} 状态查询失败: {}", name, e);
                self.record_error(e);
                Probe::Pending(ServiceStatus::Unknown)
            }
        }
    }

    pub async fn is_installed(&self) -> bool {
        !matches!(
            self.status(true).await,
            ServiceStatus::NotInstalled | ServiceStatus::Unknown
        )
    }

    pub async fn is_running(&self) -> bool {
        self.status(true).await == ServiceStatus::Running
    }

    pub async fn is_stopped(&self) -> bool {
        self.status(true).await == ServiceStatus::Stopped
    }

    pub async fn is_paused(&self) -> bool {
        self.status(true).await == ServiceStatus::Paused
    }

    /// 注册服务
    pub async fn create(&self) -> bool {
        self.clear_error();
        let name = self.descriptor.name.clone();
        info!(target: "win32service", "创建服务 {} ({})", name, self.control.label());

        if let Some(hooks) = &self.hooks {
            if !hooks.prepare_create().await {
                error!(target: "win32service", "{} 创建前准备失败", name);
                return self.finish("create", false);
            }
        }

        let custom = match &self.hooks {
            Some(hooks) => hooks.custom_install(&self.descriptor).await,
            None => None,
        };
        match custom {
            Some(false) => return self.finish("create", false),
            Some(true) => {}
            None => {
                if let Err(e) = self.control.install(&self.descriptor).await {
                    error!(target: "win32service", "{} 注册失败: {}", name, e);
                    let hard = e.is_hard();
                    self.record_error(e);
                    if hard {
                        return self.finish("create", false);
                    }
                }
            }
        }

        let installed = self.is_installed().await;
        self.finish("create", installed)
    }

    /// 注销服务，服务不存在时视为成功
    pub async fn delete(&self) -> bool {
        self.clear_error();
        let name = self.descriptor.name.clone();
        if !self.is_installed().await {
            debug!(target: "win32service", "{} 未安装，无需删除", name);
            return true;
        }

        info!(target: "win32service", "删除服务 {}", name);
        self.stop().await;

        let custom = match &self.hooks {
            Some(hooks) => hooks.custom_uninstall().await,
            None => None,
        };
        let removed = match custom {
            Some(removed) => removed,
            None => match self.control.remove(&name).await {
                Ok(()) => true,
                Err(e) if e.is_missing_service() => true,
                Err(e) => {
                    error!(target: "win32service", "{} 删除失败: {}", name, e);
                    let hard = e.is_hard();
                    self.record_error(e);
                    !hard
                }
            },
        };
        if !removed {
            return self.finish("delete", false);
        }

        let gone = !self.is_installed().await;
        self.finish("delete", gone)
    }

    /// 重建服务：删除、稍候、重新注册
    pub async fn reset(&self) -> bool {
        if !self.delete().await {
            return false;
        }
        if !sleep_or_cancel(self.policy.interval, &self.cancel).await {
            return false;
        }
        self.create().await
    }

    /// 启动服务
    pub async fn start(&self) -> bool {
        self.clear_error();
        let name = self.descriptor.name.clone();
        info!(target: "win32service", "启动服务 {}", name);

        if let Some(hooks) = &self.hooks {
            if !hooks.prepare_start().await {
                error!(target: "win32service", "{} 启动前准备失败", name);
                return self.finish("start", false);
            }
        }

        match self.control.start(&name).await {
            Ok(()) => {}
            Err(e) if e.is_code(Win32Error::SERVICE_ALREADY_RUNNING) => {
                debug!(target: "win32service", "{} 已在运行", name);
            }
            Err(e) => {
                error!(target: "win32service", "{} 启动失败: {}", name, e);
                let hard = e.is_hard();
                self.record_error(e);
                if hard {
                    self.diagnose_start_failure().await;
                    return self.finish("start", false);
                }
            }
        }

        if !self.is_running().await {
            self.diagnose_start_failure().await;
            return self.finish("start", false);
        }
        self.finish("start", true)
    }

    /// 停止服务，已停止的服务视为成功
    pub async fn stop(&self) -> bool {
        self.clear_error();
        let name = self.descriptor.name.clone();
        info!(target: "win32service", "停止服务 {}", name);

        match self.control.stop(&name).await {
            Ok(()) => {}
            Err(e) if e.is_code(Win32Error::SERVICE_NOT_ACTIVE) => {
                debug!(target: "win32service", "{} 未在运行", name);
            }
            Err(e) => {
                warn!(target: "win32service", "{} 停止失败: {}", name, e);
                let hard = e.is_hard();
                self.record_error(e);
                if hard {
                    return self.finish("stop", false);
                }
            }
        }

        let stopped = self.is_stopped().await;
        self.finish("stop", stopped)
    }

    /// 重启服务，停止失败时不再启动
    pub async fn restart(&self) -> bool {
        self.stop().await && self.start().await
    }

    /// 读取服务注册信息
    pub async fn infos(&self) -> Option<ServiceInfos> {
        self.control.infos(&self.descriptor.name).await
    }

    /// 最近一次查询到的状态
    pub fn latest_status(&self) -> Option<ServiceStatus> {
        self.lock().status
    }

    /// 最近一次后端错误
    pub fn latest_error(&self) -> Option<ControlError> {
        self.lock().error.clone()
    }

    /// 最近一次启动失败时的语法检查结果（仅记录未通过的检查）
    pub fn latest_diagnosis(&self) -> Option<CmdLineOutput> {
        self.lock().diagnosis.clone()
    }

    /// 面向用户的错误描述
    pub fn get_error(&self) -> Option<String> {
        let observed = self.lock().clone();
        if let Some(error) = observed.error {
            return Some(format!("Error: {error}"));
        }
        match observed.status {
            Some(ServiceStatus::Unknown) | None => None,
            Some(status) => Some(format!("Status: {} ({})", status.code(), status.description())),
        }
    }

    /// 启动失败时运行语法检查，并把结果追加到组件错误日志
    async fn diagnose_start_failure(&self) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let Some(output) = hooks.syntax_check().await else {
            return;
        };
        if output.syntax_ok {
            debug!(target: "win32service", "{} 配置语法检查通过", self.descriptor.name);
            return;
        }

        error!(
            target: "win32service",
            "{} 配置语法检查失败: {}",
            self.descriptor.name,
            output.content
        );
        self.lock().diagnosis = Some(output.clone());
        if let Some(log_path) = hooks.error_log() {
            if let Err(e) = append_error_line(&log_path, &output.content).await {
                warn!(target: "win32service", "写入错误日志失败 {}: {}", log_path.display(), e);
            }
        }
    }

    fn finish(&self, action: &str, success: bool) -> bool {
        let json_format = LoggingSystem::current_config().is_some_and(|config| config.json_format);
        let detail = self.get_error();
        logging::audit(json_format, action, &self.descriptor.name, success, detail.as_deref());
        success
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Observed> {
        self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_status(&self, status: ServiceStatus) {
        self.lock().status = Some(status);
    }

    fn record_error(&self, error: ControlError) {
        self.lock().error = Some(error);
    }

    fn clear_error(&self) {
        let mut observed = self.lock();
        observed.error = None;
        observed.diagnosis = None;
    }
}

/// 追加 `[YYYY-MM-DD HH:MM:SS] [error] <content>` 到日志文件
pub async fn append_error_line(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let line = format!(
        "[{}] [error] {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        content
    );
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_error_line_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("logs").join("mysql.log");

        append_error_line(&log, "unknown variable 'foo=bar'").await.unwrap();
        append_error_line(&log, "second").await.unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] [error] unknown variable 'foo=bar'"));
        // [YYYY-MM-DD HH:MM:SS]
        assert_eq!(lines[0].find(']'), Some(20));
    }
}
