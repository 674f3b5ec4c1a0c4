//! 服务后端抽象
//!
//! [`ServiceBackend`] 统一了原生 SCM 调用与 NSSM 包装器两种实现；
//! 组件在构造时通过 [`Backend`] 选定其中之一，之后不再切换。

use crate::exec::{ScriptRunner, ServiceInfos};
use crate::service::descriptor::ServiceDescriptor;
use crate::service::native::NativeScm;
use crate::service::nssm::Nssm;
use crate::service::status::ServiceStatus;
use crate::service::win32::Win32Error;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// 原生服务的过渡状态超时
pub const NATIVE_PENDING_TIMEOUT: Duration = Duration::from_secs(20);
/// NSSM 服务的过渡状态超时
pub const WRAPPED_PENDING_TIMEOUT: Duration = Duration::from_secs(10);

/// 后端操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// SCM 返回的 Win32 错误码
    Win32(Win32Error),
    /// 后端输出的错误文本，操作可能仍已生效
    Message(String),
    /// 当前平台不支持该后端
    Unsupported(String),
}

impl ControlError {
    /// 是否表示服务不存在
    pub fn is_missing_service(&self) -> bool {
        matches!(self, ControlError::Win32(code) if code.is_missing_service())
    }

    /// 是否为确定性失败；文本错误需要再以状态查询确认
    pub fn is_hard(&self) -> bool {
        !matches!(self, ControlError::Message(_))
    }

    /// 是否等于指定错误码
    pub fn is_code(&self, expected: Win32Error) -> bool {
        matches!(self, ControlError::Win32(code) if *code == expected)
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Win32(code) => write!(f, "{code}"),
            ControlError::Message(message) => f.write_str(message),
            ControlError::Unsupported(message) => write!(f, "unsupported: {message}"),
        }
    }
}

/// 后端操作结果
pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// 服务后端特征
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// 后端名称
    fn label(&self) -> &'static str;

    /// 过渡状态超时
    fn pending_timeout(&self) -> Duration;

    /// 查询一次服务状态，服务不存在时返回 `Ok(NotInstalled)`
    async fn query(&self, name: &str) -> ControlResult<ServiceStatus>;

    /// 注册服务
    async fn install(&self, descriptor: &ServiceDescriptor) -> ControlResult<()>;

    /// 启动服务
    async fn start(&self, name: &str) -> ControlResult<()>;

    /// 停止服务
    async fn stop(&self, name: &str) -> ControlResult<()>;

    /// 注销服务
    async fn remove(&self, name: &str) -> ControlResult<()>;

    /// 读取服务注册信息
    async fn infos(&self, name: &str) -> Option<ServiceInfos>;
}

/// NSSM 包装器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperConfig {
    /// nssm.exe 路径
    pub nssm_exe: PathBuf,
    /// 过渡状态超时
    pub pending_timeout: Duration,
    /// 描述中未指定时使用的附加环境变量
    pub environment: Option<String>,
}

impl WrapperConfig {
    /// 创建新的包装器配置
    pub fn new(nssm_exe: impl Into<PathBuf>) -> Self {
        Self {
            nssm_exe: nssm_exe.into(),
            pending_timeout: WRAPPED_PENDING_TIMEOUT,
            environment: None,
        }
    }

    /// 设置附加环境变量
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }
}

/// 后端选择
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// 原生 Service Control Manager
    Native,
    /// 通过 NSSM 包装
    Wrapped(WrapperConfig),
}

impl Backend {
    /// 构造具体的后端实现
    pub fn resolve(self, runner: &ScriptRunner) -> Box<dyn ServiceBackend> {
        match self {
            Backend::Native => Box::new(NativeScm::new(runner.clone())),
            Backend::Wrapped(config) => Box::new(Nssm::new(runner.clone(), config)),
        }
    }

    /// 是否为 NSSM 包装
    pub fn is_wrapped(&self) -> bool {
        matches!(self, Backend::Wrapped(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_error_classification() {
        let missing = ControlError::Win32(Win32Error::SERVICE_DOES_NOT_EXIST);
        assert!(missing.is_missing_service());
        assert!(missing.is_hard());

        let message = ControlError::Message("Can't open service!".to_string());
        assert!(!message.is_hard());
        assert!(!message.is_missing_service());

        let running = ControlError::Win32(Win32Error::SERVICE_ALREADY_RUNNING);
        assert!(running.is_code(Win32Error::SERVICE_ALREADY_RUNNING));
    }

    #[test]
    fn test_resolve_backend_labels() {
        let runner = ScriptRunner::new(std::env::temp_dir(), Duration::from_secs(5));
        assert_eq!(Backend::Native.resolve(&runner).label(), "win32");

        let wrapped = Backend::Wrapped(WrapperConfig::new("C:/Bearsampp/core/libs/nssm/nssm.exe"));
        assert!(wrapped.is_wrapped());
        let control = wrapped.resolve(&runner);
        assert_eq!(control.label(), "nssm");
        assert_eq!(control.pending_timeout(), WRAPPED_PENDING_TIMEOUT);
    }
}
