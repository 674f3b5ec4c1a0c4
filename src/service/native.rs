//! 原生 Windows 服务后端
//!
//! 通过 Service Control Manager 直接注册、控制服务。SCM 调用是阻塞的，
//! 统一放到 `spawn_blocking` 中执行。

use crate::exec::{ScriptRunner, ServiceInfos, Vbs};
use crate::service::backend::{ControlError, ControlResult, ServiceBackend, NATIVE_PENDING_TIMEOUT};
use crate::service::descriptor::ServiceDescriptor;
use crate::service::status::ServiceStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

#[cfg(windows)]
use crate::service::win32::Win32Error;
#[cfg(windows)]
use std::ffi::OsString;
#[cfg(windows)]
use windows_service::{
    service::{ServiceAccess, ServiceErrorControl, ServiceInfo, ServiceStartType, ServiceState, ServiceType},
    service_manager::{ServiceManager, ServiceManagerAccess},
};

/// 原生 SCM 后端
#[derive(Debug, Clone)]
pub struct NativeScm {
    vbs: Vbs,
}

impl NativeScm {
    /// 创建新的原生后端
    pub fn new(runner: ScriptRunner) -> Self {
        Self { vbs: Vbs::new(runner) }
    }
}

#[async_trait]
impl ServiceBackend for NativeScm {
    fn label(&self) -> &'static str {
        "win32"
    }

    fn pending_timeout(&self) -> Duration {
        NATIVE_PENDING_TIMEOUT
    }

    async fn query(&self, name: &str) -> ControlResult<ServiceStatus> {
        let name = name.to_string();
        let status = blocking(move || scm::query(&name)).await?;
        debug!(target: "win32service", "查询状态: {}", status);
        Ok(status)
    }

    async fn install(&self, descriptor: &ServiceDescriptor) -> ControlResult<()> {
        let descriptor = descriptor.clone();
        let name = descriptor.name.clone();
        blocking(move || scm::install(&descriptor)).await?;
        info!(target: "win32service", "服务已注册: {}", name);
        Ok(())
    }

    async fn start(&self, name: &str) -> ControlResult<()> {
        let name = name.to_string();
        blocking(move || scm::start(&name)).await
    }

    async fn stop(&self, name: &str) -> ControlResult<()> {
        let name = name.to_string();
        blocking(move || scm::stop(&name)).await
    }

    async fn remove(&self, name: &str) -> ControlResult<()> {
        let name = name.to_string();
        blocking(move || scm::remove(&name)).await
    }

    async fn infos(&self, name: &str) -> Option<ServiceInfos> {
        self.vbs.get_service_infos(name).await
    }
}

/// 在阻塞线程池中执行 SCM 调用
async fn blocking<T, F>(call: F) -> ControlResult<T>
where
    F: FnOnce() -> ControlResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ControlError::Message(format!("SCM 调用线程异常: {e}")))?
}

#[cfg(windows)]
mod scm {
    use super::*;

    fn manager(access: ServiceManagerAccess) -> ControlResult<ServiceManager> {
        ServiceManager::local_computer(None::<&str>, access).map_err(map_error)
    }

    /// 把 windows-service 错误映射为 Win32 错误码
    fn map_error(error: windows_service::Error) -> ControlError {
        match error {
            windows_service::Error::Winapi(io) => match io.raw_os_error() {
                Some(code) => ControlError::Win32(Win32Error(code as u32)),
                None => ControlError::Message(io.to_string()),
            },
            other => ControlError::Message(other.to_string()),
        }
    }

    fn state_to_status(state: ServiceState) -> ServiceStatus {
        match state {
            ServiceState::Stopped => ServiceStatus::Stopped,
            ServiceState::StartPending => ServiceStatus::StartPending,
            ServiceState::StopPending => ServiceStatus::StopPending,
            ServiceState::Running => ServiceStatus::Running,
            ServiceState::ContinuePending => ServiceStatus::ContinuePending,
            ServiceState::PausePending => ServiceStatus::PausePending,
            ServiceState::Paused => ServiceStatus::Paused,
        }
    }

    pub(super) fn query(name: &str) -> ControlResult<ServiceStatus> {
        let manager = manager(ServiceManagerAccess::CONNECT)?;
        let service = match manager.open_service(name, ServiceAccess::QUERY_STATUS) {
            Ok(service) => service,
            Err(e) => {
                let error = map_error(e);
                if error.is_missing_service() {
                    return Ok(ServiceStatus::NotInstalled);
                }
                return Err(error);
            }
        };
        let status = service.query_status().map_err(map_error)?;
        Ok(state_to_status(status.current_state))
    }

    pub(super) fn install(descriptor: &ServiceDescriptor) -> ControlResult<()> {
        use crate::service::descriptor::StartType;

        let manager = manager(ServiceManagerAccess::CONNECT | ServiceManagerAccess::CREATE_SERVICE)?;
        let start_type = match descriptor.start_type {
            StartType::Auto | StartType::AutoDelayed => ServiceStartType::AutoStart,
            StartType::Demand => ServiceStartType::OnDemand,
            StartType::Disabled => ServiceStartType::Disabled,
        };
        let service_info = ServiceInfo {
            name: OsString::from(&descriptor.name),
            display_name: OsString::from(&descriptor.display_name),
            service_type: ServiceType::OWN_PROCESS,
            start_type,
            error_control: ServiceErrorControl::Normal,
            executable_path: descriptor.binary_path.clone(),
            launch_arguments: descriptor
                .argument_list()
                .into_iter()
                .map(OsString::from)
                .collect(),
            dependencies: vec![],
            account_name: None,
            account_password: None,
        };

        let service = manager
            .create_service(
                &service_info,
                ServiceAccess::CHANGE_CONFIG | ServiceAccess::QUERY_STATUS,
            )
            .map_err(map_error)?;
        service
            .set_description(&descriptor.display_name)
            .map_err(map_error)?;
        if descriptor.start_type == StartType::AutoDelayed {
            service.set_delayed_auto_start(true).map_err(map_error)?;
        }
        Ok(())
    }

    pub(super) fn start(name: &str) -> ControlResult<()> {
        let manager = manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(name, ServiceAccess::START)
            .map_err(map_error)?;
        service.start(&[] as &[&str]).map_err(map_error)
    }

    pub(super) fn stop(name: &str) -> ControlResult<()> {
        let manager = manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(name, ServiceAccess::STOP)
            .map_err(map_error)?;
        service.stop().map(|_| ()).map_err(map_error)
    }

    pub(super) fn remove(name: &str) -> ControlResult<()> {
        let manager = manager(ServiceManagerAccess::CONNECT)?;
        let service = manager
            .open_service(name, ServiceAccess::DELETE)
            .map_err(map_error)?;
        service.delete().map_err(map_error)
    }
}

#[cfg(not(windows))]
mod scm {
    use super::*;

    fn unsupported() -> ControlError {
        ControlError::Unsupported("原生服务后端只能在Windows系统上使用".to_string())
    }

    pub(super) fn query(_name: &str) -> ControlResult<ServiceStatus> {
        Err(unsupported())
    }

    pub(super) fn install(_descriptor: &ServiceDescriptor) -> ControlResult<()> {
        Err(unsupported())
    }

    pub(super) fn start(_name: &str) -> ControlResult<()> {
        Err(unsupported())
    }

    pub(super) fn stop(_name: &str) -> ControlResult<()> {
        Err(unsupported())
    }

    pub(super) fn remove(_name: &str) -> ControlResult<()> {
        Err(unsupported())
    }
}
