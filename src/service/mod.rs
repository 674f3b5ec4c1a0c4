//! 服务生命周期管理模块
//!
//! 在原生 SCM 与 NSSM 两种后端之上提供统一的创建、启动、停止、删除和状态查询

pub mod backend;
pub mod controller;
pub mod descriptor;
pub mod hooks;
pub mod native;
pub mod nssm;
pub mod status;
pub mod win32;

// 重新导出主要类型
pub use backend::{
    Backend, ControlError, ControlResult, ServiceBackend, WrapperConfig, NATIVE_PENDING_TIMEOUT,
    WRAPPED_PENDING_TIMEOUT,
};
pub use controller::ServiceController;
pub use descriptor::{ServiceDescriptor, StartType};
pub use hooks::{CmdLineOutput, LifecycleHooks};
pub use native::NativeScm;
pub use nssm::Nssm;
pub use status::ServiceStatus;
pub use win32::Win32Error;
