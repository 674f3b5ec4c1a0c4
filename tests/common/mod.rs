//! 集成测试公共工具
//!
//! 提供内存中的服务后端和临时安装目录

#![allow(dead_code)]

use async_trait::async_trait;
use bearsampp_panel::common::WaitPolicy;
use bearsampp_panel::config::{AppContext, BinSettings, BinsConfig, GlobalConfig, PanelConfig};
use bearsampp_panel::exec::ServiceInfos;
use bearsampp_panel::module::{BackendResolver, BuildOptions, UnitCatalog};
use bearsampp_panel::service::win32::Win32Error;
use bearsampp_panel::service::{
    Backend, ControlError, ControlResult, ServiceBackend, ServiceDescriptor, ServiceStatus,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 模拟 SCM 的内部状态
#[derive(Debug, Default)]
pub struct ScmState {
    /// 已注册的服务及其状态
    pub services: HashMap<String, ServiceStatus>,
    /// 已注册服务的描述
    pub descriptors: HashMap<String, ServiceDescriptor>,
    /// 按顺序记录的调用，形如 `start:bearsamppapache`
    pub calls: Vec<String>,
    /// 启动请求被接受但服务立即退出的服务名
    pub crashing: Vec<String>,
}

/// 内存中的服务后端，所有组件共享同一份状态
#[derive(Debug, Clone, Default)]
pub struct MockScm {
    state: Arc<Mutex<ScmState>>,
}

impl MockScm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让指定服务启动后立即退出
    pub fn crash_on_start(&self, name: &str) {
        self.lock().crashing.push(name.to_string());
    }

    /// 让已注册或未注册的服务停留在指定状态
    pub fn hold_status(&self, name: &str, status: ServiceStatus) {
        self.lock().services.insert(name.to_string(), status);
    }

    pub fn status_of(&self, name: &str) -> ServiceStatus {
        self.lock()
            .services
            .get(name)
            .copied()
            .unwrap_or(ServiceStatus::NotInstalled)
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_for(&self, action: &str) -> Vec<String> {
        let prefix = format!("{action}:");
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn descriptor_of(&self, name: &str) -> Option<ServiceDescriptor> {
        self.lock().descriptors.get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScmState> {
        self.state.lock().unwrap()
    }

    fn record(&self, action: &str, name: &str) {
        self.lock().calls.push(format!("{action}:{name}"));
    }
}

#[async_trait]
impl ServiceBackend for MockScm {
    fn label(&self) -> &'static str {
        "mock"
    }

    fn pending_timeout(&self) -> Duration {
        Duration::from_millis(200)
    }

    async fn query(&self, name: &str) -> ControlResult<ServiceStatus> {
        Ok(self.status_of(name))
    }

    async fn install(&self, descriptor: &ServiceDescriptor) -> ControlResult<()> {
        self.record("install", &descriptor.name);
        let mut state = self.lock();
        if state.services.contains_key(&descriptor.name) {
            return Err(ControlError::Win32(Win32Error::SERVICE_EXISTS));
        }
        state
            .services
            .insert(descriptor.name.clone(), ServiceStatus::Stopped);
        state
            .descriptors
            .insert(descriptor.name.clone(), descriptor.clone());
        Ok(())
    }

    async fn start(&self, name: &str) -> ControlResult<()> {
        self.record("start", name);
        let mut state = self.lock();
        let crashing = state.crashing.iter().any(|n| n == name);
        match state.services.get_mut(name) {
            None => Err(ControlError::Win32(Win32Error::SERVICE_DOES_NOT_EXIST)),
            Some(ServiceStatus::Running) => Err(ControlError::Win32(Win32Error::SERVICE_ALREADY_RUNNING)),
            Some(status) => {
                if !crashing {
                    *status = ServiceStatus::Running;
                }
                Ok(())
            }
        }
    }

    async fn stop(&self, name: &str) -> ControlResult<()> {
        self.record("stop", name);
        match self.lock().services.get_mut(name) {
            None => Err(ControlError::Win32(Win32Error::SERVICE_DOES_NOT_EXIST)),
            Some(status) if *status != ServiceStatus::Running => {
                Err(ControlError::Win32(Win32Error::SERVICE_NOT_ACTIVE))
            }
            Some(status) => {
                *status = ServiceStatus::Stopped;
                Ok(())
            }
        }
    }

    async fn remove(&self, name: &str) -> ControlResult<()> {
        self.record("remove", name);
        let mut state = self.lock();
        state.descriptors.remove(name);
        match state.services.remove(name) {
            Some(_) => Ok(()),
            None => Err(ControlError::Win32(Win32Error::SERVICE_DOES_NOT_EXIST)),
        }
    }

    async fn infos(&self, name: &str) -> Option<ServiceInfos> {
        let state = self.lock();
        let descriptor = state.descriptors.get(name)?;
        let status = state.services.get(name)?;
        Some(ServiceInfos {
            name: descriptor.name.clone(),
            display_name: descriptor.display_name.clone(),
            description: String::new(),
            path_name: descriptor.command_line(),
            state: status.to_string(),
        })
    }
}

/// 测试用的快速轮询策略
pub fn fast_policy() -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(5), Some(Duration::from_millis(200)))
}

/// 以 `root` 为安装根目录创建上下文
pub fn context(root: &Path, bins: BinsConfig) -> AppContext {
    let mut global = GlobalConfig::new(root);
    global.scripts_timeout_seconds = 10;
    AppContext::from_config(PanelConfig { global, bins })
}

/// 启用 Apache 和 MySQL 的组件配置
pub fn apache_and_mysql() -> BinsConfig {
    BinsConfig {
        apache: BinSettings::enabled("2.4.62"),
        mysql: BinSettings::enabled("8.4.3"),
        ..Default::default()
    }
}

/// 创建组件版本目录
pub fn create_version_dir(root: &Path, id: &str, version: &str) -> std::path::PathBuf {
    let dir = root.join("bin").join(id).join(format!("{id}{version}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 使用模拟后端构建组件目录
pub async fn mock_catalog(ctx: &AppContext, scm: &MockScm) -> UnitCatalog {
    let scm = scm.clone();
    let resolve = move |_name: &str, _backend: Backend| -> Box<dyn ServiceBackend> { Box::new(scm.clone()) };
    let resolver: &BackendResolver = &resolve;
    UnitCatalog::build(
        ctx,
        BuildOptions::default()
            .with_resolver(resolver)
            .with_wait_policy(fast_policy()),
    )
    .await
}
