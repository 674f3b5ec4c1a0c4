//! 服务编排
//!
//! 安装、卸载、批量启停和状态汇总。所有操作按顺序执行，不会并发操作同一服务。

use crate::config::AppContext;
use crate::error::ServiceError;
use crate::module::{ServiceUnit, UnitCatalog};
use crate::service::ServiceStatus;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{error, info, warn};

/// 端口探测超时
const PORT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// 安装结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstallOutcome {
    /// 新注册并已启动
    Installed,
    /// 服务已注册
    AlreadyInstalled,
    /// 端口被本服务占用
    AlreadyRunning,
}

/// 服务状态汇总
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub service_name: String,
    pub version: Option<String>,
    pub enabled: bool,
    pub status: ServiceStatus,
    pub is_installed: bool,
    pub backend: &'static str,
    pub port: Option<u16>,
    pub error: Option<String>,
}

/// 检查本机端口是否被占用，占用时返回占用进程（未知时为 `N/A`）
pub async fn is_port_in_use(ctx: &AppContext, port: u16) -> Option<String> {
    let connect = TcpStream::connect(("127.0.0.1", port));
    match tokio::time::timeout(PORT_PROBE_TIMEOUT, connect).await {
        Ok(Ok(_stream)) => {
            let owner = ctx
                .batch()
                .get_process_using_port(port)
                .await
                .unwrap_or_else(|| "N/A".to_string());
            Some(owner)
        }
        _ => None,
    }
}

/// 安装并启动服务
pub async fn install_service(ctx: &AppContext, unit: &dyn ServiceUnit) -> Result<InstallOutcome, ServiceError> {
    let name = unit.name().to_string();
    let controller = unit.controller();
    let port_owner = match unit.port() {
        Some(port) => is_port_in_use(ctx, port).await,
        None => None,
    };

    let Some(owner) = port_owner else {
        if controller.is_installed().await {
            warn!(target: "panel", "{} 服务已安装", name);
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        controller.create().await;
        if controller.start().await {
            info!(
                target: "panel",
                "{} 服务安装成功 (服务名: {} ; 端口: {})",
                name,
                controller.name(),
                unit.port().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())
            );
            return Ok(InstallOutcome::Installed);
        }

        let detail = failure_detail(unit);
        error!(target: "panel", "{} 服务安装失败: {}", name, detail);
        return Err(ServiceError::Operation {
            service: name,
            action: "安装".to_string(),
            detail,
        });
    };

    if controller.is_running().await {
        warn!(target: "panel", "{} 服务已安装并在运行", name);
        return Ok(InstallOutcome::AlreadyRunning);
    }

    let port = unit.port().unwrap_or_default();
    error!(target: "panel", "端口 {} 已被其他程序占用: {}", port, owner);
    Err(ServiceError::PortInUse { port, owner })
}

/// 卸载服务，服务不存在时视为成功
pub async fn remove_service(unit: &dyn ServiceUnit) -> Result<(), ServiceError> {
    let controller = unit.controller();
    if !controller.is_installed().await {
        warn!(target: "panel", "{} 服务不存在", unit.name());
        return Ok(());
    }
    if controller.delete().await {
        info!(target: "panel", "{} 服务已卸载", unit.name());
        return Ok(());
    }

    let detail = failure_detail(unit);
    error!(target: "panel", "{} 服务卸载失败: {}", unit.name(), detail);
    Err(ServiceError::Operation {
        service: unit.name().to_string(),
        action: "卸载".to_string(),
        detail,
    })
}

/// 启动服务
pub async fn start_service(unit: &dyn ServiceUnit) -> Result<(), ServiceError> {
    if unit.controller().start().await {
        return Ok(());
    }
    let detail = failure_detail(unit);
    error!(target: "panel", "{} 服务启动失败: {}", unit.name(), detail);
    Err(ServiceError::Operation {
        service: unit.name().to_string(),
        action: "启动".to_string(),
        detail,
    })
}

/// 停止服务
pub async fn stop_service(unit: &dyn ServiceUnit) -> Result<(), ServiceError> {
    if unit.controller().stop().await {
        return Ok(());
    }
    let detail = failure_detail(unit);
    Err(ServiceError::Operation {
        service: unit.name().to_string(),
        action: "停止".to_string(),
        detail,
    })
}

/// 重启服务
pub async fn restart_service(unit: &dyn ServiceUnit) -> Result<(), ServiceError> {
    if unit.controller().restart().await {
        return Ok(());
    }
    let detail = failure_detail(unit);
    Err(ServiceError::Operation {
        service: unit.name().to_string(),
        action: "重启".to_string(),
        detail,
    })
}

/// 按顺序启动所有已启用的组件，未安装的先安装
pub async fn start_all(ctx: &AppContext, catalog: &UnitCatalog) -> Vec<(String, Result<(), ServiceError>)> {
    let mut results = Vec::new();
    for unit in catalog.enabled() {
        if ctx.cancellation().is_cancelled() {
            warn!(target: "panel", "操作已取消，跳过剩余组件");
            break;
        }
        let result = if unit.controller().is_installed().await {
            start_service(unit).await
        } else {
            install_service(ctx, unit).await.map(|_| ())
        };
        results.push((unit.id().to_string(), result));
    }
    results
}

/// 按启动的相反顺序停止所有已安装的组件
pub async fn stop_all(ctx: &AppContext, catalog: &UnitCatalog) -> Vec<(String, Result<(), ServiceError>)> {
    let mut results = Vec::new();
    for unit in catalog.units().into_iter().rev() {
        if ctx.cancellation().is_cancelled() {
            warn!(target: "panel", "操作已取消，跳过剩余组件");
            break;
        }
        if !unit.controller().is_installed().await {
            continue;
        }
        results.push((unit.id().to_string(), stop_service(unit).await));
    }
    results
}

/// 查询单个组件状态
pub async fn service_info(unit: &dyn ServiceUnit) -> ServiceInfo {
    let controller = unit.controller();
    let status = controller.status(true).await;
    ServiceInfo {
        name: unit.name().to_string(),
        service_name: unit.service_name().to_string(),
        version: unit.version().map(str::to_string),
        enabled: unit.is_enabled(),
        status,
        is_installed: !matches!(status, ServiceStatus::NotInstalled | ServiceStatus::Unknown),
        backend: unit.backend(),
        port: unit.port(),
        error: controller.get_error(),
    }
}

/// 所有组件的状态汇总
pub async fn status_report(catalog: &UnitCatalog, include_disabled: bool) -> Vec<ServiceInfo> {
    let mut report = Vec::new();
    for unit in catalog.iter() {
        if include_disabled || unit.is_enabled() {
            report.push(service_info(unit).await);
        }
    }
    report
}

/// `<名称> <版本> (<服务名>)`
pub fn display_name_for(unit: &dyn ServiceUnit) -> String {
    format!(
        "{} {} ({})",
        unit.name(),
        unit.version().unwrap_or("-"),
        unit.service_name()
    )
}

/// 失败详情：后端错误加上配置检查结果
fn failure_detail(unit: &dyn ServiceUnit) -> String {
    let controller = unit.controller();
    let mut detail = controller
        .get_error()
        .unwrap_or_else(|| "状态确认失败".to_string());
    if let Some(diagnosis) = controller.latest_diagnosis() {
        detail.push_str(&format!(" (配置错误: {})", diagnosis.content));
    }
    detail
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, PanelConfig};
    use tokio::net::TcpListener;

    fn context() -> AppContext {
        let dir = std::env::temp_dir();
        AppContext::from_config(PanelConfig {
            global: GlobalConfig::new(dir),
            bins: Default::default(),
        })
    }

    #[tokio::test]
    async fn test_free_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert_eq!(is_port_in_use(&context(), port).await, None);
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(is_port_in_use(&context(), port).await.is_some());
    }

    #[tokio::test]
    async fn test_display_name_for() {
        let ctx = AppContext::from_config(PanelConfig {
            global: GlobalConfig::new("/opt/bearsampp"),
            bins: crate::config::BinsConfig {
                apache: crate::config::BinSettings::enabled("2.4.62"),
                ..Default::default()
            },
        });
        let catalog = UnitCatalog::new(&ctx).await;
        assert_eq!(display_name_for(catalog.apache()), "Apache 2.4.62 (bearsamppapache)");
        assert_eq!(display_name_for(catalog.xlight()), "Xlight - (bearsamppxlight)");
    }
}
