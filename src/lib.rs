//! Bearsampp Panel - Windows 本地开发环境控制面板
//!
//! 管理 Bearsampp 安装目录中的服务型组件，支持：
//! - 原生 Windows 服务与 NSSM 包装服务两种后端
//! - 组件版本切换与 `current` 链接校正
//! - 批处理 / VBScript 脚本桥接与注册表访问
//! - 服务安装、启停、批量编排和状态汇总
//! - 结构化日志记录

pub mod cli;
pub mod common;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod module;
pub mod orchestrator;
pub mod registry;
pub mod service;

// 重新导出主要类型
pub use config::{AppContext, GlobalConfig, PanelConfig};
pub use error::{PanelError, Result};
pub use module::{ServiceUnit, UnitCatalog};
pub use service::{ServiceController, ServiceStatus};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
