//! 配置管理模块
//!
//! 提供配置文件解析、验证，以及运行期共享的应用上下文

pub mod context;
pub mod loader;
pub mod types;

// 重新导出主要类型
pub use context::AppContext;
pub use loader::{default_config_template, get_default_config_path, ConfigLoader, TomlConfigLoader};
pub use types::{validate_config, BinSettings, BinsConfig, GlobalConfig, PanelConfig};
