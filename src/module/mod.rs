//! 组件管理模块
//!
//! 版本化组件、`current` 链接维护，以及可注册为服务的组件目录

pub mod bins;
pub mod catalog;
pub mod component;
pub mod conf;
pub mod symlink;
pub mod unit;

// 重新导出主要类型
pub use catalog::UnitCatalog;
pub use component::{compare_versions, version_at_least, Module, ModuleKind, CURRENT_LINK};
pub use conf::{LocalConf, LOCAL_CONF_FILE};
pub use symlink::{reconcile_symlink, SymlinkOutcome, SymlinkPlan};
pub use unit::{BackendResolver, BuildOptions, ServiceUnit};
