//! MySQL 与 MariaDB
//!
//! 两者的服务注册方式相同，只在配置键名和数据目录初始化条件上不同。

use crate::config::{AppContext, BinSettings};
use crate::exec::batch::{MYSQL_INIT_TIMEOUT, NULL_DEVICE};
use crate::exec::{Batch, TimeoutPolicy};
use crate::module::bins::{exe_path, log_file, strip_exe, BinUnit, Mysql};
use crate::module::component::{version_at_least, Module, ModuleKind};
use crate::module::unit::BuildOptions;
use crate::service::{Backend, CmdLineOutput, LifecycleHooks, ServiceDescriptor, StartType};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// 语法检查超时
const SYNTAX_CHECK_TIMEOUT: u64 = 5;
/// 从该版本开始需要显式初始化数据目录
const MYSQL_INIT_MIN_VERSION: &str = "5.7.0";

/// 数据库发行版
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbFlavor {
    Mysql,
    Mariadb,
}

impl DbFlavor {
    pub fn id(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "mysql",
            DbFlavor::Mariadb => "mariadb",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "MySQL",
            DbFlavor::Mariadb => "MariaDB",
        }
    }

    pub fn service_name(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "bearsamppmysql",
            DbFlavor::Mariadb => "bearsamppmariadb",
        }
    }

    fn exe_key(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "mysqlExe",
            DbFlavor::Mariadb => "mariadbExe",
        }
    }

    fn port_key(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "mysqlPort",
            DbFlavor::Mariadb => "mariadbPort",
        }
    }

    fn log_file(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "mysql.log",
            DbFlavor::Mariadb => "mariadb.log",
        }
    }

    fn init_basename(&self) -> &'static str {
        match self {
            DbFlavor::Mysql => "initializeMysql",
            DbFlavor::Mariadb => "initializeMariadb",
        }
    }

    fn settings<'a>(&self, ctx: &'a AppContext) -> &'a BinSettings {
        match self {
            DbFlavor::Mysql => &ctx.config().bins.mysql,
            DbFlavor::Mariadb => &ctx.config().bins.mariadb,
        }
    }

    /// 该版本是否需要初始化数据目录
    pub fn needs_init(&self, version: Option<&str>) -> bool {
        match self {
            DbFlavor::Mysql => version.is_some_and(|v| version_at_least(v, MYSQL_INIT_MIN_VERSION)),
            DbFlavor::Mariadb => true,
        }
    }
}

/// MySQL/MariaDB 钩子
#[derive(Debug, Clone)]
pub struct MysqlHooks {
    flavor: DbFlavor,
    version: Option<String>,
    exe: PathBuf,
    current_path: PathBuf,
    data_path: PathBuf,
    error_log: PathBuf,
    batch: Batch,
}

impl MysqlHooks {
    pub fn flavor(&self) -> DbFlavor {
        self.flavor
    }

    /// `data` 目录缺失时运行组件自带的初始化脚本
    async fn init_data(&self) -> bool {
        if !self.flavor.needs_init(self.version.as_deref()) || self.data_path.is_dir() {
            return true;
        }
        info!(target: "panel", "初始化 {} 数据目录: {}", self.flavor.display_name(), self.data_path.display());
        let ok = self
            .batch
            .initialize_data(self.flavor.init_basename(), &self.current_path, MYSQL_INIT_TIMEOUT)
            .await;
        if !ok {
            warn!(target: "panel", "{} 数据目录初始化失败", self.flavor.display_name());
        }
        ok
    }
}

#[async_trait]
impl LifecycleHooks for MysqlHooks {
    async fn prepare_create(&self) -> bool {
        self.init_data().await;
        true
    }

    async fn prepare_start(&self) -> bool {
        self.init_data().await;
        true
    }

    async fn syntax_check(&self) -> Option<CmdLineOutput> {
        if !self.exe.is_file() {
            return None;
        }
        let content = format!(
            "\"{}\" --help --verbose 1>{}",
            self.exe.display(),
            NULL_DEVICE
        );
        let basename = format!("{}GetCmdLineOutput", self.flavor.id());
        let outcome = self
            .batch
            .exec(&basename, &content, TimeoutPolicy::Seconds(SYNTAX_CHECK_TIMEOUT))
            .await;
        outcome.lines().map(|lines| syntax_output(lines, &self.exe))
    }

    fn error_log(&self) -> Option<PathBuf> {
        Some(self.error_log.clone())
    }
}

/// 没有输出，或最后一行不含 `[ERROR]` 时通过
pub fn syntax_output(lines: &[String], exe: &Path) -> CmdLineOutput {
    let syntax_ok = lines.last().map_or(true, |line| !line.contains("[ERROR]"));
    CmdLineOutput::new(syntax_ok, strip_exe(lines, exe))
}

/// MySQL 或 MariaDB 组件信息，尚未加载
pub fn module(ctx: &AppContext, flavor: DbFlavor) -> Module {
    Module::new(
        ModuleKind::Bin,
        flavor.id(),
        flavor.display_name(),
        flavor.settings(ctx),
        ctx,
    )
}

/// 使用已同步的组件信息构建 MySQL 或 MariaDB 组件
pub fn build(ctx: &AppContext, flavor: DbFlavor, module: Module, options: BuildOptions<'_>) -> Mysql {
    let exe = exe_path(&module, flavor.exe_key());
    let port = module.conf_port(flavor.port_key());
    let hooks = Arc::new(MysqlHooks {
        flavor,
        version: module.version().map(str::to_string),
        exe: exe.clone(),
        current_path: module.current_path().to_path_buf(),
        data_path: module.symlink_path().join("data"),
        error_log: log_file(ctx, flavor.log_file()),
        batch: ctx.batch(),
    });

    let descriptor = ServiceDescriptor::new(flavor.service_name(), exe)
        .with_display_name(ctx.display_name(module.name()))
        .with_arguments(flavor.service_name())
        .with_start_type(StartType::Demand);
    let controller = options.controller(ctx, descriptor, Backend::Native, hooks.clone());
    BinUnit::new(module, port, hooks, controller)
}
