//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bearsampp 控制面板 - 服务与组件管理工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bearsampp-panel",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "BEARSAMPP_PANEL_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别（未指定时使用配置文件中的级别）
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "BEARSAMPP_PANEL_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 是否启用详细输出
    #[arg(short, long, help = "启用详细输出")]
    pub verbose: bool,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 查看组件服务状态
    Status {
        /// 组件 id 或服务名（可选，不指定则显示所有已启用组件）
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,

        /// 包含未启用的组件
        #[arg(short, long, help = "包含未启用的组件")]
        all: bool,
    },

    /// 安装并启动组件服务
    Install {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,
    },

    /// 卸载组件服务
    Uninstall {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,
    },

    /// 启动组件服务
    Start {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,
    },

    /// 停止组件服务
    Stop {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,
    },

    /// 重启组件服务
    Restart {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,
    },

    /// 查看服务注册信息
    Infos {
        #[arg(value_name = "ID", help = "组件 id 或服务名")]
        id: String,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 启动所有已启用的组件
    StartAll,

    /// 停止所有已安装的组件
    StopAll,

    /// 重新加载组件并校正 current 链接
    Reload,

    /// 初始化配置文件
    Init {
        /// 安装根目录
        #[arg(value_name = "ROOT", help = "安装根目录")]
        root_path: PathBuf,

        /// 配置文件路径
        #[arg(
            short,
            long,
            value_name = "FILE",
            help = "配置文件路径",
            default_value = "bearsampp-panel.toml"
        )]
        output: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

impl Commands {
    /// 是否需要加载配置并构建应用上下文
    pub fn needs_context(&self) -> bool {
        !matches!(
            self,
            Commands::Init { .. } | Commands::Validate { .. } | Commands::Version { .. }
        )
    }
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 解析命令行参数
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }

    /// 是否启用详细输出
    pub fn is_verbose(&self) -> bool {
        self.verbose || matches!(self.log_level, Some(LogLevel::Debug))
    }

    /// 实际使用的日志级别
    ///
    /// 命令行指定的级别优先，其次是 `fallback`（配置文件中的级别），`--verbose` 至少为 debug。
    pub fn effective_log_level(&self, fallback: Option<&str>) -> log::LevelFilter {
        let level = match &self.log_level {
            Some(level) => level.clone().into(),
            None => fallback
                .and_then(|value| value.parse().ok())
                .unwrap_or(log::LevelFilter::Info),
        };
        if self.verbose {
            level.max(log::LevelFilter::Debug)
        } else {
            level
        }
    }
}
