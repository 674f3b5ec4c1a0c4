//! 服务描述
//!
//! 组件在安装服务前构建 [`ServiceDescriptor`]，安装后只通过显式的 setter 修改。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 服务启动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StartType {
    /// 开机自动启动
    Auto,
    /// 延迟自动启动
    AutoDelayed,
    /// 手动启动
    #[default]
    Demand,
    /// 禁用
    Disabled,
}

impl StartType {
    /// NSSM `Start` 参数值
    pub fn nssm_value(&self) -> &'static str {
        match self {
            StartType::Auto => "SERVICE_AUTO_START",
            StartType::AutoDelayed => "SERVICE_DELAYED_AUTO_START",
            StartType::Demand => "SERVICE_DEMAND_START",
            StartType::Disabled => "SERVICE_DISABLED",
        }
    }

    /// `sc config start=` 参数值
    pub fn sc_value(&self) -> &'static str {
        match self {
            StartType::Auto => "auto",
            StartType::AutoDelayed => "delayed-auto",
            StartType::Demand => "demand",
            StartType::Disabled => "disabled",
        }
    }
}

/// 服务描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    /// 服务名
    pub name: String,
    /// 显示名称（同时用作描述）
    pub display_name: String,
    /// 可执行文件路径
    pub binary_path: PathBuf,
    /// 启动参数
    pub arguments: String,
    /// 启动类型
    pub start_type: StartType,
    /// 标准输出日志（仅 NSSM）
    pub stdout_path: Option<PathBuf>,
    /// 标准错误日志（仅 NSSM）
    pub stderr_path: Option<PathBuf>,
    /// 附加环境变量（仅 NSSM，`KEY=VALUE`）
    pub extra_environment: Option<String>,
}

impl ServiceDescriptor {
    /// 创建新的服务描述
    pub fn new(name: impl Into<String>, binary_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            binary_path: binary_path.into(),
            arguments: String::new(),
            start_type: StartType::default(),
            stdout_path: None,
            stderr_path: None,
            extra_environment: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    pub fn with_start_type(mut self, start_type: StartType) -> Self {
        self.start_type = start_type;
        self
    }

    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    pub fn with_stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = Some(path.into());
        self
    }

    /// 设置附加环境变量
    pub fn set_extra_environment(&mut self, environment: impl Into<String>) {
        self.extra_environment = Some(environment.into());
    }

    /// 设置启动参数
    pub fn set_arguments(&mut self, arguments: impl Into<String>) {
        self.arguments = arguments.into();
    }

    /// 设置可执行文件路径
    pub fn set_binary_path(&mut self, binary_path: &Path) {
        self.binary_path = binary_path.to_path_buf();
    }

    /// SCM 中登记的完整命令行
    pub fn command_line(&self) -> String {
        let binary = format!("\"{}\"", self.binary_path.display());
        if self.arguments.trim().is_empty() {
            binary
        } else {
            format!("{} {}", binary, self.arguments.trim())
        }
    }

    /// 启动参数按空白拆分（支持双引号包裹）
    pub fn argument_list(&self) -> Vec<String> {
        split_arguments(&self.arguments)
    }
}

/// 按空白拆分命令行参数，双引号内的空白保留
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for ch in arguments.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}
