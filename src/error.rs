//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// 控制面板的主要错误类型
#[derive(Error, Debug)]
pub enum PanelError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 脚本执行相关错误
    #[error("脚本执行错误: {0}")]
    Exec(#[from] ExecError),

    /// 服务管理相关错误
    #[error("服务错误: {0}")]
    Service(#[from] ServiceError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 脚本执行错误类型
#[derive(Error, Debug)]
pub enum ExecError {
    /// 进程启动失败
    #[error("进程启动失败: {0}")]
    SpawnFailed(String),

    /// 执行超时
    #[error("脚本 {basename} 执行超时 ({seconds}秒)")]
    Timeout { basename: String, seconds: u64 },

    /// 执行被取消
    #[error("脚本执行被取消")]
    Cancelled,

    /// 临时脚本文件读写失败
    #[error("临时脚本文件错误: {0}")]
    Io(String),
}

/// 服务管理错误类型
#[derive(Error, Debug)]
pub enum ServiceError {
    /// 未知组件或服务
    #[error("未知的服务: {0}")]
    UnknownService(String),

    /// 当前平台不支持
    #[error("当前平台不支持: {0}")]
    Unsupported(String),

    /// 端口被其他程序占用
    #[error("端口 {port} 已被占用: {owner}")]
    PortInUse { port: u16, owner: String },

    /// 服务操作失败
    #[error("服务 {service} {action}失败: {detail}")]
    Operation {
        service: String,
        action: String,
        detail: String,
    },
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_and_display() {
        let err: PanelError = ConfigError::FileNotFound {
            path: "panel.toml".to_string(),
        }
        .into();
        assert!(err.to_string().contains("panel.toml"));

        let err: PanelError = ServiceError::PortInUse {
            port: 80,
            owner: "skype.exe".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "服务错误: 端口 80 已被占用: skype.exe");
    }

    #[test]
    fn test_exec_timeout_message() {
        let err = ExecError::Timeout {
            basename: "nssm".to_string(),
            seconds: 10,
        };
        assert!(err.to_string().contains("nssm"));
        assert!(err.to_string().contains("10"));
    }
}
