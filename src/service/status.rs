//! 服务状态
//!
//! 状态值与 Service Control Manager 的 `dwCurrentState` 一一对应，
//! NSSM 输出的 `SERVICE_*` 文本同样映射到这里。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 服务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// 服务未安装
    NotInstalled,
    /// 已停止
    Stopped,
    /// 正在启动
    StartPending,
    /// 正在停止
    StopPending,
    /// 运行中
    Running,
    /// 正在恢复
    ContinuePending,
    /// 正在暂停
    PausePending,
    /// 已暂停
    Paused,
    /// 无法获取状态
    Unknown,
}

impl ServiceStatus {
    /// 从 SCM 状态码转换
    pub fn from_state_code(code: u32) -> Self {
        match code {
            1 => ServiceStatus::Stopped,
            2 => ServiceStatus::StartPending,
            3 => ServiceStatus::StopPending,
            4 => ServiceStatus::Running,
            5 => ServiceStatus::ContinuePending,
            6 => ServiceStatus::PausePending,
            7 => ServiceStatus::Paused,
            _ => ServiceStatus::Unknown,
        }
    }

    /// SCM 状态码，未安装和未知状态没有对应值
    pub fn state_code(&self) -> Option<u32> {
        match self {
            ServiceStatus::Stopped => Some(1),
            ServiceStatus::StartPending => Some(2),
            ServiceStatus::StopPending => Some(3),
            ServiceStatus::Running => Some(4),
            ServiceStatus::ContinuePending => Some(5),
            ServiceStatus::PausePending => Some(6),
            ServiceStatus::Paused => Some(7),
            ServiceStatus::NotInstalled | ServiceStatus::Unknown => None,
        }
    }

    /// 十六进制状态码文本，未安装为 `424`（服务不存在错误码），未知状态为 `0`
    pub fn code(&self) -> String {
        match self {
            ServiceStatus::NotInstalled => "424".to_string(),
            other => format!("{:x}", other.state_code().unwrap_or(0)),
        }
    }

    /// 从 NSSM `status` 命令输出转换
    pub fn from_nssm(value: &str) -> Self {
        match value.trim() {
            "SERVICE_STOPPED" => ServiceStatus::Stopped,
            "SERVICE_START_PENDING" => ServiceStatus::StartPending,
            "SERVICE_STOP_PENDING" => ServiceStatus::StopPending,
            "SERVICE_RUNNING" => ServiceStatus::Running,
            "SERVICE_CONTINUE_PENDING" => ServiceStatus::ContinuePending,
            "SERVICE_PAUSE_PENDING" => ServiceStatus::PausePending,
            "SERVICE_PAUSED" => ServiceStatus::Paused,
            "SERVICE_NOT_EXIST" => ServiceStatus::NotInstalled,
            _ => ServiceStatus::Unknown,
        }
    }

    /// NSSM 状态文本
    pub fn nssm_name(&self) -> &'static str {
        match self {
            ServiceStatus::NotInstalled => "SERVICE_NOT_EXIST",
            ServiceStatus::Stopped => "SERVICE_STOPPED",
            ServiceStatus::StartPending => "SERVICE_START_PENDING",
            ServiceStatus::StopPending => "SERVICE_STOP_PENDING",
            ServiceStatus::Running => "SERVICE_RUNNING",
            ServiceStatus::ContinuePending => "SERVICE_CONTINUE_PENDING",
            ServiceStatus::PausePending => "SERVICE_PAUSE_PENDING",
            ServiceStatus::Paused => "SERVICE_PAUSED",
            ServiceStatus::Unknown => "-1",
        }
    }

    /// 是否处于过渡状态
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ServiceStatus::StartPending
                | ServiceStatus::StopPending
                | ServiceStatus::ContinuePending
                | ServiceStatus::PausePending
        )
    }

    /// 状态是否已稳定（可以结束轮询）
    pub fn is_settled(&self) -> bool {
        !self.is_pending() && *self != ServiceStatus::Unknown
    }

    /// 状态描述
    pub fn description(&self) -> &'static str {
        match self {
            ServiceStatus::NotInstalled => "The specified service does not exist as an installed service.",
            ServiceStatus::Stopped => "The service is not running.",
            ServiceStatus::StartPending => "The service is starting.",
            ServiceStatus::StopPending => "The service is stopping.",
            ServiceStatus::Running => "The service is running.",
            ServiceStatus::ContinuePending => "The service continue is pending.",
            ServiceStatus::PausePending => "The service pause is pending.",
            ServiceStatus::Paused => "The service is paused.",
            ServiceStatus::Unknown => "Cannot retrieve service status.",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ServiceStatus::NotInstalled => "not installed",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::StartPending => "start pending",
            ServiceStatus::StopPending => "stop pending",
            ServiceStatus::Running => "running",
            ServiceStatus::ContinuePending => "continue pending",
            ServiceStatus::PausePending => "pause pending",
            ServiceStatus::Paused => "paused",
            ServiceStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code_round_trip() {
        for code in 1..=7 {
            let status = ServiceStatus::from_state_code(code);
            assert_eq!(status.state_code(), Some(code));
        }
        assert_eq!(ServiceStatus::from_state_code(42), ServiceStatus::Unknown);
        assert_eq!(ServiceStatus::Running.code(), "4");
        assert_eq!(ServiceStatus::Unknown.code(), "0");
        assert_eq!(ServiceStatus::NotInstalled.code(), "424");
    }

    #[test]
    fn test_from_nssm() {
        assert_eq!(ServiceStatus::from_nssm("SERVICE_RUNNING"), ServiceStatus::Running);
        assert_eq!(
            ServiceStatus::from_nssm(" SERVICE_STOP_PENDING "),
            ServiceStatus::StopPending
        );
        assert_eq!(ServiceStatus::from_nssm("garbage"), ServiceStatus::Unknown);
        assert_eq!(
            ServiceStatus::from_nssm(ServiceStatus::Paused.nssm_name()),
            ServiceStatus::Paused
        );
    }

    #[test]
    fn test_pending_and_settled() {
        assert!(ServiceStatus::StartPending.is_pending());
        assert!(!ServiceStatus::Running.is_pending());
        assert!(ServiceStatus::NotInstalled.is_settled());
        assert!(!ServiceStatus::Unknown.is_settled());
        assert!(!ServiceStatus::PausePending.is_settled());
    }

    #[test]
    fn test_display() {
        assert_eq!(ServiceStatus::NotInstalled.to_string(), "not installed");
        assert_eq!(
            ServiceStatus::Stopped.description(),
            "The service is not running."
        );
    }
}
