//! Win32 服务错误码

use std::fmt;

/// Service Control Manager 返回的 Win32 错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Win32Error(pub u32);

impl Win32Error {
    pub const NO_ERROR: Self = Self(0x0);
    pub const PATH_NOT_FOUND: Self = Self(0x3);
    pub const ACCESS_DENIED: Self = Self(0x5);
    pub const INVALID_HANDLE: Self = Self(0x6);
    pub const INVALID_DATA: Self = Self(0xD);
    pub const INVALID_PARAMETER: Self = Self(0x57);
    pub const INSUFFICIENT_BUFFER: Self = Self(0x7A);
    pub const INVALID_NAME: Self = Self(0x7B);
    pub const INVALID_LEVEL: Self = Self(0x7C);
    pub const DEPENDENT_SERVICES_RUNNING: Self = Self(0x41B);
    pub const INVALID_SERVICE_CONTROL: Self = Self(0x41C);
    pub const SERVICE_REQUEST_TIMEOUT: Self = Self(0x41D);
    pub const SERVICE_NO_THREAD: Self = Self(0x41E);
    pub const SERVICE_DATABASE_LOCKED: Self = Self(0x41F);
    pub const SERVICE_ALREADY_RUNNING: Self = Self(0x420);
    pub const INVALID_SERVICE_ACCOUNT: Self = Self(0x421);
    pub const SERVICE_DISABLED: Self = Self(0x422);
    pub const CIRCULAR_DEPENDENCY: Self = Self(0x423);
    pub const SERVICE_DOES_NOT_EXIST: Self = Self(0x424);
    pub const SERVICE_CANNOT_ACCEPT_CTRL: Self = Self(0x425);
    pub const SERVICE_NOT_ACTIVE: Self = Self(0x426);
    pub const FAILED_SERVICE_CONTROLLER_CONNECT: Self = Self(0x427);
    pub const DATABASE_DOES_NOT_EXIST: Self = Self(0x429);
    pub const SERVICE_DEPENDENCY_FAIL: Self = Self(0x42C);
    pub const SERVICE_LOGON_FAILED: Self = Self(0x42D);
    pub const SERVICE_MARKED_FOR_DELETE: Self = Self(0x430);
    pub const SERVICE_EXISTS: Self = Self(0x431);
    pub const SERVICE_DEPENDENCY_DELETED: Self = Self(0x433);
    pub const DUPLICATE_SERVICE_NAME: Self = Self(0x436);
    pub const SHUTDOWN_IN_PROGRESS: Self = Self(0x45B);

    /// 数值错误码
    pub fn code(&self) -> u32 {
        self.0
    }

    /// 十六进制文本（小写，无前缀）
    pub fn hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// 是否为"服务不存在"
    pub fn is_missing_service(&self) -> bool {
        *self == Self::SERVICE_DOES_NOT_EXIST
    }

    /// 错误描述
    pub fn description(&self) -> Option<&'static str> {
        let desc = match *self {
            Self::NO_ERROR => "The operation completed successfully.",
            Self::PATH_NOT_FOUND => "The system cannot find the path specified.",
            Self::ACCESS_DENIED => "The handle to the SCM database does not have the appropriate access rights.",
            Self::INVALID_HANDLE => "The specified handle is invalid.",
            Self::INVALID_DATA => "The specified data is invalid.",
            Self::INVALID_PARAMETER => "A parameter that was specified is invalid.",
            Self::INSUFFICIENT_BUFFER => "The buffer is too small for the service status structure.",
            Self::INVALID_NAME => "The specified service name is invalid.",
            Self::INVALID_LEVEL => "The info level parameter contains an unsupported value.",
            Self::DEPENDENT_SERVICES_RUNNING => "The service cannot be stopped because other running services are dependent on it.",
            Self::INVALID_SERVICE_CONTROL => "The requested control code is not valid, or it is unacceptable to the service.",
            Self::SERVICE_REQUEST_TIMEOUT => "The process for the service was started, but it did not respond within the timeout period.",
            Self::SERVICE_NO_THREAD => "A thread could not be created for the service.",
            Self::SERVICE_DATABASE_LOCKED => "The database is locked.",
            Self::SERVICE_ALREADY_RUNNING => "An instance of the service is already running.",
            Self::INVALID_SERVICE_ACCOUNT => "The user account name specified does not exist.",
            Self::SERVICE_DISABLED => "The service has been disabled.",
            Self::CIRCULAR_DEPENDENCY => "A circular service dependency was specified.",
            Self::SERVICE_DOES_NOT_EXIST => "The specified service does not exist as an installed service.",
            Self::SERVICE_CANNOT_ACCEPT_CTRL => "The requested control code cannot be sent to the service in its current state.",
            Self::SERVICE_NOT_ACTIVE => "The service has not been started.",
            Self::FAILED_SERVICE_CONTROLLER_CONNECT => "The service process could not connect to the service controller.",
            Self::DATABASE_DOES_NOT_EXIST => "The specified database does not exist.",
            Self::SERVICE_DEPENDENCY_FAIL => "The service depends on another service that has failed to start.",
            Self::SERVICE_LOGON_FAILED => "The service did not start due to a logon failure.",
            Self::SERVICE_MARKED_FOR_DELETE => "The service has been marked for deletion.",
            Self::SERVICE_EXISTS => "The specified service already exists.",
            Self::SERVICE_DEPENDENCY_DELETED => "The service depends on a service that does not exist or has been marked for deletion.",
            Self::DUPLICATE_SERVICE_NAME => "The display name already exists in the SCM database.",
            Self::SHUTDOWN_IN_PROGRESS => "The system is shutting down.",
            _ => return None,
        };
        Some(desc)
    }
}

impl fmt::Display for Win32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} : {})",
            self.hex(),
            self.0,
            self.description().unwrap_or("Unknown error")
        )
    }
}

impl From<u32> for Win32Error {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_rendering() {
        assert_eq!(Win32Error::SERVICE_DOES_NOT_EXIST.hex(), "424");
        assert_eq!(Win32Error::SERVICE_DOES_NOT_EXIST.code(), 1060);
        assert_eq!(Win32Error::INVALID_DATA.hex(), "d");
    }

    #[test]
    fn test_display_includes_description() {
        let rendered = Win32Error::SERVICE_ALREADY_RUNNING.to_string();
        assert_eq!(
            rendered,
            "420 (1056 : An instance of the service is already running.)"
        );
        assert!(Win32Error(0xDEAD).to_string().contains("Unknown error"));
    }

    #[test]
    fn test_missing_service() {
        assert!(Win32Error::from(1060).is_missing_service());
        assert!(!Win32Error::ACCESS_DENIED.is_missing_service());
    }
}
