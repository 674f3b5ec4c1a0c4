//! Windows 注册表访问
//!
//! 通过生成的 VBScript（`WScript.Shell` 与 `StdRegProv`）读写注册表，
//! 脚本以标记文本回报结果。

use crate::exec::{ExecOutcome, TimeoutPolicy, Vbs};
use thiserror::Error;
use tracing::debug;

/// 读取/写入出错的标记
pub const REG_ERROR_ENTRY: &str = "REG_ERROR_ENTRY";
/// 写入后回读不一致的标记
pub const REG_ERROR_SET: &str = "REG_ERROR_SET";
/// 写入成功的标记
pub const REG_NO_ERROR: &str = "REG_NO_ERROR";

/// 系统环境变量所在子键
pub const ENV_KEY: &str = "SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment";
/// 应用 bin 目录环境变量
pub const APP_BINS_REG_ENTRY: &str = "BEARSAMPP_BINS";
/// 应用根目录环境变量
pub const APP_PATH_REG_ENTRY: &str = "BEARSAMPP_PATH";
/// 系统 Path 环境变量
pub const SYSPATH_REG_ENTRY: &str = "Path";

/// 注册表根键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKey {
    /// HKEY_CLASSES_ROOT
    Hkcr,
    /// HKEY_CURRENT_USER
    Hkcu,
    /// HKEY_LOCAL_MACHINE
    Hklm,
}

impl RegistryKey {
    /// `WScript.Shell` 使用的缩写
    pub fn abbreviation(&self) -> &'static str {
        match self {
            RegistryKey::Hkcr => "HKCR",
            RegistryKey::Hkcu => "HKCU",
            RegistryKey::Hklm => "HKLM",
        }
    }

    /// `StdRegProv` 使用的根键常量
    pub fn hive(&self) -> &'static str {
        match self {
            RegistryKey::Hkcr => "&H80000000",
            RegistryKey::Hkcu => "&H80000001",
            RegistryKey::Hklm => "&H80000002",
        }
    }
}

/// 注册表操作错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Error {0}")]
    Entry(String),

    #[error("注册表值写入后校验失败: {0}")]
    Set(String),

    #[error("注册表脚本没有返回结果")]
    NoResult,
}

/// 写入方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetMethod {
    String,
    ExpandString,
    Delete,
}

impl SetMethod {
    fn provider_method(&self) -> &'static str {
        match self {
            SetMethod::String => "SetStringValue",
            SetMethod::ExpandString => "SetExpandedStringValue",
            SetMethod::Delete => "DeleteValue",
        }
    }
}

/// 注册表访问
#[derive(Debug, Clone)]
pub struct Registry {
    vbs: Vbs,
}

impl Registry {
    /// 创建新的注册表访问对象
    pub fn new(vbs: Vbs) -> Self {
        Self { vbs }
    }

    /// 检查键或值是否存在
    pub async fn exists(&self, key: RegistryKey, subkey: &str, entry: Option<&str>) -> bool {
        let body = match entry {
            Some(entry) => [
                "Set objShell = WScript.CreateObject(\"WScript.Shell\")".to_string(),
                format!(
                    "entryValue = objShell.RegRead(\"{}\")",
                    vbs_escape(&full_path(key, subkey, entry))
                ),
                "If Err.Number <> 0 Then".to_string(),
                "    Err.Clear".to_string(),
                "    WScript.Echo \"0\"".to_string(),
                "Else".to_string(),
                "    WScript.Echo \"1\"".to_string(),
                "End If".to_string(),
            ]
            .join("\r\n"),
            None => [
                format!("Const HKEY = {}", key.hive()),
                "Set objRegistry = GetObject(\"winmgmts://./root/default:StdRegProv\")".to_string(),
                format!(
                    "If objRegistry.EnumValues(HKEY, \"{}\", arrNames, arrTypes) = 0 Then",
                    vbs_escape(subkey)
                ),
                "    WScript.Echo \"1\"".to_string(),
                "Else".to_string(),
                "    WScript.Echo \"0\"".to_string(),
                "End If".to_string(),
            ]
            .join("\r\n"),
        };

        let outcome = self.vbs.exec("registryExists", &body, TimeoutPolicy::Default).await;
        let exists = outcome.last_line() == Some("1");
        debug!(
            target: "registry",
            "Exists {} -> {}",
            full_path(key, subkey, entry.unwrap_or_default()),
            exists
        );
        exists
    }

    /// 读取值
    pub async fn get_value(&self, key: RegistryKey, subkey: &str, entry: &str) -> Result<String, RegistryError> {
        let body = [
            "Set objShell = WScript.CreateObject(\"WScript.Shell\")".to_string(),
            format!(
                "entryValue = objShell.RegRead(\"{}\")",
                vbs_escape(&full_path(key, subkey, entry))
            ),
            "If Err.Number <> 0 Then".to_string(),
            format!("    WScript.Echo \"{REG_ERROR_ENTRY}\" & Err.Number & \": \" & Err.Description"),
            "    Err.Clear".to_string(),
            "Else".to_string(),
            "    WScript.Echo entryValue".to_string(),
            "End If".to_string(),
        ]
        .join("\r\n");

        let outcome = self.vbs.exec("registryGetValue", &body, TimeoutPolicy::Default).await;
        let result = parse_value_result(&outcome);
        debug!(
            target: "registry",
            "GetValue {} -> {:?}",
            full_path(key, subkey, entry),
            result
        );
        result
    }

    /// 写入字符串值
    pub async fn set_string_value(
        &self,
        key: RegistryKey,
        subkey: &str,
        entry: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        self.set_value(key, subkey, entry, Some(value), SetMethod::String).await
    }

    /// 写入可展开字符串值
    pub async fn set_expand_string_value(
        &self,
        key: RegistryKey,
        subkey: &str,
        entry: &str,
        value: &str,
    ) -> Result<(), RegistryError> {
        self.set_value(key, subkey, entry, Some(value), SetMethod::ExpandString).await
    }

    /// 删除值
    pub async fn delete_value(&self, key: RegistryKey, subkey: &str, entry: &str) -> Result<(), RegistryError> {
        self.set_value(key, subkey, entry, None, SetMethod::Delete).await
    }

    async fn set_value(
        &self,
        key: RegistryKey,
        subkey: &str,
        entry: &str,
        value: Option<&str>,
        method: SetMethod,
    ) -> Result<(), RegistryError> {
        let body = build_set_script(key, subkey, entry, value, method);
        let outcome = self.vbs.exec("registrySetValue", &body, TimeoutPolicy::Default).await;
        let result = parse_set_result(&outcome);
        debug!(
            target: "registry",
            "SetValue {} ({}) -> {:?}",
            full_path(key, subkey, entry),
            value.unwrap_or_default(),
            result
        );
        result
    }
}

/// NSSM 服务参数所在子键
pub fn service_parameters_key(service_name: &str) -> String {
    format!("SYSTEM\\CurrentControlSet\\Services\\{service_name}\\Parameters")
}

fn full_path(key: RegistryKey, subkey: &str, entry: &str) -> String {
    format!("{}\\{}\\{}", key.abbreviation(), subkey, entry)
}

/// VBScript 字符串转义
fn vbs_escape(value: &str) -> String {
    value.replace('"', "\"\"")
}

fn build_set_script(
    key: RegistryKey,
    subkey: &str,
    entry: &str,
    value: Option<&str>,
    method: SetMethod,
) -> String {
    let mut lines = vec![
        format!("Const HKEY = {}", key.hive()),
        format!("newValue = \"{}\"", vbs_escape(value.unwrap_or_default())),
        "Set objShell = WScript.CreateObject(\"WScript.Shell\")".to_string(),
        "Set objRegistry = GetObject(\"winmgmts://./root/default:StdRegProv\")".to_string(),
    ];

    let call = match value {
        Some(_) => format!(
            "objRegistry.{} HKEY, \"{}\", \"{}\", newValue",
            method.provider_method(),
            vbs_escape(subkey),
            vbs_escape(entry)
        ),
        None => format!(
            "objRegistry.{} HKEY, \"{}\", \"{}\"",
            method.provider_method(),
            vbs_escape(subkey),
            vbs_escape(entry)
        ),
    };
    lines.push(call);
    lines.push("If Err.Number <> 0 Then".to_string());
    lines.push(format!(
        "    WScript.Echo \"{REG_ERROR_ENTRY}\" & Err.Number & \": \" & Err.Description"
    ));
    lines.push("    Err.Clear".to_string());
    lines.push("Else".to_string());
    if value.is_some() {
        lines.push(format!(
            "    entryValue = objShell.RegRead(\"{}\")",
            vbs_escape(&full_path(key, subkey, entry))
        ));
        lines.push("    If entryValue = newValue Then".to_string());
        lines.push(format!("        WScript.Echo \"{REG_NO_ERROR}\""));
        lines.push("    Else".to_string());
        lines.push(format!("        WScript.Echo \"{REG_ERROR_SET}\" & newValue"));
        lines.push("    End If".to_string());
    } else {
        lines.push(format!("    WScript.Echo \"{REG_NO_ERROR}\""));
    }
    lines.push("End If".to_string());
    lines.join("\r\n")
}

/// 解析读取结果
pub fn parse_value_result(outcome: &ExecOutcome) -> Result<String, RegistryError> {
    let line = outcome.lines().and_then(|lines| lines.first()).ok_or(RegistryError::NoResult)?;
    match line.strip_prefix(REG_ERROR_ENTRY) {
        Some(detail) => Err(RegistryError::Entry(detail.to_string())),
        None => Ok(line.clone()),
    }
}

/// 解析写入结果
pub fn parse_set_result(outcome: &ExecOutcome) -> Result<(), RegistryError> {
    let line = outcome.lines().and_then(|lines| lines.first()).ok_or(RegistryError::NoResult)?;
    if let Some(value) = line.strip_prefix(REG_ERROR_SET) {
        return Err(RegistryError::Set(value.to_string()));
    }
    if let Some(detail) = line.strip_prefix(REG_ERROR_ENTRY) {
        return Err(RegistryError::Entry(detail.to_string()));
    }
    if line == REG_NO_ERROR {
        Ok(())
    } else {
        Err(RegistryError::NoResult)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(values: &[&str]) -> ExecOutcome {
        ExecOutcome::Lines(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn test_hive_constants() {
        assert_eq!(RegistryKey::Hkcr.hive(), "&H80000000");
        assert_eq!(RegistryKey::Hkcu.hive(), "&H80000001");
        assert_eq!(RegistryKey::Hklm.hive(), "&H80000002");
        assert_eq!(RegistryKey::Hklm.abbreviation(), "HKLM");
    }

    #[test]
    fn test_parse_value_result() {
        assert_eq!(
            parse_value_result(&lines(&["C:\\Bearsampp\\bin\\mailpit\\mailpit.exe"])).unwrap(),
            "C:\\Bearsampp\\bin\\mailpit\\mailpit.exe"
        );
        assert_eq!(
            parse_value_result(&lines(&["REG_ERROR_ENTRY-2147024894: Invalid root"])),
            Err(RegistryError::Entry("-2147024894: Invalid root".to_string()))
        );
        assert_eq!(parse_value_result(&ExecOutcome::TimedOut), Err(RegistryError::NoResult));
    }

    #[test]
    fn test_parse_set_result() {
        assert!(parse_set_result(&lines(&["REG_NO_ERROR"])).is_ok());
        assert_eq!(
            parse_set_result(&lines(&["REG_ERROR_SETC:\\new"])),
            Err(RegistryError::Set("C:\\new".to_string()))
        );
        assert!(matches!(
            parse_set_result(&lines(&["REG_ERROR_ENTRY5: Access denied"])),
            Err(RegistryError::Entry(_))
        ));
    }

    #[test]
    fn test_set_script_escapes_quotes() {
        let script = build_set_script(
            RegistryKey::Hklm,
            &service_parameters_key("bearsamppmailpit"),
            "AppParameters",
            Some("--listen \"127.0.0.1:8025\""),
            SetMethod::String,
        );
        assert!(script.contains("Const HKEY = &H80000002"));
        assert!(script.contains("newValue = \"--listen \"\"127.0.0.1:8025\"\"\""));
        assert!(script.contains("objRegistry.SetStringValue HKEY"));
        assert!(script.contains("Services\\bearsamppmailpit\\Parameters"));
    }

    #[test]
    fn test_delete_script_has_no_readback() {
        let script = build_set_script(RegistryKey::Hkcu, "Environment", "BEARSAMPP_PATH", None, SetMethod::Delete);
        assert!(script.contains("objRegistry.DeleteValue HKEY, \"Environment\", \"BEARSAMPP_PATH\""));
        assert!(!script.contains("RegRead"));
    }
}
