//! 配置数据结构定义
//!
//! 定义控制面板的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanelConfig {
    /// 全局配置项
    pub global: GlobalConfig,
    /// 各组件配置
    #[serde(default)]
    pub bins: BinsConfig,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 应用标题，用作服务显示名称前缀
    #[serde(default = "default_app_title")]
    pub app_title: String,
    /// 安装根目录
    pub root_path: PathBuf,
    /// 临时目录（默认 `<root>/tmp`）
    pub tmp_path: Option<PathBuf>,
    /// 日志目录（默认 `<root>/logs`）
    pub logs_path: Option<PathBuf>,
    /// nssm.exe 路径（默认 `<root>/core/libs/nssm/nssm.exe`）
    pub nssm_exe: Option<PathBuf>,
    /// 脚本默认超时（秒）
    #[serde(default = "default_scripts_timeout")]
    pub scripts_timeout_seconds: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl GlobalConfig {
    /// 使用默认值创建全局配置
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            app_title: default_app_title(),
            root_path: root_path.into(),
            tmp_path: None,
            logs_path: None,
            nssm_exe: None,
            scripts_timeout_seconds: default_scripts_timeout(),
            log_level: default_log_level(),
        }
    }
}

/// 单个组件配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BinSettings {
    /// 是否启用
    #[serde(default)]
    pub enable: bool,
    /// 当前版本
    pub version: Option<String>,
}

impl BinSettings {
    /// 创建启用的组件配置
    pub fn enabled(version: impl Into<String>) -> Self {
        Self {
            enable: true,
            version: Some(version.into()),
        }
    }
}

/// 可注册为服务的组件配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BinsConfig {
    #[serde(default)]
    pub apache: BinSettings,
    #[serde(default)]
    pub mysql: BinSettings,
    #[serde(default)]
    pub mariadb: BinSettings,
    #[serde(default)]
    pub postgresql: BinSettings,
    #[serde(default)]
    pub mailpit: BinSettings,
    #[serde(default)]
    pub memcached: BinSettings,
    #[serde(default)]
    pub xlight: BinSettings,
    #[serde(default)]
    pub filezilla: BinSettings,
}

impl BinsConfig {
    /// 按组件名列出配置
    pub fn entries(&self) -> [(&'static str, &BinSettings); 8] {
        [
            ("apache", &self.apache),
            ("mysql", &self.mysql),
            ("mariadb", &self.mariadb),
            ("postgresql", &self.postgresql),
            ("mailpit", &self.mailpit),
            ("memcached", &self.memcached),
            ("xlight", &self.xlight),
            ("filezilla", &self.filezilla),
        ]
    }
}

// 默认值函数
fn default_app_title() -> String {
    "Bearsampp".to_string()
}
fn default_scripts_timeout() -> u64 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &PanelConfig) -> Result<(), String> {
    if config.global.root_path.as_os_str().is_empty() {
        return Err("根目录不能为空".to_string());
    }

    if config.global.scripts_timeout_seconds == 0 {
        return Err("脚本超时时间不能为0".to_string());
    }

    if config.global.app_title.trim().is_empty() {
        return Err("应用标题不能为空".to_string());
    }

    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    for (name, settings) in config.bins.entries() {
        if !settings.enable {
            continue;
        }
        match settings.version.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(format!("组件 {} 已启用但未指定版本", name));
            }
            Some(version) if version.contains(['/', '\\']) => {
                return Err(format!("组件 {} 的版本号无效: {}", name, version));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> PanelConfig {
        PanelConfig {
            global: GlobalConfig {
                app_title: default_app_title(),
                root_path: PathBuf::from("C:/Bearsampp"),
                tmp_path: None,
                logs_path: None,
                nssm_exe: None,
                scripts_timeout_seconds: default_scripts_timeout(),
                log_level: default_log_level(),
            },
            bins: BinsConfig {
                apache: BinSettings::enabled("2.4.62"),
                mysql: BinSettings::enabled("8.4.3"),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_config_serialization() {
        let config = create_test_config();

        let serialized = toml::to_string(&config).expect("序列化失败");
        assert!(serialized.contains("[bins.apache]"));

        let deserialized: PanelConfig = toml::from_str(&serialized).expect("反序列化失败");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_validation() {
        assert!(validate_config(&create_test_config()).is_ok());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = create_test_config();
        config.global.scripts_timeout_seconds = 0;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("脚本超时时间不能为0"));
    }

    #[test]
    fn test_config_validation_empty_root() {
        let mut config = create_test_config();
        config.global.root_path = PathBuf::new();

        assert!(validate_config(&config).unwrap_err().contains("根目录"));
    }

    #[test]
    fn test_config_validation_enabled_bin_without_version() {
        let mut config = create_test_config();
        config.bins.memcached.enable = true;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("memcached"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = create_test_config();
        config.global.log_level = "verbose".to_string();

        assert!(validate_config(&config).unwrap_err().contains("日志级别"));
    }

    #[test]
    fn test_default_values() {
        let config: PanelConfig = toml::from_str("[global]\nroot_path = \"C:/Bearsampp\"\n").unwrap();

        assert_eq!(config.global.app_title, "Bearsampp");
        assert_eq!(config.global.scripts_timeout_seconds, 120);
        assert_eq!(config.global.log_level, "info");
        assert!(!config.bins.apache.enable);
        assert_eq!(config.bins.entries().len(), 8);
    }
}
