//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, PanelConfig};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<PanelConfig>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<PanelConfig>;

    /// 验证配置
    fn validate(&self, config: &PanelConfig) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用 `${VAR}` 环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的环境变量
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut result = content.to_string();

        for captures in env_var_regex.captures_iter(content) {
            let full_match = &captures[0];
            let var_name = &captures[1];

            match std::env::var(var_name) {
                Ok(value) => {
                    // Windows 路径中的反斜杠在 TOML 基本字符串里需要转义
                    result = result.replace(full_match, &value.replace('\\', "/"));
                }
                Err(_) => {
                    return Err(ConfigError::EnvVarError {
                        var: var_name.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(result)
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<PanelConfig> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: PanelConfig = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<PanelConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<PanelConfig> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &PanelConfig) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `bearsampp-panel.toml` 时优先使用，否则使用用户配置目录。
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from("bearsampp-panel.toml");
    if local.exists() {
        return local;
    }
    dirs::config_dir()
        .map(|config_dir| config_dir.join("bearsampp-panel").join("config.toml"))
        .unwrap_or(local)
}

/// 生成默认配置文件内容
pub fn default_config_template(root_path: &Path) -> String {
    format!(
        r#"# Bearsampp 控制面板配置

[global]
app_title = "Bearsampp"
root_path = "{root}"
# tmp_path = "{root}/tmp"
# logs_path = "{root}/logs"
# nssm_exe = "{root}/core/libs/nssm/nssm.exe"
scripts_timeout_seconds = 120
log_level = "info"

[bins.apache]
enable = true
version = "2.4.62"

[bins.mysql]
enable = true
version = "8.4.3"

[bins.mariadb]
enable = false

[bins.postgresql]
enable = false

[bins.mailpit]
enable = false

[bins.memcached]
enable = false

[bins.xlight]
enable = false

[bins.filezilla]
enable = false
"#,
        root = root_path.display().to_string().replace('\\', "/")
    )
}
