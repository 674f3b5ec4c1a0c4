//! 组件本地配置 `bearsampp.conf`
//!
//! 每行一个 `key = "value"`，`;` 或 `#` 开头的行为注释。

use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 本地配置文件名
pub const LOCAL_CONF_FILE: &str = "bearsampp.conf";

/// 组件本地配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConf {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl LocalConf {
    /// 读取配置文件
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        Ok(Self {
            values: parse_local_conf(&content),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取配置值
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// 读取端口配置，非法值返回 `None`
    pub fn port(&self, key: &str) -> Option<u16> {
        self.get(key)?.trim().parse().ok().filter(|port| *port > 0)
    }

    /// 替换单个配置值并写回文件
    pub fn replace(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.replace_all(&[(key, value)])
    }

    /// 替换多个配置值并写回文件，文件中不存在的键不会被添加
    pub fn replace_all(&mut self, params: &[(&str, &str)]) -> std::io::Result<()> {
        let mut content = std::fs::read_to_string(&self.path)?;
        for (key, value) in params {
            content = replace_conf_value(&content, key, value);
            self.values.insert(key.to_string(), value.to_string());
        }
        std::fs::write(&self.path, content)
    }

    /// 所有配置项
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// 解析 `key = "value"` 格式的内容
pub fn parse_local_conf(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';') && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// 替换内容中 `key = ...` 行的值
pub fn replace_conf_value(content: &str, key: &str, value: &str) -> String {
    let pattern = format!(r"(?m)^{}\s*=.*$", regex::escape(key));
    match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(content, regex::NoExpand(&format!("{key} = \"{value}\"")))
            .into_owned(),
        Err(_) => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "mysqlVersion = \"8.4.3\"\nmysqlExe = \"bin/mysqld.exe\"\n; comment\nmysqlPort = \"3306\"\nmysqlRootUser = root\n";

    #[test]
    fn test_parse_local_conf() {
        let values = parse_local_conf(SAMPLE);
        assert_eq!(values.get("mysqlExe").map(String::as_str), Some("bin/mysqld.exe"));
        assert_eq!(values.get("mysqlRootUser").map(String::as_str), Some("root"));
        assert_eq!(values.len(), 4);
    }

    #[test]
    fn test_replace_conf_value() {
        let replaced = replace_conf_value(SAMPLE, "mysqlPort", "3307");
        assert!(replaced.contains("mysqlPort = \"3307\""));
        assert!(!replaced.contains("3306"));
        assert!(replaced.contains("mysqlExe = \"bin/mysqld.exe\""));

        let untouched = replace_conf_value(SAMPLE, "missingKey", "x");
        assert_eq!(untouched, SAMPLE);
    }

    #[test]
    fn test_replace_value_with_dollar_sign() {
        let replaced = replace_conf_value("mysqlRootPwd = \"\"\n", "mysqlRootPwd", "p$1");
        assert_eq!(replaced, "mysqlRootPwd = \"p$1\"\n");
    }

    #[test]
    fn test_load_and_replace_all() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join(LOCAL_CONF_FILE);
        std::fs::write(&path, SAMPLE).unwrap();

        let mut conf = LocalConf::load(&path).unwrap();
        assert_eq!(conf.port("mysqlPort"), Some(3306));

        conf.replace_all(&[("mysqlPort", "3310"), ("mysqlRootUser", "admin")]).unwrap();
        assert_eq!(conf.port("mysqlPort"), Some(3310));

        let reloaded = LocalConf::load(&path).unwrap();
        assert_eq!(reloaded.get("mysqlRootUser"), Some("admin"));
        assert_eq!(reloaded.port("mysqlPort"), Some(3310));
    }

    #[test]
    fn test_invalid_port() {
        let conf = LocalConf {
            path: PathBuf::from("bearsampp.conf"),
            values: parse_local_conf("apachePort = \"eighty\"\nzeroPort = \"0\""),
        };
        assert_eq!(conf.port("apachePort"), None);
        assert_eq!(conf.port("zeroPort"), None);
        assert_eq!(conf.port("missing"), None);
    }
}
