//! 版本化组件
//!
//! 每个组件位于 `<root>/<kind>/<id>/<id><version>`，`current` 链接指向启用的版本。

use crate::config::{AppContext, BinSettings};
use crate::module::conf::{LocalConf, LOCAL_CONF_FILE};
use crate::module::symlink::{reconcile_symlink, SymlinkOutcome};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 组件类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Bin,
    Tool,
    App,
}

impl ModuleKind {
    /// 组件类别对应的根目录名
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModuleKind::Bin => "bin",
            ModuleKind::Tool => "tools",
            ModuleKind::App => "apps",
        }
    }
}

/// 链接文件名
pub const CURRENT_LINK: &str = "current";

/// 版本化组件
#[derive(Debug, Clone)]
pub struct Module {
    kind: ModuleKind,
    id: String,
    name: String,
    version: Option<String>,
    configured: bool,
    root_path: PathBuf,
    current_path: PathBuf,
    symlink_path: PathBuf,
    enabled: bool,
    local_conf: Option<LocalConf>,
}

impl Module {
    /// 根据配置创建组件并计算路径，不访问文件系统
    pub fn new(kind: ModuleKind, id: &str, name: &str, settings: &BinSettings, ctx: &AppContext) -> Self {
        let root_path = ctx.root_path().join(kind.dir_name()).join(id);
        let version = settings.version.clone();
        let mut module = Self {
            kind,
            id: id.to_string(),
            name: name.to_string(),
            version,
            configured: settings.enable,
            symlink_path: root_path.join(CURRENT_LINK),
            current_path: PathBuf::new(),
            root_path,
            enabled: false,
            local_conf: None,
        };
        module.current_path = module.version_path();
        module
    }

    fn version_path(&self) -> PathBuf {
        let version = self.version.as_deref().unwrap_or_default();
        self.root_path.join(format!("{}{}", self.id, version))
    }

    /// 重新计算启用状态并读取本地配置
    pub fn reload(&mut self) {
        self.current_path = self.version_path();
        self.enabled = self.configured && self.version.is_some() && self.current_path.is_dir();
        if self.configured && !self.enabled {
            warn!(
                target: "panel",
                "{} 已启用但版本目录不存在: {}",
                self.name,
                self.current_path.display()
            );
        }

        let conf_path = self.current_path.join(LOCAL_CONF_FILE);
        self.local_conf = match LocalConf::load(&conf_path) {
            Ok(conf) => Some(conf),
            Err(e) => {
                if self.enabled {
                    warn!(target: "panel", "读取 {} 失败: {}", conf_path.display(), e);
                }
                None
            }
        };
        debug!(target: "panel", "{} 重载完成 (enabled: {})", self.id, self.enabled);
    }

    /// 重新加载并校正 `current` 链接
    pub async fn sync(&mut self, ctx: &AppContext) -> SymlinkOutcome {
        self.reload();
        if !self.enabled {
            return SymlinkOutcome::Unchanged;
        }
        let outcome = reconcile_symlink(&self.current_path, &self.symlink_path, &ctx.batch()).await;
        if outcome == SymlinkOutcome::Created {
            info!(
                target: "panel",
                "{} 链接已指向 {}",
                self.symlink_path.display(),
                self.current_path.display()
            );
        }
        outcome
    }

    /// 切换版本，下次重载时生效
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = Some(version.into());
        self.current_path = self.version_path();
    }

    /// 根目录下已安装的版本（按版本号升序）
    pub fn versions(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root_path) else {
            return Vec::new();
        };
        let mut versions: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir() || entry.path().is_symlink())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name != CURRENT_LINK)
            .filter_map(|name| name.strip_prefix(&self.id).map(str::to_string))
            .filter(|version| !version.is_empty())
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// 读取本地配置值
    pub fn conf_value(&self, key: &str) -> Option<&str> {
        self.local_conf.as_ref()?.get(key)
    }

    /// 读取本地配置中的端口
    pub fn conf_port(&self, key: &str) -> Option<u16> {
        self.local_conf.as_ref()?.port(key)
    }

    /// 本地配置中相对 `current` 链接的路径
    pub fn conf_path(&self, key: &str) -> Option<PathBuf> {
        self.conf_value(key).map(|value| self.symlink_path.join(value))
    }

    /// 替换本地配置值
    pub fn replace(&mut self, key: &str, value: &str) -> std::io::Result<()> {
        self.replace_all(&[(key, value)])
    }

    /// 替换多个本地配置值
    pub fn replace_all(&mut self, params: &[(&str, &str)]) -> std::io::Result<()> {
        match self.local_conf.as_mut() {
            Some(conf) => conf.replace_all(params),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} 没有 {}", self.id, LOCAL_CONF_FILE),
            )),
        }
    }

    pub fn kind(&self) -> ModuleKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    pub fn symlink_path(&self) -> &Path {
        &self.symlink_path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn local_conf(&self) -> Option<&LocalConf> {
        self.local_conf.as_ref()
    }
}

/// 按数字段比较版本号，非数字段按字符串比较
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-', '_']);
    let mut right = b.split(['.', '-', '_']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// `version` 是否不低于 `minimum`
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    compare_versions(version, minimum) != Ordering::Less
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, PanelConfig};
    use tempfile::TempDir;

    fn context(root: &Path) -> AppContext {
        AppContext::from_config(PanelConfig {
            global: GlobalConfig::new(root),
            bins: Default::default(),
        })
    }

    #[test]
    fn test_paths() {
        let ctx = context(Path::new("/opt/bearsampp"));
        let module = Module::new(ModuleKind::Bin, "apache", "Apache", &BinSettings::enabled("2.4.62"), &ctx);

        assert_eq!(module.root_path(), Path::new("/opt/bearsampp/bin/apache"));
        assert_eq!(module.current_path(), Path::new("/opt/bearsampp/bin/apache/apache2.4.62"));
        assert_eq!(module.symlink_path(), Path::new("/opt/bearsampp/bin/apache/current"));
        assert!(!module.is_enabled());
    }

    #[test]
    fn test_reload_and_versions() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        let root = dir.path().join("bin").join("mysql");
        std::fs::create_dir_all(root.join("mysql8.4.3")).unwrap();
        std::fs::create_dir_all(root.join("mysql5.7.44")).unwrap();
        std::fs::create_dir_all(root.join("mysql10.0.1")).unwrap();
        std::fs::write(root.join("mysql8.4.3").join(LOCAL_CONF_FILE), "mysqlPort = \"3306\"\n").unwrap();

        let mut module = Module::new(ModuleKind::Bin, "mysql", "MySQL", &BinSettings::enabled("8.4.3"), &ctx);
        module.reload();

        assert!(module.is_enabled());
        assert_eq!(module.conf_port("mysqlPort"), Some(3306));
        assert_eq!(module.versions(), vec!["5.7.44", "8.4.3", "10.0.1"]);
    }

    #[test]
    fn test_disabled_when_not_configured() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        std::fs::create_dir_all(dir.path().join("bin/mailpit/mailpit1.21.8")).unwrap();

        let settings = BinSettings {
            enable: false,
            version: Some("1.21.8".to_string()),
        };
        let mut module = Module::new(ModuleKind::Bin, "mailpit", "Mailpit", &settings, &ctx);
        module.reload();
        assert!(!module.is_enabled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_creates_current_link() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path());
        std::fs::create_dir_all(dir.path().join("bin/memcached/memcached1.6.31")).unwrap();

        let mut module = Module::new(
            ModuleKind::Bin,
            "memcached",
            "Memcached",
            &BinSettings::enabled("1.6.31"),
            &ctx,
        );
        assert_eq!(module.sync(&ctx).await, SymlinkOutcome::Created);
        assert_eq!(module.sync(&ctx).await, SymlinkOutcome::Unchanged);
        assert!(module.symlink_path().is_symlink());
    }

    #[test]
    fn test_replace_without_conf() {
        let ctx = context(Path::new("/nonexistent"));
        let mut module = Module::new(ModuleKind::Bin, "apache", "Apache", &BinSettings::enabled("2.4.62"), &ctx);
        module.reload();
        assert!(module.replace("apachePort", "8080").is_err());
    }

    #[test]
    fn test_compare_versions() {
        assert!(version_at_least("8.4.3", "5.7.0"));
        assert!(version_at_least("5.7.0", "5.7.0"));
        assert!(!version_at_least("5.6.51", "5.7.0"));
        assert!(version_at_least("10.11", "5.7.0"));
        assert_eq!(compare_versions("2.4.62", "2.4.9"), Ordering::Greater);
    }
}
