//! 组件目录
//!
//! 显式列举所有服务型组件，按 id 或服务名查找。

use crate::config::AppContext;
use crate::module::bins::{
    self, Apache, DbFlavor, Filezilla, Mailpit, Memcached, Mysql, Postgresql, Xlight,
};
use crate::module::symlink::SymlinkOutcome;
use crate::module::unit::{BuildOptions, ServiceUnit};
use tracing::info;

/// 服务型组件目录
#[derive(Debug)]
pub struct UnitCatalog {
    apache: Apache,
    mysql: Mysql,
    mariadb: Mysql,
    postgresql: Postgresql,
    mailpit: Mailpit,
    memcached: Memcached,
    xlight: Xlight,
    filezilla: Filezilla,
    /// 构建时各组件 `current` 链接的校正结果
    links: Vec<(String, SymlinkOutcome)>,
}

impl UnitCatalog {
    /// 使用默认后端构建所有组件
    pub async fn new(ctx: &AppContext) -> Self {
        Self::build(ctx, BuildOptions::default()).await
    }

    /// 使用自定义选项构建所有组件
    ///
    /// 先重新加载每个组件并校正 `current` 链接，再由加载结果生成服务描述和钩子。
    pub async fn build(ctx: &AppContext, options: BuildOptions<'_>) -> Self {
        let mut modules = [
            bins::apache::module(ctx),
            bins::mysql::module(ctx, DbFlavor::Mysql),
            bins::mysql::module(ctx, DbFlavor::Mariadb),
            bins::postgresql::module(ctx),
            bins::mailpit::module(ctx),
            bins::memcached::module(ctx),
            bins::xlight::module(ctx),
            bins::filezilla::module(ctx),
        ];
        let mut links = Vec::with_capacity(modules.len());
        for module in modules.iter_mut() {
            let outcome = module.sync(ctx).await;
            links.push((module.id().to_string(), outcome));
        }

        let [apache, mysql, mariadb, postgresql, mailpit, memcached, xlight, filezilla] = modules;
        let catalog = Self {
            apache: bins::apache::build(ctx, apache, options),
            mysql: bins::mysql::build(ctx, DbFlavor::Mysql, mysql, options),
            mariadb: bins::mysql::build(ctx, DbFlavor::Mariadb, mariadb, options),
            postgresql: bins::postgresql::build(ctx, postgresql, options),
            mailpit: bins::mailpit::build(ctx, mailpit, options),
            memcached: bins::memcached::build(ctx, memcached, options),
            xlight: bins::xlight::build(ctx, xlight, options),
            filezilla: bins::filezilla::build(ctx, filezilla, options),
            links,
        };
        info!(
            target: "panel",
            "已加载 {} 个组件，其中 {} 个已启用",
            catalog.iter().count(),
            catalog.enabled().count()
        );
        catalog
    }

    pub fn apache(&self) -> &Apache {
        &self.apache
    }

    pub fn mysql(&self) -> &Mysql {
        &self.mysql
    }

    pub fn mariadb(&self) -> &Mysql {
        &self.mariadb
    }

    pub fn postgresql(&self) -> &Postgresql {
        &self.postgresql
    }

    pub fn mailpit(&self) -> &Mailpit {
        &self.mailpit
    }

    pub fn memcached(&self) -> &Memcached {
        &self.memcached
    }

    pub fn xlight(&self) -> &Xlight {
        &self.xlight
    }

    pub fn filezilla(&self) -> &Filezilla {
        &self.filezilla
    }

    /// 所有组件，按启动顺序排列
    pub fn units(&self) -> [&dyn ServiceUnit; 8] {
        [
            &self.apache,
            &self.mysql,
            &self.mariadb,
            &self.postgresql,
            &self.mailpit,
            &self.memcached,
            &self.xlight,
            &self.filezilla,
        ]
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ServiceUnit> {
        self.units().into_iter()
    }

    /// 已启用的组件
    pub fn enabled(&self) -> impl Iterator<Item = &dyn ServiceUnit> {
        self.iter().filter(|unit| unit.is_enabled())
    }

    /// 按组件 id 查找
    pub fn get(&self, id: &str) -> Option<&dyn ServiceUnit> {
        self.iter().find(|unit| unit.id().eq_ignore_ascii_case(id))
    }

    /// 按服务名查找
    pub fn by_service_name(&self, service_name: &str) -> Option<&dyn ServiceUnit> {
        self.iter()
            .find(|unit| unit.service_name().eq_ignore_ascii_case(service_name))
    }

    /// 按 id 或服务名查找
    pub fn lookup(&self, key: &str) -> Option<&dyn ServiceUnit> {
        self.get(key).or_else(|| self.by_service_name(key))
    }

    /// 构建时各组件 `current` 链接的校正结果
    pub fn link_outcomes(&self) -> &[(String, SymlinkOutcome)] {
        &self.links
    }

    /// 重新加载所有组件并校正 `current` 链接
    ///
    /// 组件按新的本地配置整体重建，服务描述、端口和钩子随之更新。
    pub async fn sync_all(&mut self, ctx: &AppContext, options: BuildOptions<'_>) -> &[(String, SymlinkOutcome)] {
        *self = Self::build(ctx, options).await;
        &self.links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BinSettings, BinsConfig, GlobalConfig, PanelConfig};
    use std::path::Path;

    fn context(root: &Path) -> AppContext {
        AppContext::from_config(PanelConfig {
            global: GlobalConfig::new(root),
            bins: BinsConfig {
                apache: BinSettings::enabled("2.4.62"),
                mysql: BinSettings::enabled("8.4.3"),
                ..Default::default()
            },
        })
    }

    #[tokio::test]
    async fn test_lookup() {
        let ctx = context(Path::new("/opt/bearsampp"));
        let catalog = UnitCatalog::new(&ctx).await;

        assert_eq!(catalog.iter().count(), 8);
        assert_eq!(catalog.get("mysql").map(|u| u.service_name()), Some("bearsamppmysql"));
        assert_eq!(catalog.get("MariaDB").map(|u| u.id()), Some("mariadb"));
        assert_eq!(catalog.by_service_name("bearsamppmailpit").map(|u| u.id()), Some("mailpit"));
        assert_eq!(catalog.lookup("bearsamppxlight").map(|u| u.id()), Some("xlight"));
        assert!(catalog.get("php").is_none());
    }

    #[tokio::test]
    async fn test_backends_are_fixed_per_unit() {
        let ctx = context(Path::new("/opt/bearsampp"));
        let catalog = UnitCatalog::new(&ctx).await;

        assert_eq!(catalog.apache().backend(), "win32");
        assert_eq!(catalog.mysql().backend(), "win32");
        assert_eq!(catalog.mailpit().backend(), "nssm");
        assert_eq!(catalog.memcached().backend(), "nssm");
        assert_eq!(catalog.xlight().backend(), "nssm");
    }

    #[tokio::test]
    async fn test_descriptors() {
        let ctx = context(Path::new("/opt/bearsampp"));
        let catalog = UnitCatalog::new(&ctx).await;

        let apache = catalog.apache().descriptor();
        assert_eq!(apache.name, "bearsamppapache");
        assert_eq!(apache.display_name, "Bearsampp Apache");
        assert_eq!(apache.arguments, "-k runservice");

        assert_eq!(catalog.mysql().descriptor().arguments, "bearsamppmysql");
        assert_eq!(catalog.memcached().descriptor().arguments, "-m 512 -p 11211 -U 0 -vv");
        assert!(catalog
            .mailpit()
            .descriptor()
            .stdout_path
            .as_ref()
            .is_some_and(|p| p.ends_with("mailpit.out.log")));
    }

    #[tokio::test]
    async fn test_enabled_requires_version_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("bin/apache/apache2.4.62")).unwrap();
        let ctx = context(dir.path());
        let catalog = UnitCatalog::new(&ctx).await;

        let enabled: Vec<&str> = catalog.enabled().map(|u| u.id()).collect();
        assert_eq!(enabled, vec!["apache"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_links_enabled_modules() {
        let dir = tempfile::TempDir::new().unwrap();
        let version_dir = dir.path().join("bin/apache/apache2.4.62");
        std::fs::create_dir_all(version_dir.join("bin")).unwrap();
        std::fs::write(version_dir.join("bin/httpd.exe"), "").unwrap();
        std::fs::write(
            version_dir.join("bearsampp.conf"),
            "apacheExe = \"bin/httpd.exe\"\napachePort = \"8080\"\n",
        )
        .unwrap();
        let ctx = context(dir.path());
        let catalog = UnitCatalog::new(&ctx).await;

        let apache = catalog.apache();
        assert!(apache.module().symlink_path().is_symlink());
        assert!(apache.descriptor().binary_path.is_file());
        assert_eq!(apache.port(), Some(8080));
        assert!(catalog
            .link_outcomes()
            .iter()
            .any(|(id, outcome)| id == "apache" && *outcome == SymlinkOutcome::Created));
        assert!(catalog
            .link_outcomes()
            .iter()
            .any(|(id, outcome)| id == "mysql" && *outcome == SymlinkOutcome::Unchanged));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_all_refreshes_units() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(dir.path());
        let mut catalog = UnitCatalog::new(&ctx).await;
        assert!(!catalog.apache().is_enabled());
        assert_eq!(catalog.apache().port(), None);

        let version_dir = dir.path().join("bin/apache/apache2.4.62");
        std::fs::create_dir_all(&version_dir).unwrap();
        std::fs::write(
            version_dir.join("bearsampp.conf"),
            "apacheExe = \"bin/httpd.exe\"\napachePort = \"8081\"\n",
        )
        .unwrap();

        let outcomes = catalog.sync_all(&ctx, BuildOptions::default()).await.to_vec();
        assert!(outcomes.contains(&("apache".to_string(), SymlinkOutcome::Created)));

        let apache = catalog.apache();
        assert!(apache.is_enabled());
        assert_eq!(apache.port(), Some(8081));
        assert_eq!(
            apache.descriptor().binary_path,
            dir.path().join("bin/apache/current/bin/httpd.exe")
        );
    }
}
