//! 启动失败诊断测试
//!
//! 服务启动后未进入运行状态时，运行组件自带的语法检查并写入组件错误日志

#![cfg(unix)]

mod common;

use bearsampp_panel::error::ServiceError;
use bearsampp_panel::module::ServiceUnit;
use bearsampp_panel::orchestrator;
use common::{apache_and_mysql, context, create_version_dir, mock_catalog, MockScm};
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

const FAKE_MYSQLD: &str = "#!/bin/sh\n\
echo \"mysqld: [Warning] option 'verbose' is deprecated\" 1>&2\n\
echo \"mysqld: [ERROR] unknown variable 'foo=bar'.\" 1>&2\n\
exit 1\n";

#[tokio::test]
async fn test_malformed_mysql_config_is_logged() {
    let dir = TempDir::new().unwrap();
    let version_dir = create_version_dir(dir.path(), "mysql", "8.4.3");
    std::fs::write(
        version_dir.join("bearsampp.conf"),
        "mysqlExe = \"bin/mysqld\"\nmysqlPort = \"3306\"\n",
    )
    .unwrap();
    std::fs::create_dir_all(version_dir.join("data")).unwrap();
    std::fs::create_dir_all(version_dir.join("bin")).unwrap();
    let exe = version_dir.join("bin").join("mysqld");
    std::fs::write(&exe, FAKE_MYSQLD).unwrap();
    std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::os::unix::fs::symlink(&version_dir, dir.path().join("bin/mysql/current")).unwrap();

    let ctx = context(dir.path(), apache_and_mysql());
    let scm = MockScm::new();
    scm.crash_on_start("bearsamppmysql");
    let catalog = mock_catalog(&ctx, &scm).await;
    let mysql = catalog.mysql();
    assert!(mysql.is_enabled());
    assert_eq!(mysql.port(), Some(3306));

    assert!(mysql.controller().create().await);
    let err = orchestrator::start_service(mysql).await.unwrap_err();

    let ServiceError::Operation { detail, .. } = err else {
        panic!("unexpected error: {err}");
    };
    assert!(detail.contains("配置错误"), "unexpected detail: {detail}");
    assert!(detail.contains("unknown variable 'foo=bar'"));

    let diagnosis = mysql.controller().latest_diagnosis().unwrap();
    assert!(!diagnosis.syntax_ok);

    let log = std::fs::read_to_string(dir.path().join("logs").join("mysql.log")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("] [error] mysqld: [Warning] option 'verbose' is deprecated"));
    assert!(lines[1].ends_with("mysqld: [ERROR] unknown variable 'foo=bar'."));
}
