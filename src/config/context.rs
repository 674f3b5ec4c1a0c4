//! 应用上下文
//!
//! 启动时由配置构造一次，之后以引用传给每个组件。
//! 持有解析后的路径、脚本执行器和根取消令牌。

use crate::config::types::PanelConfig;
use crate::exec::{Batch, ScriptRunner, Vbs};
use crate::registry::Registry;
use crate::service::WrapperConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// NSSM 附加路径列表文件名
pub const NSSM_ENV_PATHS_FILE: &str = "nssmEnvPaths.dat";

/// 追加在 NSSM 服务 PATH 末尾的系统目录
const SYSTEM_PATHS: &str =
    "%SystemRoot%/system32;%SystemRoot%;%SystemRoot%/system32/Wbem;%SystemRoot%/system32/WindowsPowerShell/v1.0";

/// 应用上下文
#[derive(Debug, Clone)]
pub struct AppContext {
    app_title: String,
    root_path: PathBuf,
    bin_path: PathBuf,
    logs_path: PathBuf,
    tmp_path: PathBuf,
    nssm_exe: PathBuf,
    runner: ScriptRunner,
    cancel: CancellationToken,
    config: PanelConfig,
}

impl AppContext {
    /// 由配置创建应用上下文
    pub fn from_config(config: PanelConfig) -> Self {
        let global = &config.global;
        let root_path = global.root_path.clone();
        let tmp_path = global
            .tmp_path
            .clone()
            .unwrap_or_else(|| root_path.join("tmp"));
        let logs_path = global
            .logs_path
            .clone()
            .unwrap_or_else(|| root_path.join("logs"));
        let nssm_exe = global
            .nssm_exe
            .clone()
            .unwrap_or_else(|| root_path.join("core").join("libs").join("nssm").join("nssm.exe"));

        let cancel = CancellationToken::new();
        let runner = ScriptRunner::new(
            tmp_path.clone(),
            Duration::from_secs(global.scripts_timeout_seconds),
        )
        .with_cancellation(cancel.clone());

        Self {
            app_title: global.app_title.clone(),
            bin_path: root_path.join("bin"),
            root_path,
            logs_path,
            tmp_path,
            nssm_exe,
            runner,
            cancel,
            config,
        }
    }

    pub fn app_title(&self) -> &str {
        &self.app_title
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn bin_path(&self) -> &Path {
        &self.bin_path
    }

    pub fn logs_path(&self) -> &Path {
        &self.logs_path
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    pub fn nssm_exe(&self) -> &Path {
        &self.nssm_exe
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// 脚本执行器
    pub fn runner(&self) -> &ScriptRunner {
        &self.runner
    }

    /// 根取消令牌，取消后所有执行中的脚本和轮询都会结束
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn batch(&self) -> Batch {
        Batch::new(self.runner.clone())
    }

    pub fn vbs(&self) -> Vbs {
        Vbs::new(self.runner.clone())
    }

    pub fn registry(&self) -> Registry {
        Registry::new(self.vbs())
    }

    /// 组件根目录 `<root>/bin/<name>`
    pub fn bin_dir(&self, name: &str) -> PathBuf {
        self.bin_path.join(name)
    }

    /// 服务显示名称
    pub fn display_name(&self, name: &str) -> String {
        format!("{} {}", self.app_title, name)
    }

    /// NSSM 包装器配置，附带服务进程使用的 PATH
    pub fn wrapper_config(&self) -> WrapperConfig {
        WrapperConfig::new(&self.nssm_exe).with_environment(self.nssm_environment())
    }

    /// NSSM 服务的附加环境变量 `PATH=...`
    pub fn nssm_environment(&self) -> String {
        let mut path = String::new();
        for dir in self.app_bins_paths() {
            path.push_str(&format_unix_path(&dir));
            path.push(';');
        }
        for dir in self.nssm_env_paths() {
            path.push_str(&format_unix_path(&dir));
            path.push(';');
        }
        path.push_str(SYSTEM_PATHS);
        format!("PATH={path}")
    }

    /// 已启用组件的 `current` 目录
    pub fn app_bins_paths(&self) -> Vec<PathBuf> {
        self.config
            .bins
            .entries()
            .into_iter()
            .filter(|(_, settings)| settings.enable)
            .map(|(name, _)| self.bin_dir(name).join("current"))
            .collect()
    }

    /// 读取 `nssmEnvPaths.dat` 中存在的附加目录
    pub fn nssm_env_paths(&self) -> Vec<PathBuf> {
        let file = self.root_path.join(NSSM_ENV_PATHS_FILE);
        let Ok(content) = std::fs::read_to_string(&file) else {
            return Vec::new();
        };
        parse_nssm_env_paths(&content, &self.root_path)
            .into_iter()
            .filter(|path| {
                let exists = path.is_dir();
                if !exists {
                    warn!(target: "panel", "{} 中的路径不存在: {}", NSSM_ENV_PATHS_FILE, path.display());
                }
                exists
            })
            .collect()
    }
}

/// 解析附加路径列表，不含盘符的行视为相对根目录
pub fn parse_nssm_env_paths(content: &str, root: &Path) -> Vec<PathBuf> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.contains(':') {
                PathBuf::from(line)
            } else {
                root.join(line)
            }
        })
        .collect()
}

/// 统一使用正斜杠
pub fn format_unix_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{BinSettings, BinsConfig, GlobalConfig};

    fn create_test_config(root: &Path) -> PanelConfig {
        PanelConfig {
            global: GlobalConfig {
                app_title: "Bearsampp".to_string(),
                root_path: root.to_path_buf(),
                tmp_path: None,
                logs_path: None,
                nssm_exe: None,
                scripts_timeout_seconds: 30,
                log_level: "info".to_string(),
            },
            bins: BinsConfig {
                mailpit: BinSettings::enabled("1.21.8"),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_resolved_paths() {
        let ctx = AppContext::from_config(create_test_config(Path::new("/opt/bearsampp")));

        assert_eq!(ctx.bin_path(), Path::new("/opt/bearsampp/bin"));
        assert_eq!(ctx.tmp_path(), Path::new("/opt/bearsampp/tmp"));
        assert_eq!(ctx.logs_path(), Path::new("/opt/bearsampp/logs"));
        assert!(ctx.nssm_exe().ends_with("core/libs/nssm/nssm.exe"));
        assert_eq!(ctx.runner().default_timeout(), Duration::from_secs(30));
        assert_eq!(ctx.display_name("mailpit"), "Bearsampp mailpit");
    }

    #[test]
    fn test_root_token_reaches_runner() {
        let ctx = AppContext::from_config(create_test_config(Path::new("/opt/bearsampp")));
        ctx.cancellation().cancel();
        assert!(ctx.runner().cancellation().is_cancelled());
    }

    #[test]
    fn test_nssm_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("tools/git/current/bin")).unwrap();
        std::fs::write(
            dir.path().join(NSSM_ENV_PATHS_FILE),
            "tools/git/current/bin\n\ntools/missing\n",
        )
        .unwrap();

        let ctx = AppContext::from_config(create_test_config(dir.path()));
        let environment = ctx.nssm_environment();

        assert!(environment.starts_with("PATH="));
        assert!(environment.contains("bin/mailpit/current;"));
        assert!(environment.contains("tools/git/current/bin;"));
        assert!(!environment.contains("tools/missing"));
        assert!(environment.ends_with("%SystemRoot%/system32/WindowsPowerShell/v1.0"));
        assert_eq!(ctx.wrapper_config().environment, Some(environment));
    }

    #[test]
    fn test_parse_nssm_env_paths() {
        let paths = parse_nssm_env_paths("C:/tools/bin\r\nrelative/dir\r\n", Path::new("/root"));
        assert_eq!(paths, vec![PathBuf::from("C:/tools/bin"), PathBuf::from("/root/relative/dir")]);
    }
}
