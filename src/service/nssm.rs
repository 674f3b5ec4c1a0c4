//! NSSM 服务后端
//!
//! 为没有原生服务支持的程序通过 `nssm.exe` 注册服务。
//! nssm 的输出可能是 UTF-16 编码，解析前会去掉控制字符。

use crate::exec::{ExecOutcome, ScriptRunner, ServiceInfos, TimeoutPolicy, Vbs};
use crate::registry::{service_parameters_key, Registry, RegistryKey};
use crate::service::backend::{ControlError, ControlResult, ServiceBackend, WrapperConfig};
use crate::service::descriptor::ServiceDescriptor;
use crate::service::status::ServiceStatus;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// nssm.exe 调用超时（秒）
pub const NSSM_EXEC_TIMEOUT: u64 = 10;

/// NSSM 后端
#[derive(Debug, Clone)]
pub struct Nssm {
    runner: ScriptRunner,
    config: WrapperConfig,
    vbs: Vbs,
    registry: Registry,
}

impl Nssm {
    /// 创建新的 NSSM 后端
    pub fn new(runner: ScriptRunner, config: WrapperConfig) -> Self {
        let vbs = Vbs::new(runner.clone());
        Self {
            registry: Registry::new(vbs.clone()),
            vbs,
            runner,
            config,
        }
    }

    /// 执行一次 nssm 命令，返回整理后的输出行
    async fn exec(&self, args: &[&str]) -> ControlResult<Vec<String>> {
        let outcome = self
            .runner
            .run_program(
                "nssm",
                &self.config.nssm_exe,
                args,
                TimeoutPolicy::Seconds(NSSM_EXEC_TIMEOUT),
            )
            .await;

        match outcome {
            ExecOutcome::Lines(lines) => {
                let lines = clean_nssm_output(&lines);
                debug!(target: "nssm", "nssm {} -> {}", args.join(" "), lines.join(" | "));
                Ok(lines)
            }
            ExecOutcome::OutputDisabled | ExecOutcome::Detached => Ok(Vec::new()),
            other => {
                error!(target: "nssm", "nssm {} 执行失败: {:?}", args.join(" "), other);
                Err(ControlError::Message(format!("nssm 执行失败: {other:?}")))
            }
        }
    }

    /// 执行 nssm 命令，多行输出视为错误文本
    async fn exec_checked(&self, args: &[&str]) -> ControlResult<()> {
        let lines = self.exec(args).await?;
        match output_error(&lines) {
            Some(message) => {
                warn!(target: "nssm", "nssm {}: {}", args.join(" "), message);
                Err(ControlError::Message(message))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ServiceBackend for Nssm {
    fn label(&self) -> &'static str {
        "nssm"
    }

    fn pending_timeout(&self) -> Duration {
        self.config.pending_timeout
    }

    async fn query(&self, name: &str) -> ControlResult<ServiceStatus> {
        let lines = self.exec(&["status", name]).await?;
        Ok(parse_status(&lines))
    }

    async fn install(&self, descriptor: &ServiceDescriptor) -> ControlResult<()> {
        let name = descriptor.name.as_str();
        let binary = descriptor.binary_path.to_string_lossy();
        info!(target: "nssm", "注册服务 {}: {}", name, descriptor.command_line());

        let mut errors = Vec::new();
        let mut record = |result: ControlResult<()>| {
            if let Err(e) = result {
                errors.push(e.to_string());
            }
        };

        // install 失败时后续设置没有意义
        self.exec_checked(&["install", name, &binary]).await?;

        record(self.exec_checked(&["set", name, "AppParameters", &descriptor.arguments]).await);
        record(self.exec_checked(&["set", name, "DisplayName", &descriptor.display_name]).await);
        record(self.exec_checked(&["set", name, "Description", &descriptor.display_name]).await);
        record(self.exec_checked(&["set", name, "AppNoConsole", "1"]).await);
        record(
            self.exec_checked(&["set", name, "Start", descriptor.start_type.nssm_value()])
                .await,
        );
        if let Some(stdout) = &descriptor.stdout_path {
            let stdout = stdout.to_string_lossy();
            record(self.exec_checked(&["set", name, "AppStdout", &stdout]).await);
        }
        if let Some(stderr) = &descriptor.stderr_path {
            let stderr = stderr.to_string_lossy();
            record(self.exec_checked(&["set", name, "AppStderr", &stderr]).await);
        }
        if let Some(environment) = descriptor
            .extra_environment
            .as_deref()
            .or(self.config.environment.as_deref())
        {
            record(
                self.exec_checked(&["set", name, "AppEnvironmentExtra", environment])
                    .await,
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ControlError::Message(errors.join(" ; ")))
        }
    }

    async fn start(&self, name: &str) -> ControlResult<()> {
        self.exec_checked(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> ControlResult<()> {
        self.exec_checked(&["stop", name]).await
    }

    async fn remove(&self, name: &str) -> ControlResult<()> {
        self.exec_checked(&["remove", name, "confirm"]).await
    }

    async fn infos(&self, name: &str) -> Option<ServiceInfos> {
        let mut infos = self.vbs.get_service_infos(name).await?;
        let subkey = service_parameters_key(name);

        let application = self
            .registry
            .get_value(RegistryKey::Hklm, &subkey, "Application")
            .await;
        let parameters = self
            .registry
            .get_value(RegistryKey::Hklm, &subkey, "AppParameters")
            .await;
        match (application, parameters) {
            (Ok(application), Ok(parameters)) => {
                infos.path_name = format!("{} {}", application, parameters).trim().to_string();
            }
            (Ok(application), Err(_)) => infos.path_name = application,
            (Err(e), _) => {
                warn!(target: "nssm", "读取服务参数失败 {}: {}", name, e);
            }
        }
        Some(infos)
    }
}

/// 去掉控制字符（含 UTF-16 输出中的 NUL）并丢弃空行
pub fn clean_nssm_output(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|line| {
            line.chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// 多行输出表示出错，返回合并后的错误文本
pub fn output_error(lines: &[String]) -> Option<String> {
    if lines.len() > 1 {
        Some(lines.join(" ; "))
    } else {
        None
    }
}

/// 解析 `nssm status` 输出，多行输出表示服务不存在
pub fn parse_status(lines: &[String]) -> ServiceStatus {
    match lines {
        [] => ServiceStatus::Unknown,
        [single] => ServiceStatus::from_nssm(single),
        _ => ServiceStatus::NotInstalled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_clean_nssm_output_strips_nul() {
        let raw = vec!["S\0E\0R\0V\0I\0C\0E\0_\0R\0U\0N\0N\0I\0N\0G\0".to_string(), "\0".to_string()];
        assert_eq!(clean_nssm_output(&raw), owned(&["SERVICE_RUNNING"]));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(&owned(&["SERVICE_STOPPED"])), ServiceStatus::Stopped);
        assert_eq!(
            parse_status(&owned(&[
                "Can't open service!",
                "OpenService(): The specified service does not exist as an installed service."
            ])),
            ServiceStatus::NotInstalled
        );
        assert_eq!(parse_status(&[]), ServiceStatus::Unknown);
    }

    #[test]
    fn test_output_error_joins_lines() {
        assert_eq!(output_error(&owned(&["Service \"x\" installed successfully!"])), None);
        assert_eq!(
            output_error(&owned(&["Can't open service!", "Access is denied."])),
            Some("Can't open service! ; Access is denied.".to_string())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_failure_is_reported() {
        let runner = ScriptRunner::new(std::env::temp_dir(), Duration::from_secs(5));
        let nssm = Nssm::new(runner, WrapperConfig::new("/nonexistent/nssm.exe"));
        let result = nssm.query("bearsamppmailpit").await;
        assert!(matches!(result, Err(ControlError::Message(_))));
    }
}
