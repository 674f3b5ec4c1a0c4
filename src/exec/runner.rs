//! 脚本执行器
//!
//! 把脚本写入受管的临时文件，直接启动解释器进程并收集标准输出/错误，
//! 等待过程同时受超时和取消令牌约束，超时或取消时终止子进程。
//! 临时脚本文件在所有退出路径上都会被删除。

use crate::exec::request::{
    clean_output_lines, truncate_for_log, ExecOutcome, ExecutionRequest, ScriptKind,
    TimeoutPolicy, LOG_CONTENT_LIMIT,
};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// 隐藏控制台窗口
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// 进程执行的原始结果
#[derive(Debug)]
struct Completed {
    /// 按读取先后合并的输出行，两个管道之间的相对顺序不做保证
    lines: Vec<String>,
    /// 标准错误输出行
    stderr: Vec<String>,
    /// 退出码
    exit_code: Option<i32>,
}

/// 脚本执行器
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// 临时脚本目录
    tmp_dir: PathBuf,
    /// 默认超时
    default_timeout: Duration,
    /// 取消令牌
    cancel: CancellationToken,
}

impl ScriptRunner {
    /// 创建新的脚本执行器
    pub fn new(tmp_dir: impl Into<PathBuf>, default_timeout: Duration) -> Self {
        Self {
            tmp_dir: tmp_dir.into(),
            default_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// 绑定取消令牌
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 临时脚本目录
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// 默认超时
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// 取消令牌
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 执行脚本请求
    pub async fn run(&self, request: &ExecutionRequest) -> ExecOutcome {
        let target = request.kind.log_target();
        let content = request.script_text();

        let script = match self.write_script(request, &content) {
            Ok(script) => script,
            Err(e) => {
                error!(target: "batch", "写入临时脚本失败 ({}): {}", request.basename, e);
                return ExecOutcome::Failed(format!("写入临时脚本失败: {e}"));
            }
        };

        let (program, args) = request.kind.interpreter(&script);
        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(dir) = script.parent() {
            command.current_dir(dir);
        }

        if request.standalone {
            return self.spawn_detached(request, command, script, &content);
        }

        let timeout = request.timeout.resolve(self.default_timeout);
        let outcome = self
            .execute(
                &request.basename,
                request.kind,
                command,
                request.capture_output,
                request.silent,
                timeout,
            )
            .await;

        self.log_outcome(target, &request.basename, &content, &outcome);
        drop(script);
        outcome
    }

    /// 直接执行程序（不生成脚本）
    pub async fn run_program<S: AsRef<OsStr>>(
        &self,
        basename: &str,
        program: &Path,
        args: &[S],
        timeout: TimeoutPolicy,
    ) -> ExecOutcome {
        let mut command = Command::new(program);
        command.args(args);

        let rendered = std::iter::once(format!("\"{}\"", program.display()))
            .chain(args.iter().map(|a| a.as_ref().to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        let outcome = self
            .execute(
                basename,
                ScriptKind::native_shell(),
                command,
                true,
                true,
                timeout.resolve(self.default_timeout),
            )
            .await;

        self.log_outcome(crate::logging::targets::BATCH, basename, &rendered, &outcome);
        outcome
    }

    /// 写入临时脚本文件
    fn write_script(&self, request: &ExecutionRequest, content: &str) -> std::io::Result<TempPath> {
        std::fs::create_dir_all(&self.tmp_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix(&format!("{}-", request.basename))
            .suffix(&format!(".{}", request.kind.extension()))
            .tempfile_in(&self.tmp_dir)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    /// 启动独立进程，脚本文件在子进程结束后删除
    fn spawn_detached(
        &self,
        request: &ExecutionRequest,
        mut command: Command,
        script: TempPath,
        content: &str,
    ) -> ExecOutcome {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Self::apply_window_flags(&mut command, request.silent);

        match command.spawn() {
            Ok(mut child) => {
                debug!(
                    target: "batch",
                    "独立进程已启动: {} (pid: {:?})\n{}",
                    request.basename,
                    child.id(),
                    truncate_for_log(content, LOG_CONTENT_LIMIT)
                );
                tokio::spawn(async move {
                    let _ = child.wait().await;
                    drop(script);
                });
                ExecOutcome::Detached
            }
            Err(e) => {
                error!(
                    target: "batch",
                    "独立进程启动失败: {} - {}\n{}",
                    request.basename,
                    e,
                    truncate_for_log(content, LOG_CONTENT_LIMIT)
                );
                ExecOutcome::Failed(e.to_string())
            }
        }
    }

    /// 启动进程并等待结束，超时或取消时终止进程
    async fn execute(
        &self,
        basename: &str,
        kind: ScriptKind,
        mut command: Command,
        capture_output: bool,
        silent: bool,
        timeout: Option<Duration>,
    ) -> ExecOutcome {
        command.stdin(Stdio::null()).kill_on_drop(true);
        if capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        Self::apply_window_flags(&mut command, silent);

        let started = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return ExecOutcome::Failed(format!("进程启动失败: {e}")),
        };

        let mut stdout = child.stdout.take().map(BufReader::new);
        let mut stderr = child.stderr.take().map(BufReader::new);
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        let mut completed = Completed {
            lines: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        };
        let mut exited = false;

        // 截止时间同时约束进程退出和输出管道关闭
        let expired = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        while !exited || stdout.is_some() || stderr.is_some() {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(target: "batch", "脚本执行被取消，终止进程: {}", basename);
                    let _ = child.kill().await;
                    return ExecOutcome::Cancelled;
                }
                _ = &mut expired => {
                    warn!(target: "batch", "脚本执行超时 ({:?})，终止进程: {}", timeout, basename);
                    let _ = child.kill().await;
                    return ExecOutcome::TimedOut;
                }
                line = Self::next_line(&mut stdout, &mut stdout_buf) => match line {
                    Some(line) => completed.lines.push(line),
                    None => stdout = None,
                },
                line = Self::next_line(&mut stderr, &mut stderr_buf) => match line {
                    Some(line) => {
                        completed.stderr.push(line.clone());
                        completed.lines.push(line);
                    }
                    None => stderr = None,
                },
                status = child.wait(), if !exited => match status {
                    Ok(status) => {
                        completed.exit_code = status.code();
                        exited = true;
                    }
                    Err(e) => return ExecOutcome::Failed(format!("等待进程结束失败: {e}")),
                },
            }
        }

        debug!(
            target: "batch",
            "进程结束: {} (exit: {:?}, 耗时: {}ms)",
            basename,
            completed.exit_code,
            started.elapsed().as_millis()
        );

        if kind == ScriptKind::VbScript {
            let errors = clean_output_lines(completed.stderr.iter().map(String::as_str));
            if !errors.is_empty() {
                error!(target: "vbs", "{}: {}", basename, errors.join(" ; "));
            }
        }

        if capture_output {
            ExecOutcome::Lines(clean_output_lines(completed.lines.iter().map(String::as_str)))
        } else {
            ExecOutcome::OutputDisabled
        }
    }

    /// 读取下一行，非 UTF-8 内容按有损方式解码；流已关闭时返回 `None`
    ///
    /// 被 `select!` 取消时已读到的字节保留在 `buf` 中，下次调用继续拼接
    async fn next_line<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> Option<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let Some(reader) = reader.as_mut() else {
            return std::future::pending().await;
        };
        match reader.read_until(b'\n', buf).await {
            Ok(0) | Err(_) if buf.is_empty() => None,
            _ => Some(String::from_utf8_lossy(&std::mem::take(buf)).into_owned()),
        }
    }

    /// 设置窗口标志
    #[cfg(windows)]
    fn apply_window_flags(command: &mut Command, silent: bool) {
        if silent {
            command.creation_flags(CREATE_NO_WINDOW);
        }
    }

    /// 设置窗口标志（非Windows系统无操作）
    #[cfg(not(windows))]
    fn apply_window_flags(_command: &mut Command, _silent: bool) {}

    /// 记录执行结果
    fn log_outcome(&self, target: &str, basename: &str, content: &str, outcome: &ExecOutcome) {
        let content = truncate_for_log(content, LOG_CONTENT_LIMIT);
        match outcome {
            ExecOutcome::Lines(lines) => {
                let result = truncate_for_log(&lines.join(" | "), LOG_CONTENT_LIMIT);
                if target == crate::logging::targets::VBS {
                    debug!(target: "vbs", "Exec {}:\n{}\n-> {}", basename, content, result);
                } else {
                    debug!(target: "batch", "Exec {}:\n{}\n-> {}", basename, content, result);
                }
            }
            ExecOutcome::OutputDisabled | ExecOutcome::Detached => {
                debug!(target: "batch", "Exec {}:\n{}\n-> {:?}", basename, content, outcome);
            }
            ExecOutcome::TimedOut | ExecOutcome::Cancelled | ExecOutcome::Failed(_) => {
                error!(target: "batch", "Exec {} 失败 ({:?}):\n{}", basename, outcome, content);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_accessors() {
        let runner = ScriptRunner::new("/tmp/panel", Duration::from_secs(120));
        assert_eq!(runner.tmp_dir(), Path::new("/tmp/panel"));
        assert_eq!(runner.default_timeout(), Duration::from_secs(120));
        assert!(!runner.cancellation().is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_file_is_removed_after_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let runner = ScriptRunner::new(dir.path(), Duration::from_secs(10));
        let request = ExecutionRequest::new(ScriptKind::Shell, "cleanup", "echo done");

        let outcome = runner.run(&request).await;

        assert_eq!(outcome, ExecOutcome::Lines(vec!["done".to_string()]));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_program_fails() {
        let runner = ScriptRunner::new(std::env::temp_dir(), Duration::from_secs(5));
        let outcome = runner
            .run_program("missing", Path::new("/nonexistent/nssm.exe"), &["status"], TimeoutPolicy::Default)
            .await;
        assert!(matches!(outcome, ExecOutcome::Failed(_)));
    }
}
