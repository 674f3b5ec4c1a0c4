//! 脚本执行请求与结果
//!
//! 一个 [`ExecutionRequest`] 描述一次脚本调用，只使用一次；
//! 执行结果以 [`ExecOutcome`] 值返回，失败不会以错误形式向上传播。

use crate::error::ExecError;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// 日志中脚本内容的最大长度
pub const LOG_CONTENT_LIMIT: usize = 2048;

/// 脚本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// Windows 批处理（cmd.exe）
    Batch,
    /// VBScript（cscript.exe）
    VbScript,
    /// POSIX shell（sh）
    Shell,
}

impl ScriptKind {
    /// 当前平台的默认命令行脚本类型
    pub fn native_shell() -> Self {
        if cfg!(windows) {
            ScriptKind::Batch
        } else {
            ScriptKind::Shell
        }
    }

    /// 临时脚本文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            ScriptKind::Batch => "bat",
            ScriptKind::VbScript => "vbs",
            ScriptKind::Shell => "sh",
        }
    }

    /// 行分隔符
    pub fn line_ending(&self) -> &'static str {
        match self {
            ScriptKind::Batch | ScriptKind::VbScript => "\r\n",
            ScriptKind::Shell => "\n",
        }
    }

    /// 脚本头
    pub fn header(&self) -> &'static str {
        match self {
            ScriptKind::Batch => "@ECHO OFF",
            ScriptKind::VbScript => "On Error Resume Next",
            ScriptKind::Shell => "",
        }
    }

    /// 脚本尾，VBScript 把最后一个错误写到标准错误输出
    pub fn footer(&self) -> &'static str {
        match self {
            ScriptKind::VbScript => {
                "If Err.Number <> 0 Then\r\n    WScript.StdErr.WriteLine \"Error \" & Err.Number & \": \" & Err.Description\r\nEnd If"
            }
            ScriptKind::Batch | ScriptKind::Shell => "",
        }
    }

    /// 日志 target
    pub fn log_target(&self) -> &'static str {
        match self {
            ScriptKind::VbScript => crate::logging::targets::VBS,
            ScriptKind::Batch | ScriptKind::Shell => crate::logging::targets::BATCH,
        }
    }

    /// 解释器程序及参数
    pub fn interpreter(&self, script: &Path) -> (OsString, Vec<OsString>) {
        match self {
            ScriptKind::Batch => (
                OsString::from("cmd.exe"),
                vec![
                    OsString::from("/D"),
                    OsString::from("/Q"),
                    OsString::from("/C"),
                    script.as_os_str().to_os_string(),
                ],
            ),
            ScriptKind::VbScript => (
                OsString::from("cscript.exe"),
                vec![
                    OsString::from("//NoLogo"),
                    OsString::from("//E:vbscript"),
                    script.as_os_str().to_os_string(),
                ],
            ),
            ScriptKind::Shell => (OsString::from("sh"), vec![script.as_os_str().to_os_string()]),
        }
    }
}

/// 超时策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeoutPolicy {
    /// 使用配置中的默认脚本超时
    #[default]
    Default,
    /// 指定秒数
    Seconds(u64),
    /// 不限时，只能通过取消结束
    Disabled,
}

impl TimeoutPolicy {
    /// 根据默认值解析实际超时
    pub fn resolve(&self, default: Duration) -> Option<Duration> {
        match self {
            TimeoutPolicy::Default => Some(default),
            TimeoutPolicy::Seconds(seconds) => Some(Duration::from_secs(*seconds)),
            TimeoutPolicy::Disabled => None,
        }
    }
}

/// 一次脚本调用请求
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    /// 临时文件名前缀，同时用于日志
    pub basename: String,
    /// 脚本正文（不含头尾）
    pub script_body: String,
    /// 超时策略
    pub timeout: TimeoutPolicy,
    /// 是否收集输出
    pub capture_output: bool,
    /// 是否独立运行（不等待结束）
    pub standalone: bool,
    /// 是否隐藏控制台窗口
    pub silent: bool,
    /// 脚本类型
    pub kind: ScriptKind,
}

impl ExecutionRequest {
    /// 创建新的执行请求，默认收集输出、使用默认超时、静默执行
    pub fn new(kind: ScriptKind, basename: impl Into<String>, script_body: impl Into<String>) -> Self {
        Self {
            basename: basename.into(),
            script_body: script_body.into(),
            timeout: TimeoutPolicy::Default,
            capture_output: true,
            standalone: false,
            silent: true,
            kind,
        }
    }

    /// 设置超时策略
    pub fn timeout(mut self, timeout: TimeoutPolicy) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置是否收集输出
    pub fn capture_output(mut self, capture_output: bool) -> Self {
        self.capture_output = capture_output;
        self
    }

    /// 设置是否隐藏窗口
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// 独立运行：不限时、不收集输出、不等待结束
    pub fn standalone(mut self) -> Self {
        self.standalone = true;
        self.capture_output = false;
        self.timeout = TimeoutPolicy::Disabled;
        self
    }

    /// 生成完整脚本文本
    pub fn script_text(&self) -> String {
        let eol = self.kind.line_ending();
        let mut text = String::new();
        for part in [self.kind.header(), self.script_body.as_str(), self.kind.footer()] {
            if !part.is_empty() {
                text.push_str(part);
                text.push_str(eol);
            }
        }
        text
    }
}

/// 脚本执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// 执行完成，按顺序输出的非空行（已去除首尾空白）
    Lines(Vec<String>),
    /// 执行完成，但未收集输出
    OutputDisabled,
    /// 独立进程已启动，未等待结束
    Detached,
    /// 超时，进程已被终止
    TimedOut,
    /// 被取消，进程已被终止
    Cancelled,
    /// 启动或等待失败
    Failed(String),
}

impl ExecOutcome {
    /// 是否执行成功
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecOutcome::Lines(_) | ExecOutcome::OutputDisabled | ExecOutcome::Detached
        )
    }

    /// 输出行
    pub fn lines(&self) -> Option<&[String]> {
        match self {
            ExecOutcome::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    /// 取出输出行
    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            ExecOutcome::Lines(lines) => Some(lines),
            _ => None,
        }
    }

    /// 最后一行输出
    pub fn last_line(&self) -> Option<&str> {
        self.lines()
            .and_then(|lines| lines.last())
            .map(String::as_str)
    }

    /// 转换为 `Result`，未收集输出时返回空列表
    pub fn into_result(self, basename: &str, timeout: Option<Duration>) -> Result<Vec<String>, ExecError> {
        match self {
            ExecOutcome::Lines(lines) => Ok(lines),
            ExecOutcome::OutputDisabled | ExecOutcome::Detached => Ok(Vec::new()),
            ExecOutcome::TimedOut => Err(ExecError::Timeout {
                basename: basename.to_string(),
                seconds: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            }),
            ExecOutcome::Cancelled => Err(ExecError::Cancelled),
            ExecOutcome::Failed(reason) => Err(ExecError::SpawnFailed(reason)),
        }
    }
}

/// 整理原始输出：按行拆分、去除首尾空白、丢弃空行
pub fn clean_output_lines<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    raw.into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 截断日志内容，保证落在字符边界上
pub fn truncate_for_log(content: &str, limit: usize) -> String {
    if content.len() <= limit {
        return content.to_string();
    }
    let mut end = limit;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes truncated)", &content[..end], content.len() - end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        let lines = ExecOutcome::Lines(vec!["ok".to_string()]);
        assert_eq!(lines.into_result("x", None).unwrap(), vec!["ok".to_string()]);
        assert!(ExecOutcome::OutputDisabled.into_result("x", None).unwrap().is_empty());

        let err = ExecOutcome::TimedOut
            .into_result("nssm", Some(Duration::from_secs(10)))
            .unwrap_err();
        assert_eq!(err.to_string(), "脚本 nssm 执行超时 (10秒)");
        assert!(matches!(
            ExecOutcome::Cancelled.into_result("x", None),
            Err(ExecError::Cancelled)
        ));
    }

    #[test]
    fn test_batch_script_text_has_header() {
        let request = ExecutionRequest::new(ScriptKind::Batch, "nssm", "\"nssm.exe\" status foo");
        assert_eq!(request.script_text(), "@ECHO OFF\r\n\"nssm.exe\" status foo\r\n");
    }

    #[test]
    fn test_vbs_script_text_reports_errors() {
        let request = ExecutionRequest::new(ScriptKind::VbScript, "getServiceInfos", "WScript.Echo 1");
        let text = request.script_text();
        assert!(text.starts_with("On Error Resume Next\r\n"));
        assert!(text.contains("WScript.StdErr.WriteLine"));
    }

    #[test]
    fn test_standalone_disables_capture_and_timeout() {
        let request = ExecutionRequest::new(ScriptKind::Shell, "open", "true").standalone();
        assert!(request.standalone);
        assert!(!request.capture_output);
        assert_eq!(request.timeout, TimeoutPolicy::Disabled);
    }

    #[test]
    fn test_timeout_resolution() {
        let default = Duration::from_secs(120);
        assert_eq!(TimeoutPolicy::Default.resolve(default), Some(default));
        assert_eq!(
            TimeoutPolicy::Seconds(5).resolve(default),
            Some(Duration::from_secs(5))
        );
        assert_eq!(TimeoutPolicy::Disabled.resolve(default), None);
    }

    #[test]
    fn test_clean_output_lines() {
        let lines = clean_output_lines(["  Syntax OK \r\n\r\n", "\n warning \n"]);
        assert_eq!(lines, vec!["Syntax OK", "warning"]);
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let content = "服务".repeat(1000);
        let truncated = truncate_for_log(&content, LOG_CONTENT_LIMIT);
        assert!(truncated.len() < content.len());
        assert!(truncated.contains("bytes truncated"));
        assert_eq!(truncate_for_log("short", LOG_CONTENT_LIMIT), "short");
    }

    #[test]
    fn test_outcome_success() {
        assert!(ExecOutcome::OutputDisabled.is_success());
        assert!(!ExecOutcome::TimedOut.is_success());
        let outcome = ExecOutcome::Lines(vec!["a".into(), "Syntax OK".into()]);
        assert_eq!(outcome.last_line(), Some("Syntax OK"));
    }
}
