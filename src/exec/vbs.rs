//! VBScript / WMI 辅助命令
//!
//! 通过 `cscript.exe` 执行生成的 VBScript，查询 `Win32_Service`、`Win32_Process`。
//! 每条记录以 ` || ` 分隔字段输出一行。

use crate::exec::request::{ExecOutcome, ExecutionRequest, ScriptKind, TimeoutPolicy};
use crate::exec::runner::ScriptRunner;
use serde::{Deserialize, Serialize};

/// 字段分隔符，解析时两侧空白会被去除
pub const FIELD_SEPARATOR: &str = "||";

const WMI_CONNECT: &str =
    "Set objWMIService = GetObject(\"winmgmts:{impersonationLevel=impersonate}!\\\\.\\root\\cimv2\")";

/// WMI 中的服务注册信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfos {
    /// 服务名
    pub name: String,
    /// 显示名称
    pub display_name: String,
    /// 描述
    pub description: String,
    /// 可执行文件路径及参数
    pub path_name: String,
    /// 状态文本（Running/Stopped/...）
    pub state: String,
}

/// 进程信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessEntry {
    /// 进程ID
    pub pid: u32,
    /// 映像名称
    pub name: String,
    /// 可执行文件路径
    pub executable_path: String,
}

/// VBScript 命令封装
#[derive(Debug, Clone)]
pub struct Vbs {
    runner: ScriptRunner,
}

impl Vbs {
    /// 创建新的 VBScript 封装
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }

    /// 执行 VBScript 并收集输出
    pub async fn exec(&self, basename: &str, content: &str, timeout: TimeoutPolicy) -> ExecOutcome {
        let request = ExecutionRequest::new(ScriptKind::VbScript, basename, content).timeout(timeout);
        self.runner.run(&request).await
    }

    /// 查询服务的 WMI 注册信息
    pub async fn get_service_infos(&self, service_name: &str) -> Option<ServiceInfos> {
        let content = [
            WMI_CONNECT.to_string(),
            format!(
                "Set colItems = objWMIService.ExecQuery(\"SELECT * FROM Win32_Service WHERE Name = '{}'\")",
                escape_wql(service_name)
            ),
            "For Each objItem In colItems".to_string(),
            "    WScript.Echo objItem.Name & \" || \" & objItem.DisplayName & \" || \" & objItem.Description & \" || \" & objItem.PathName & \" || \" & objItem.State".to_string(),
            "Next".to_string(),
        ]
        .join("\r\n");

        let outcome = self.exec("getServiceInfos", &content, TimeoutPolicy::Default).await;
        outcome
            .lines()
            .and_then(|lines| lines.iter().find_map(|line| parse_service_infos_line(line)))
    }

    /// 列出进程
    pub async fn get_list_procs(&self) -> Vec<ProcessEntry> {
        let content = [
            WMI_CONNECT,
            "Set colItems = objWMIService.ExecQuery(\"SELECT * FROM Win32_Process\")",
            "For Each objItem In colItems",
            "    WScript.Echo objItem.ProcessId & \" || \" & objItem.Name & \" || \" & objItem.ExecutablePath",
            "Next",
        ]
        .join("\r\n");

        self.exec("getListProcs", &content, TimeoutPolicy::Default)
            .await
            .lines()
            .map(|lines| lines.iter().filter_map(|line| parse_process_line(line)).collect())
            .unwrap_or_default()
    }

    /// 结束进程
    pub async fn kill_proc(&self, pid: u32) -> bool {
        let content = [
            WMI_CONNECT.to_string(),
            format!("Set colItems = objWMIService.ExecQuery(\"SELECT * FROM Win32_Process WHERE ProcessId = {pid}\")"),
            "For Each objItem In colItems".to_string(),
            "    objItem.Terminate()".to_string(),
            "Next".to_string(),
        ]
        .join("\r\n");

        self.exec("killProc", &content, TimeoutPolicy::Default)
            .await
            .is_success()
    }
}

/// 转义 WQL 字符串中的单引号与反斜杠
fn escape_wql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// 解析一行服务信息
pub fn parse_service_infos_line(line: &str) -> Option<ServiceInfos> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();
    if fields.len() != 5 || fields[0].is_empty() {
        return None;
    }
    Some(ServiceInfos {
        name: fields[0].to_string(),
        display_name: fields[1].to_string(),
        description: fields[2].to_string(),
        path_name: fields[3].to_string(),
        state: fields[4].to_string(),
    })
}

/// 解析一行进程信息
pub fn parse_process_line(line: &str) -> Option<ProcessEntry> {
    let mut fields = line.split(FIELD_SEPARATOR).map(str::trim);
    let pid = fields.next()?.parse().ok()?;
    let name = fields.next()?.to_string();
    let executable_path = fields.next().unwrap_or_default().to_string();
    Some(ProcessEntry {
        pid,
        name,
        executable_path,
    })
}
