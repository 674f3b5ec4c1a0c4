//! 脚本执行桥接模块
//!
//! 在独立进程中执行批处理 / VBScript / shell 脚本，并以行为单位返回输出

pub mod batch;
pub mod request;
pub mod runner;
pub mod vbs;

// 重新导出主要类型
pub use batch::Batch;
pub use request::{ExecOutcome, ExecutionRequest, ScriptKind, TimeoutPolicy};
pub use runner::ScriptRunner;
pub use vbs::{ProcessEntry, ServiceInfos, Vbs};
