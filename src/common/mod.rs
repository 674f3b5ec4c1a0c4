//! 通用模块
//!
//! 包含轮询等跨子系统复用的功能

pub mod poll;

// 重新导出主要类型
pub use poll::{poll_until, sleep_or_cancel, PollOutcome, Probe, WaitPolicy, DEFAULT_POLL_INTERVAL};
