//! 有界轮询
//!
//! 以固定间隔反复探测外部状态，直到状态稳定、截止时间到达或被取消。
//! 首次探测前总会先等待一次 `first_wait`，给刚发出的状态变更留出时间。

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// 首次探测前的等待时间
    pub first_wait: Duration,
    /// 两次探测之间的间隔
    pub interval: Duration,
    /// 总超时时间，`None` 表示只能通过取消结束
    pub timeout: Option<Duration>,
}

impl WaitPolicy {
    /// 创建新的轮询策略，首次等待与间隔相同
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self {
            first_wait: interval,
            interval,
            timeout,
        }
    }

    /// 设置首次等待时间
    pub fn with_first_wait(mut self, first_wait: Duration) -> Self {
        self.first_wait = first_wait;
        self
    }

    /// 去掉超时限制
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, Some(Duration::from_secs(10)))
    }
}

/// 单次探测的结论
#[derive(Debug, Clone, PartialEq)]
pub enum Probe<T> {
    /// 状态已稳定，结束轮询
    Done(T),
    /// 仍需继续等待，携带本次观察结果
    Pending(T),
}

/// 轮询结果
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// 状态已稳定
    Done(T),
    /// 超时，携带最后一次观察结果
    Expired(Option<T>),
    /// 被取消，携带最后一次观察结果
    Cancelled(Option<T>),
}

impl<T> PollOutcome<T> {
    /// 取出最后一次观察结果
    pub fn into_last(self) -> Option<T> {
        match self {
            PollOutcome::Done(value) => Some(value),
            PollOutcome::Expired(last) | PollOutcome::Cancelled(last) => last,
        }
    }

    /// 是否正常结束
    pub fn is_done(&self) -> bool {
        matches!(self, PollOutcome::Done(_))
    }
}

/// 按策略轮询直到探测结果稳定
///
/// 截止时间在首次等待之前确定；每轮探测之后检查一次截止时间，
/// 因此实际耗时最多超出 `timeout` 一个探测间隔。
pub async fn poll_until<T, F, Fut>(
    policy: WaitPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Probe<T>>,
{
    let deadline = policy.timeout.map(|timeout| Instant::now() + timeout);
    let mut last = None;

    if !sleep_or_cancel(policy.first_wait, cancel).await {
        return PollOutcome::Cancelled(last);
    }

    loop {
        let observed = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled(last),
            observed = probe() => observed,
        };

        match observed {
            Probe::Done(value) => return PollOutcome::Done(value),
            Probe::Pending(value) => last = Some(value),
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return PollOutcome::Expired(last);
            }
        }

        if !sleep_or_cancel(policy.interval, cancel).await {
            return PollOutcome::Cancelled(last);
        }
    }
}

/// 可取消的休眠，被取消时返回 `false`
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(timeout_ms: u64) -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(5), Some(Duration::from_millis(timeout_ms)))
    }

    #[tokio::test]
    async fn test_poll_until_done_after_pending() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let cancel = CancellationToken::new();

        let outcome = poll_until(fast_policy(1000), &cancel, || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Probe::Pending(n)
                } else {
                    Probe::Done(n)
                }
            }
        })
        .await;

        assert_eq!(outcome, PollOutcome::Done(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_poll_until_expires_with_last_observation() {
        let cancel = CancellationToken::new();
        let started = std::time::Instant::now();

        let outcome = poll_until(fast_policy(50), &cancel, || async { Probe::Pending("pending") }).await;

        assert_eq!(outcome, PollOutcome::Expired(Some("pending")));
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_poll_until_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let policy = fast_policy(10_000).without_timeout();
        let outcome = poll_until(policy, &cancel, || async { Probe::Pending(1u8) }).await;

        assert!(matches!(outcome, PollOutcome::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_first_wait_is_honoured() {
        let cancel = CancellationToken::new();
        let policy = WaitPolicy::new(Duration::from_millis(1), Some(Duration::from_secs(1)))
            .with_first_wait(Duration::from_millis(40));
        let started = std::time::Instant::now();

        let outcome = poll_until(policy, &cancel, || async { Probe::Done(()) }).await;

        assert!(outcome.is_done());
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
