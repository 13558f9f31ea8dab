// ============================================================================
// 有界轮询：固定间隔的重试例程
// ============================================================================
//
// 提取等待、结账表单探测都走这里，不再各自挂定时器。
// 所有等待都有总时限；唯一的取消点是传入的 CancellationToken。

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 重试策略
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// 重试间隔
    pub interval: Duration,
    /// 总时限，从第一次探测开始计时
    pub deadline: Duration,
}

impl RetryPolicy {
    /// 固定间隔
    pub fn fixed(interval: Duration, deadline: Duration) -> Self {
        RetryPolicy { interval, deadline }
    }
}

/// 轮询结果
#[derive(Debug, PartialEq)]
pub enum PollOutcome<T> {
    /// 探测命中
    Ready(T),
    /// 时限内始终未命中
    Exhausted { attempts: u32 },
    /// 被取消
    Cancelled,
}

/// 反复调用 `check` 直到返回 Some、超过总时限或被取消
///
/// `check` 的参数是从 1 开始的尝试序号。
pub async fn poll_until<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut check: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let hit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            hit = check(attempts) => hit,
        };
        if let Some(value) = hit {
            return PollOutcome::Ready(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= policy.deadline {
            return PollOutcome::Exhausted { attempts };
        }

        let wait = policy.interval.min(policy.deadline - elapsed);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

/// 可取消的定长暂停，返回 false 表示被取消
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
