//! 轮询等待
//!
//! 以固定间隔轮询远端状态，直到成功、失败或超时。
//! 可重试的错误（网络、数据库、队列）只记录日志并继续轮询，
//! 其他错误立即终止等待。

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::errors::{PitrixError, PitrixResult};
use crate::models::WorkStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval: u64, timeout: u64) -> Self {
        Self::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }
}

/// 单次轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    Succeeded,
    Failed(String),
}

impl From<WorkStatus> for PollStatus {
    fn from(status: WorkStatus) -> Self {
        match status {
            WorkStatus::Pending | WorkStatus::Working => PollStatus::Pending,
            WorkStatus::Successful => PollStatus::Succeeded,
            WorkStatus::Failed => PollStatus::Failed("status is failed".to_string()),
        }
    }
}

/// 轮询直到完成
///
/// - 成功返回 `Ok(())`
/// - 远端报告失败返回 [`PitrixError::RemoteFailed`]
/// - 超过 `policy.timeout` 返回 [`PitrixError::WaitTimeout`]
pub async fn wait_for<F, Fut>(what: &str, policy: WaitPolicy, mut poll: F) -> PitrixResult<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = PitrixResult<PollStatus>> + Send,
{
    let deadline = Instant::now() + policy.timeout;
    let mut ticker = time::interval(policy.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = time::sleep_until(deadline) => {
                return Err(PitrixError::wait_timeout(what, policy.timeout));
            }
        }

        attempts += 1;
        let polled = match time::timeout_at(deadline, poll()).await {
            Ok(polled) => polled,
            Err(_) => return Err(PitrixError::wait_timeout(what, policy.timeout)),
        };

        match polled {
            Ok(PollStatus::Succeeded) => {
                debug!(what, attempts, "wait finished");
                return Ok(());
            }
            Ok(PollStatus::Failed(reason)) => {
                return Err(PitrixError::remote_failed(what, reason));
            }
            Ok(PollStatus::Pending) => {}
            Err(e) if e.is_retryable() => {
                warn!(what, attempts, error = %e, "poll failed, will retry");
            }
            Err(e) => return Err(e),
        }
    }
}
