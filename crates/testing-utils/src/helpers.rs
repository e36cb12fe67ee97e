use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pitrix_core::WaitPolicy;
use pitrix_infrastructure::{InMemoryJobRepository, InMemoryTaskRepository, InMemoryWorkQueue};

/// 毫秒级的等待策略，测试用
pub fn fast_policy() -> WaitPolicy {
    WaitPolicy::new(Duration::from_millis(5), Duration::from_secs(5))
}

/// 反复检查条件直到成立，超时返回 false
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// 内存仓储和队列的组合
#[derive(Clone)]
pub struct MemoryBackend {
    pub jobs: Arc<InMemoryJobRepository>,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub job_queue: Arc<InMemoryWorkQueue>,
    pub task_queue: Arc<InMemoryWorkQueue>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            jobs: Default::default(),
            tasks: Default::default(),
            job_queue: Arc::new(InMemoryWorkQueue::new("test:job")),
            task_queue: Arc::new(InMemoryWorkQueue::new("test:task")),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}
