use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pitrix_core::traits::WorkQueue;
use pitrix_core::{PitrixError, PitrixResult};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// 内存工作队列
///
/// 基于 Tokio channel，适用于单进程部署和测试。进程退出后队列内容丢失。
#[derive(Debug)]
pub struct InMemoryWorkQueue {
    name: String,
    sender: mpsc::UnboundedSender<String>,
    /// 多个消费者共享同一个接收端
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    size: Arc<AtomicUsize>,
}

impl InMemoryWorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            size: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, id: &str) -> PitrixResult<()> {
        self.sender
            .send(id.to_string())
            .map_err(|e| PitrixError::queue_error(format!("Failed to enqueue {id}: {e}")))?;
        self.size.fetch_add(1, Ordering::SeqCst);
        debug!(queue = %self.name, id, "enqueued");
        Ok(())
    }

    async fn dequeue(&self) -> PitrixResult<String> {
        let mut receiver = self.receiver.lock().await;
        match receiver.recv().await {
            Some(id) => {
                self.size.fetch_sub(1, Ordering::SeqCst);
                Ok(id)
            }
            None => Err(PitrixError::queue_error(format!(
                "Queue {} is closed",
                self.name
            ))),
        }
    }
}
