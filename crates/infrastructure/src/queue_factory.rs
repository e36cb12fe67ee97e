use std::sync::Arc;

use pitrix_core::config::{QueueBackend, QueueConfig};
use pitrix_core::traits::WorkQueue;
use pitrix_core::PitrixResult;
use tracing::info;

use crate::in_memory_queue::InMemoryWorkQueue;
use crate::redis_queue::RedisWorkQueue;

/// 作业队列和任务队列
#[derive(Clone)]
pub struct WorkQueues {
    pub job: Arc<dyn WorkQueue>,
    pub task: Arc<dyn WorkQueue>,
}

pub struct WorkQueueFactory;

impl WorkQueueFactory {
    pub async fn create(config: &QueueConfig) -> PitrixResult<WorkQueues> {
        match config.backend {
            QueueBackend::Memory => {
                info!("Using in-memory work queues");
                Ok(WorkQueues {
                    job: Arc::new(InMemoryWorkQueue::new(&config.job_queue)),
                    task: Arc::new(InMemoryWorkQueue::new(&config.task_queue)),
                })
            }
            QueueBackend::Redis => {
                info!(
                    job_queue = %config.job_queue,
                    task_queue = %config.task_queue,
                    "Using Redis work queues"
                );
                let job =
                    RedisWorkQueue::connect(&config.redis_url, &config.job_queue, config.poll_interval())
                        .await?;
                let task =
                    RedisWorkQueue::connect(&config.redis_url, &config.task_queue, config.poll_interval())
                        .await?;
                Ok(WorkQueues {
                    job: Arc::new(job),
                    task: Arc::new(task),
                })
            }
        }
    }
}
