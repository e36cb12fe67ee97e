use std::time::Duration;

use async_trait::async_trait;
use pitrix_core::traits::WorkQueue;
use pitrix_core::{PitrixError, PitrixResult};
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{debug, error, instrument};

/// 基于Redis列表的持久化工作队列
///
/// 入队使用 `LPUSH`，出队使用 `RPOP`，保持先进先出。
/// 队列为空时按 `poll_interval` 轮询，避免阻塞命令占用连接。
#[derive(Clone)]
pub struct RedisWorkQueue {
    key: String,
    connection: ConnectionManager,
    poll_interval: Duration,
}

impl RedisWorkQueue {
    pub async fn connect(redis_url: &str, key: &str, poll_interval: Duration) -> PitrixResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            PitrixError::queue_error(format!("Failed to create Redis client: {e}"))
        })?;
        let connection = ConnectionManager::new(client).await.map_err(|e| {
            PitrixError::queue_error(format!("Failed to connect to Redis: {e}"))
        })?;

        let queue = Self {
            key: key.to_string(),
            connection,
            poll_interval,
        };
        queue.ping().await?;
        debug!(key, "connected to Redis work queue");
        Ok(queue)
    }

    pub async fn ping(&self) -> PitrixResult<()> {
        let mut conn = self.connection.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| PitrixError::queue_error(format!("Redis PING failed: {e}")))?;
        if response != "PONG" {
            let error_msg = format!("Unexpected PING response: {response}");
            error!("{}", error_msg);
            return Err(PitrixError::queue_error(error_msg));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    fn name(&self) -> &str {
        &self.key
    }

    #[instrument(skip(self), fields(queue = %self.key))]
    async fn enqueue(&self, id: &str) -> PitrixResult<()> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(id)
            .query_async(&mut conn)
            .await
            .map_err(|e| PitrixError::queue_error(format!("Redis LPUSH failed: {e}")))?;
        Ok(())
    }

    async fn dequeue(&self) -> PitrixResult<String> {
        let mut conn = self.connection.clone();
        loop {
            let popped: Option<String> = redis::cmd("RPOP")
                .arg(&self.key)
                .query_async(&mut conn)
                .await
                .map_err(|e| PitrixError::queue_error(format!("Redis RPOP failed: {e}")))?;
            if let Some(id) = popped {
                debug!(queue = %self.key, id = %id, "dequeued");
                return Ok(id);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
