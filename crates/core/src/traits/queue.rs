use async_trait::async_trait;

use crate::errors::PitrixResult;

/// 持久化的ID队列
///
/// 作业队列和任务队列都只传递ID，记录本身保存在仓储中。
#[async_trait]
pub trait WorkQueue: Send + Sync {
    fn name(&self) -> &str;

    async fn enqueue(&self, id: &str) -> PitrixResult<()>;

    /// 阻塞直到取到一个ID
    async fn dequeue(&self) -> PitrixResult<String>;
}
