use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{PitrixError, PitrixResult};
use crate::models::{SubtaskMessage, WorkStatus};
use crate::wait::{wait_for, PollStatus, WaitPolicy};

/// pilot服务：把子任务下发到集群节点上执行
#[async_trait]
pub trait PilotClient: Send + Sync {
    async fn handle_subtask(&self, subtask: &SubtaskMessage) -> PitrixResult<()>;

    async fn get_subtask_status(&self, subtask_id: &str) -> PitrixResult<WorkStatus>;

    async fn wait_subtask(
        &self,
        subtask_id: &str,
        timeout: Duration,
        interval: Duration,
    ) -> PitrixResult<()> {
        let what = format!("subtask {subtask_id}");
        wait_for(&what, WaitPolicy::new(interval, timeout), move || async move {
            let status = self.get_subtask_status(subtask_id).await?;
            Ok::<_, PitrixError>(PollStatus::from(status))
        })
        .await
    }
}
