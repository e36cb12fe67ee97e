use std::time::Duration;

use async_trait::async_trait;

use crate::errors::PitrixResult;
use crate::models::{Job, Task};
use crate::task_layer::TaskLayers;

/// 运行时provider插件
///
/// 负责把作业拆分为任务层，并执行目标为自己的任务。
/// 执行和等待过程中可以改写任务指令，例如回填云资源ID。
#[async_trait]
pub trait ProviderPlugin: Send + Sync {
    fn name(&self) -> &str;

    async fn split_job_into_tasks(&self, job: &Job) -> PitrixResult<TaskLayers>;

    async fn handle_subtask(&self, task: &mut Task) -> PitrixResult<()>;

    async fn wait_subtask(
        &self,
        task: &mut Task,
        timeout: Duration,
        interval: Duration,
    ) -> PitrixResult<()>;
}
