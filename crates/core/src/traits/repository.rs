use async_trait::async_trait;

use crate::errors::PitrixResult;
use crate::models::{Job, Task, TaskAction, WorkStatus};

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> PitrixResult<()>;

    async fn get_by_id(&self, job_id: &str) -> PitrixResult<Option<Job>>;

    /// 更新状态；`executor` 为 `None` 时保留原值
    async fn update_status(
        &self,
        job_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()>;
}

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> PitrixResult<()>;

    async fn get_by_id(&self, task_id: &str) -> PitrixResult<Option<Task>>;

    async fn update_status(
        &self,
        task_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()>;

    /// 持久化改写后的动作和指令
    async fn update_directive(
        &self,
        task_id: &str,
        task_action: &TaskAction,
        directive: &str,
    ) -> PitrixResult<()>;

    async fn list_by_job(&self, job_id: &str) -> PitrixResult<Vec<Task>>;
}
