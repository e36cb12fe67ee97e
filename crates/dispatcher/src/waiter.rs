//! 轮询仓储中的作业/任务状态

use futures::future::try_join_all;
use pitrix_core::traits::{JobRepository, TaskRepository};
use pitrix_core::{wait_for, LayerRef, PitrixError, PitrixResult, PollStatus, WaitPolicy};

/// 等待任务到达终态，失败返回 [`PitrixError::RemoteFailed`]
pub async fn wait_task(
    tasks: &dyn TaskRepository,
    task_id: &str,
    policy: WaitPolicy,
) -> PitrixResult<()> {
    let what = format!("task {task_id}");
    wait_for(&what, policy, move || async move {
        match tasks.get_by_id(task_id).await? {
            Some(task) => Ok(PollStatus::from(task.status)),
            None => Err(PitrixError::task_not_found(task_id)),
        }
    })
    .await
}

pub async fn wait_job(
    jobs: &dyn JobRepository,
    job_id: &str,
    policy: WaitPolicy,
) -> PitrixResult<()> {
    let what = format!("job {job_id}");
    wait_for(&what, policy, move || async move {
        match jobs.get_by_id(job_id).await? {
            Some(job) => Ok(PollStatus::from(job.status)),
            None => Err(PitrixError::job_not_found(job_id)),
        }
    })
    .await
}

/// 并发等待一层内的全部任务，任一失败立即返回
pub async fn wait_layer(
    tasks: &dyn TaskRepository,
    layer: LayerRef<'_>,
    policy: WaitPolicy,
) -> PitrixResult<()> {
    try_join_all(layer.tasks().map(|task| wait_task(tasks, &task.task_id, policy))).await?;
    Ok(())
}
