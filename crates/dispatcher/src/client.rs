use std::sync::Arc;

use pitrix_core::traits::{JobRepository, TaskRepository, WorkQueue};
use pitrix_core::{Job, PitrixError, PitrixResult, WaitPolicy, WorkStatus};
use tracing::info;

use crate::waiter;

/// 作业提交与等待
pub struct JobClient {
    jobs: Arc<dyn JobRepository>,
    tasks: Arc<dyn TaskRepository>,
    job_queue: Arc<dyn WorkQueue>,
    job_wait: WaitPolicy,
    task_wait: WaitPolicy,
}

impl JobClient {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        tasks: Arc<dyn TaskRepository>,
        job_queue: Arc<dyn WorkQueue>,
        job_wait: WaitPolicy,
        task_wait: WaitPolicy,
    ) -> Self {
        Self {
            jobs,
            tasks,
            job_queue,
            job_wait,
            task_wait,
        }
    }

    /// 保存作业并放入作业队列，返回作业ID
    pub async fn submit(&self, mut job: Job) -> PitrixResult<String> {
        job.status = WorkStatus::Pending;
        job.executor.clear();
        self.jobs.create(&job).await?;
        self.job_queue.enqueue(&job.job_id).await?;
        info!(
            "作业 {} 已提交: 动作 {}，集群 {}",
            job.job_id, job.job_action, job.cluster_id
        );
        Ok(job.job_id)
    }

    pub async fn get_job(&self, job_id: &str) -> PitrixResult<Job> {
        self.jobs
            .get_by_id(job_id)
            .await?
            .ok_or_else(|| PitrixError::job_not_found(job_id))
    }

    pub async fn wait_job(&self, job_id: &str) -> PitrixResult<()> {
        waiter::wait_job(self.jobs.as_ref(), job_id, self.job_wait).await
    }

    pub async fn wait_task(&self, task_id: &str) -> PitrixResult<()> {
        waiter::wait_task(self.tasks.as_ref(), task_id, self.task_wait).await
    }
}
