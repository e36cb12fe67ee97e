//! 内存仓储，用于单进程部署和测试

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use pitrix_core::traits::{JobRepository, TaskRepository};
use pitrix_core::{Job, PitrixError, PitrixResult, Task, TaskAction, WorkStatus};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<String, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> PitrixResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.job_id) {
            return Err(PitrixError::database_error(format!(
                "作业已存在: {}",
                job.job_id
            )));
        }
        jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get_by_id(&self, job_id: &str) -> PitrixResult<Option<Job>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update_status(
        &self,
        job_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PitrixError::job_not_found(job_id))?;
        job.status = status;
        job.status_time = Utc::now();
        if let Some(executor) = executor {
            job.executor = executor.to_string();
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, task: &Task) -> PitrixResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.task_id) {
            return Err(PitrixError::database_error(format!(
                "任务已存在: {}",
                task.task_id
            )));
        }
        tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn get_by_id(&self, task_id: &str) -> PitrixResult<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| PitrixError::task_not_found(task_id))?;
        task.status = status;
        task.status_time = Utc::now();
        if let Some(executor) = executor {
            task.executor = executor.to_string();
        }
        Ok(())
    }

    async fn update_directive(
        &self,
        task_id: &str,
        task_action: &TaskAction,
        directive: &str,
    ) -> PitrixResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| PitrixError::task_not_found(task_id))?;
        task.task_action = task_action.clone();
        task.directive = directive.to_string();
        Ok(())
    }

    async fn list_by_job(&self, job_id: &str) -> PitrixResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut found: Vec<Task> = tasks
            .values()
            .filter(|t| t.job_id == job_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.create_time.cmp(&b.create_time));
        Ok(found)
    }
}
