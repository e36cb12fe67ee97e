use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use pitrix_core::traits::{ClusterManager, JobRepository, TaskRepository, WorkQueue};
use pitrix_core::{
    Job, LayerRef, PitrixError, PitrixResult, ProviderRegistry, TaskLayers, UnitHandler,
    WaitPolicy, WorkStatus,
};
use tracing::{debug, error, info, warn};

use crate::processor::JobProcessor;
use crate::waiter::wait_layer;

/// 作业控制器依赖的外部组件
#[derive(Clone)]
pub struct JobControllerDeps {
    pub jobs: Arc<dyn JobRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub task_queue: Arc<dyn WorkQueue>,
    pub providers: ProviderRegistry,
    pub cluster_manager: Arc<dyn ClusterManager>,
}

/// 作业控制器
///
/// 每个作业的处理流程：
/// 1. 标记为 working 并记录执行主机
/// 2. 加载作业，执行前置处理
/// 3. 由provider拆分为任务层，自根层到叶子层逐层派发：
///    派发某层之前等待其父层全部成功，叶子层派发后等待其完成
/// 4. 成功执行后置处理，失败执行收尾处理
/// 5. 写入最终状态
pub struct JobController {
    jobs: Arc<dyn JobRepository>,
    tasks: Arc<dyn TaskRepository>,
    task_queue: Arc<dyn WorkQueue>,
    providers: ProviderRegistry,
    processor: JobProcessor,
    task_wait: WaitPolicy,
    hostname: String,
}

impl JobController {
    pub fn new(deps: JobControllerDeps, task_wait: WaitPolicy, hostname: impl Into<String>) -> Self {
        Self {
            jobs: deps.jobs,
            tasks: deps.tasks,
            task_queue: deps.task_queue,
            providers: deps.providers,
            processor: JobProcessor::new(deps.cluster_manager),
            task_wait,
            hostname: hostname.into(),
        }
    }

    async fn claim(&self, job_id: &str) {
        if let Err(e) = self
            .jobs
            .update_status(job_id, WorkStatus::Working, Some(&self.hostname))
            .await
        {
            warn!("标记作业 {} 为处理中失败: {}", job_id, e);
        }
    }

    async fn finish(&self, job_id: &str, status: WorkStatus) {
        if let Err(e) = self.jobs.update_status(job_id, status, None).await {
            error!("写入作业 {} 最终状态 {} 失败: {}", job_id, status, e);
        }
    }

    async fn run(&self, job_id: &str) -> PitrixResult<()> {
        let job = self
            .jobs
            .get_by_id(job_id)
            .await?
            .ok_or_else(|| PitrixError::job_not_found(job_id))?;

        info!(
            "开始处理作业 {}: 动作 {}，集群 {}",
            job.job_id, job.job_action, job.cluster_id
        );

        let result = self.process(&job).await;
        if result.is_err() {
            if let Err(e) = self.processor.on_failure(&job).await {
                warn!("作业 {} 收尾处理失败: {}", job.job_id, e);
            }
        }
        result
    }

    async fn process(&self, job: &Job) -> PitrixResult<()> {
        self.processor.pre(job).await?;

        let provider = self.providers.resolve(&job.provider).await?;
        let mut layers = provider.split_job_into_tasks(job).await?;
        layers.bind_to_job(job);
        debug!(
            "作业 {} 拆分为 {} 层，共 {} 个任务",
            job.job_id,
            layers.layer_count(),
            layers.task_count()
        );

        // 全部任务先以pending落库，之后逐层入队
        for task in layers.tasks() {
            self.tasks.create(task).await?;
        }

        self.walk(job, &layers).await?;
        self.processor.post(job).await
    }

    async fn walk(&self, job: &Job, layers: &TaskLayers) -> PitrixResult<()> {
        for (parent, current) in layers.walk() {
            if let Some(parent) = parent {
                wait_layer(self.tasks.as_ref(), parent, self.task_wait).await?;
            }
            self.dispatch_layer(job, current).await?;
            if current.is_leaf() {
                wait_layer(self.tasks.as_ref(), current, self.task_wait).await?;
            }
        }
        Ok(())
    }

    async fn dispatch_layer(&self, job: &Job, layer: LayerRef<'_>) -> PitrixResult<()> {
        for task in layer.tasks() {
            self.task_queue.enqueue(&task.task_id).await?;
            debug!(
                "任务 {} ({}) 已派发，目标 {}",
                task.task_id, task.task_action, task.target
            );
        }
        info!(
            "作业 {} 第 {} 层已派发 {} 个任务",
            job.job_id,
            layer.index(),
            layer.len()
        );
        Ok(())
    }
}

#[async_trait]
impl UnitHandler for JobController {
    fn kind(&self) -> &'static str {
        "job"
    }

    async fn handle(&self, job_id: String) {
        let started = Instant::now();
        self.claim(&job_id).await;

        let status = match AssertUnwindSafe(self.run(&job_id)).catch_unwind().await {
            Ok(Ok(())) => WorkStatus::Successful,
            Ok(Err(e)) if e.is_timeout() => {
                warn!("作业 {} 等待超时: {}", job_id, e);
                WorkStatus::Failed
            }
            Ok(Err(e)) => {
                error!("作业 {} 执行失败: {}", job_id, e);
                WorkStatus::Failed
            }
            Err(_) => {
                error!("作业 {} 处理过程中发生panic", job_id);
                WorkStatus::Failed
            }
        };

        self.finish(&job_id, status).await;
        metrics::counter!("pitrix_units_total", "kind" => "job", "status" => status.as_str())
            .increment(1);
        info!(
            "作业 {} 处理结束，状态 {}，耗时 {:?}",
            job_id,
            status,
            started.elapsed()
        );
    }
}
