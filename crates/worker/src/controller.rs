use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use pitrix_core::traits::{ClusterManager, PilotClient, TaskRepository};
use pitrix_core::{
    directive_changed, PitrixError, PitrixResult, ProviderRegistry, Task, UnitHandler,
    WaitPolicy, WorkStatus,
};
use tracing::{error, info, warn};

use crate::executor::RemoteExecutor;
use crate::processor::TaskProcessor;

/// 任务控制器依赖的外部组件
#[derive(Clone)]
pub struct TaskControllerDeps {
    pub tasks: Arc<dyn TaskRepository>,
    pub pilot: Arc<dyn PilotClient>,
    pub providers: ProviderRegistry,
    pub cluster_manager: Arc<dyn ClusterManager>,
}

/// 任务控制器
///
/// 每个任务的处理流程：
/// 1. 标记为 working 并记录执行主机
/// 2. 加载任务，执行前置处理（过渡状态、指令改写）
/// 3. 交给远程执行方并等待完成
/// 4. 执行方解析出的字段写回任务指令，然后执行后置处理
/// 5. 写入最终状态
pub struct TaskController {
    tasks: Arc<dyn TaskRepository>,
    processor: TaskProcessor,
    executor: RemoteExecutor,
    hostname: String,
}

impl TaskController {
    pub fn new(deps: TaskControllerDeps, subtask_wait: WaitPolicy, hostname: impl Into<String>) -> Self {
        Self {
            processor: TaskProcessor::new(deps.cluster_manager, deps.tasks.clone()),
            executor: RemoteExecutor::new(deps.pilot, deps.providers, subtask_wait),
            tasks: deps.tasks,
            hostname: hostname.into(),
        }
    }

    async fn claim(&self, task_id: &str) {
        if let Err(e) = self
            .tasks
            .update_status(task_id, WorkStatus::Working, Some(&self.hostname))
            .await
        {
            warn!("标记任务 {} 为处理中失败: {}", task_id, e);
        }
    }

    async fn finish(&self, task_id: &str, status: WorkStatus) {
        if let Err(e) = self.tasks.update_status(task_id, status, None).await {
            error!("写入任务 {} 最终状态 {} 失败: {}", task_id, status, e);
        }
    }

    async fn run(&self, task_id: &str) -> PitrixResult<()> {
        let mut task = self
            .tasks
            .get_by_id(task_id)
            .await?
            .ok_or_else(|| PitrixError::task_not_found(task_id))?;

        info!(
            "开始处理任务 {}: 动作 {}，目标 {}",
            task.task_id, task.task_action, task.target
        );

        let result = self.process(&mut task).await;
        if result.is_err() {
            if let Err(e) = self.processor.on_failure(&task).await {
                warn!("任务 {} 收尾处理失败: {}", task.task_id, e);
            }
        }
        result
    }

    async fn process(&self, task: &mut Task) -> PitrixResult<()> {
        self.processor.pre(task).await?;

        let dispatched = task.directive.clone();
        self.executor.execute(task).await?;
        if directive_changed(&dispatched, &task.directive) {
            self.tasks
                .update_directive(&task.task_id, &task.task_action, &task.directive)
                .await?;
        }

        self.processor.post(task).await
    }
}

#[async_trait]
impl UnitHandler for TaskController {
    fn kind(&self) -> &'static str {
        "task"
    }

    async fn handle(&self, task_id: String) {
        let started = Instant::now();
        self.claim(&task_id).await;

        let status = match AssertUnwindSafe(self.run(&task_id)).catch_unwind().await {
            Ok(Ok(())) => WorkStatus::Successful,
            Ok(Err(e)) if e.is_timeout() => {
                warn!("任务 {} 等待超时: {}", task_id, e);
                WorkStatus::Failed
            }
            Ok(Err(e)) if e.is_remote_failure() => {
                error!("任务 {} 远程执行失败: {}", task_id, e);
                WorkStatus::Failed
            }
            Ok(Err(e)) => {
                error!("任务 {} 执行失败: {}", task_id, e);
                WorkStatus::Failed
            }
            Err(_) => {
                error!("任务 {} 处理过程中发生panic", task_id);
                WorkStatus::Failed
            }
        };

        self.finish(&task_id, status).await;
        metrics::counter!("pitrix_units_total", "kind" => "task", "status" => status.as_str())
            .increment(1);
        info!(
            "任务 {} 处理结束，状态 {}，耗时 {:?}",
            task_id,
            status,
            started.elapsed()
        );
    }
}
