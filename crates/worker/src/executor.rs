//! 远程执行适配
//!
//! 目标为 `pilot` 的任务作为子任务交给pilot，其余目标按名称解析provider插件。
//! 未注册的目标在派发前直接失败。

use std::sync::Arc;

use pitrix_core::constants::TARGET_PILOT;
use pitrix_core::traits::PilotClient;
use pitrix_core::{PitrixResult, ProviderRegistry, SubtaskMessage, Task, WaitPolicy};
use tracing::debug;

pub struct RemoteExecutor {
    pilot: Arc<dyn PilotClient>,
    providers: ProviderRegistry,
    policy: WaitPolicy,
}

impl RemoteExecutor {
    pub fn new(pilot: Arc<dyn PilotClient>, providers: ProviderRegistry, policy: WaitPolicy) -> Self {
        Self {
            pilot,
            providers,
            policy,
        }
    }

    /// 派发任务并等待其完成
    ///
    /// provider在执行过程中可能把解析出的资源属性合并进 `task.directive`。
    pub async fn execute(&self, task: &mut Task) -> PitrixResult<()> {
        if task.target == TARGET_PILOT {
            let subtask = SubtaskMessage::from_task(task);
            self.pilot.handle_subtask(&subtask).await?;
            debug!(task_id = %task.task_id, "subtask handed to pilot");
            return self
                .pilot
                .wait_subtask(&subtask.subtask_id, self.policy.timeout, self.policy.interval)
                .await;
        }

        let provider = self.providers.resolve(&task.target).await?;
        provider.handle_subtask(task).await?;
        debug!(task_id = %task.task_id, target = %task.target, "subtask handed to provider");
        provider
            .wait_subtask(task, self.policy.timeout, self.policy.interval)
            .await
    }
}
