//! 基于虚拟机的运行时provider
//!
//! 拆分作业时按动作生成任务层；执行目标为本provider的任务时，
//! 把资源操作提交给云平台并轮询结果，云平台返回的资源字段合并回任务指令。

mod cloud;
mod frame;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pitrix_core::traits::{ClusterManager, ProviderPlugin};
use pitrix_core::{
    decode_directive, encode_directive, wait_for, Job, PitrixError, PitrixResult, PollStatus,
    Task, TaskLayers, WaitPolicy, WorkStatus,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use cloud::{CloudApi, CloudResponse, HttpCloudApi};
use frame::Frame;

pub struct VmBasedProvider {
    name: String,
    cloud: Arc<dyn CloudApi>,
    cluster_manager: Arc<dyn ClusterManager>,
}

impl VmBasedProvider {
    pub fn new(
        name: impl Into<String>,
        cloud: Arc<dyn CloudApi>,
        cluster_manager: Arc<dyn ClusterManager>,
    ) -> Self {
        Self {
            name: name.into(),
            cloud,
            cluster_manager,
        }
    }
}

/// 把云平台返回的字段合并进指令，同名字段以云平台为准
fn merge_fields(directive: &str, fields: Map<String, Value>) -> PitrixResult<String> {
    if fields.is_empty() {
        return Ok(directive.to_string());
    }
    let mut merged: Map<String, Value> = decode_directive(directive)?;
    merged.extend(fields);
    encode_directive(&merged)
}

#[async_trait]
impl ProviderPlugin for VmBasedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn split_job_into_tasks(&self, job: &Job) -> PitrixResult<TaskLayers> {
        let wrapper = self
            .cluster_manager
            .get_cluster_wrapper(&job.cluster_id)
            .await?;
        let layers = Frame::new(job, &wrapper, &self.name).plan()?;
        info!(
            job_id = %job.job_id,
            action = %job.job_action,
            layers = layers.layer_count(),
            tasks = layers.task_count(),
            "job split into task layers"
        );
        Ok(layers)
    }

    async fn handle_subtask(&self, task: &mut Task) -> PitrixResult<()> {
        let response = self.cloud.submit(&task.task_action, &task.directive).await?;
        if response.status == WorkStatus::Failed {
            return Err(PitrixError::remote_failed(
                format!("{} {}", task.task_action, task.task_id),
                response.reason.unwrap_or_else(|| "submit rejected".to_string()),
            ));
        }
        task.directive = merge_fields(&task.directive, response.fields)?;
        debug!(task_id = %task.task_id, action = %task.task_action, "submitted to cloud");
        Ok(())
    }

    async fn wait_subtask(
        &self,
        task: &mut Task,
        timeout: Duration,
        interval: Duration,
    ) -> PitrixResult<()> {
        let what = format!("{} {}", task.task_action, task.task_id);
        let resolved: Mutex<Map<String, Value>> = Mutex::new(Map::new());
        {
            let cloud = &self.cloud;
            let action = &task.task_action;
            let directive = task.directive.as_str();
            let resolved = &resolved;
            wait_for(&what, WaitPolicy::new(interval, timeout), move || async move {
                let response = cloud.describe(action, directive).await?;
                resolved.lock().await.extend(response.fields);
                Ok::<_, PitrixError>(match response.status {
                    WorkStatus::Successful => PollStatus::Succeeded,
                    WorkStatus::Failed => PollStatus::Failed(
                        response
                            .reason
                            .unwrap_or_else(|| "cloud operation failed".to_string()),
                    ),
                    WorkStatus::Pending | WorkStatus::Working => PollStatus::Pending,
                })
            })
            .await?;
        }

        let fields = resolved.into_inner();
        task.directive = merge_fields(&task.directive, fields)?;
        Ok(())
    }
}
