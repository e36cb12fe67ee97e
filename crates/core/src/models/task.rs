use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, TaskAction, WorkStatus};
use crate::constants::TASK_ID_PREFIX;

/// 任务：作业拆分后的原子执行单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub job_id: String,
    /// 任务针对的集群节点，集群级任务为空
    pub node_id: Option<String>,
    pub task_action: TaskAction,
    /// 任务指令，JSON文本
    pub directive: String,
    /// 执行目标：`pilot` 或某个已注册的provider名称
    pub target: String,
    pub status: WorkStatus,
    pub executor: String,
    pub owner: String,
    pub create_time: DateTime<Utc>,
    pub status_time: DateTime<Utc>,
}

impl Task {
    pub fn new(
        task_action: TaskAction,
        target: impl Into<String>,
        node_id: Option<String>,
        directive: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: new_id(TASK_ID_PREFIX),
            job_id: String::new(),
            node_id,
            task_action,
            directive: directive.into(),
            target: target.into(),
            status: WorkStatus::Pending,
            executor: String::new(),
            owner: String::new(),
            create_time: now,
            status_time: now,
        }
    }
}

/// 发往pilot的子任务消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskMessage {
    pub subtask_id: String,
    pub action: String,
    pub directive: String,
}

impl SubtaskMessage {
    pub fn from_task(task: &Task) -> Self {
        Self {
            subtask_id: task.task_id.clone(),
            action: task.task_action.to_string(),
            directive: task.directive.clone(),
        }
    }
}
