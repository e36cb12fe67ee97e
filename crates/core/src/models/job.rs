use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_id, JobAction, WorkStatus};
use crate::constants::JOB_ID_PREFIX;

/// 作业：一次用户发起的集群级操作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub cluster_id: String,
    pub app_id: String,
    pub version_id: String,
    pub job_action: JobAction,
    /// 作业指令，JSON文本
    pub directive: String,
    /// 负责拆分作业的provider名称
    pub provider: String,
    pub status: WorkStatus,
    /// 当前处理该作业的主机
    pub executor: String,
    pub owner: String,
    pub create_time: DateTime<Utc>,
    pub status_time: DateTime<Utc>,
}

impl Job {
    pub fn new(
        cluster_id: impl Into<String>,
        job_action: JobAction,
        provider: impl Into<String>,
        directive: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: new_id(JOB_ID_PREFIX),
            cluster_id: cluster_id.into(),
            app_id: String::new(),
            version_id: String::new(),
            job_action,
            directive: directive.into(),
            provider: provider.into(),
            status: WorkStatus::Pending,
            executor: String::new(),
            owner: String::new(),
            create_time: now,
            status_time: now,
        }
    }

    pub fn with_app(mut self, app_id: impl Into<String>, version_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self.version_id = version_id.into();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }
}
