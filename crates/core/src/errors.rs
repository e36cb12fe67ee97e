use std::time::Duration;

use thiserror::Error;

/// 编排核心统一错误类型
#[derive(Debug, Clone, Error)]
pub enum PitrixError {
    #[error("数据库操作失败: {0}")]
    DatabaseOperation(String),

    #[error("作业未找到: {id}")]
    JobNotFound { id: String },

    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },

    #[error("集群未找到: {id}")]
    ClusterNotFound { id: String },

    #[error("集群节点未找到: {id}")]
    ClusterNodeNotFound { id: String },

    #[error("工作队列错误: {0}")]
    Queue(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("远端执行失败: {what}: {reason}")]
    RemoteFailed { what: String, reason: String },

    #[error("等待超时: {what} (超时时间: {timeout:?})")]
    WaitTimeout { what: String, timeout: Duration },

    #[error("未注册的执行目标: {0}")]
    UnknownTarget(String),

    #[error("无效的指令: {0}")]
    InvalidDirective(String),

    #[error("不支持的动作: {0}")]
    UnsupportedAction(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

pub type PitrixResult<T> = std::result::Result<T, PitrixError>;

impl PitrixError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }

    pub fn queue_error<S: Into<String>>(msg: S) -> Self {
        Self::Queue(msg.into())
    }

    pub fn network_error<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_directive<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDirective(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound { id: id.into() }
    }

    pub fn task_not_found<S: Into<String>>(id: S) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    pub fn remote_failed<W: Into<String>, R: Into<String>>(what: W, reason: R) -> Self {
        Self::RemoteFailed {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn wait_timeout<W: Into<String>>(what: W, timeout: Duration) -> Self {
        Self::WaitTimeout {
            what: what.into(),
            timeout,
        }
    }

    /// 瞬时故障，轮询方可以继续重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PitrixError::DatabaseOperation(_) | PitrixError::Queue(_) | PitrixError::Network(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PitrixError::WaitTimeout { .. })
    }

    pub fn is_remote_failure(&self) -> bool {
        matches!(self, PitrixError::RemoteFailed { .. })
    }
}

impl From<serde_json::Error> for PitrixError {
    fn from(err: serde_json::Error) -> Self {
        PitrixError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for PitrixError {
    fn from(err: config::ConfigError) -> Self {
        PitrixError::Configuration(err.to_string())
    }
}

impl From<anyhow::Error> for PitrixError {
    fn from(err: anyhow::Error) -> Self {
        PitrixError::Internal(err.to_string())
    }
}
