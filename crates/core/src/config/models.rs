use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{DEFAULT_JOB_QUEUE, DEFAULT_TASK_QUEUE, TARGET_PILOT};
use crate::wait::WaitPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    pub redis_url: String,
    pub job_queue: String,
    pub task_queue: String,
    /// Redis队列为空时的轮询间隔
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            job_queue: DEFAULT_JOB_QUEUE.to_string(),
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            poll_interval_ms: 200,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == QueueBackend::Redis && self.redis_url.is_empty() {
            return Err(anyhow::anyhow!("Redis队列需要配置redis_url"));
        }
        if self.job_queue.is_empty() || self.task_queue.is_empty() {
            return Err(anyhow::anyhow!("队列名称不能为空"));
        }
        if self.job_queue == self.task_queue {
            return Err(anyhow::anyhow!(
                "作业队列和任务队列不能同名: {}",
                self.job_queue
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("队列轮询间隔必须大于0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Memory,
            url: "postgresql://localhost/pitrix".to_string(),
            max_connections: 10,
            connection_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == DatabaseBackend::Postgres {
            if self.url.is_empty() {
                return Err(anyhow::anyhow!("数据库URL不能为空"));
            }
            if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!("无效的数据库URL格式: {}", self.url));
            }
        }
        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }
        Ok(())
    }
}

/// 提取循环配置，作业控制器和任务控制器各一份
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_workers: usize,
    pub busy_backoff_seconds: u64,
    pub dequeue_backoff_seconds: u64,
    /// 关闭时等待在途单元的时间
    pub shutdown_grace_seconds: u64,
    /// 写入 executor 字段的主机名，缺省取本机hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::with_max_workers(20)
    }
}

impl ControllerConfig {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            busy_backoff_seconds: 10,
            dequeue_backoff_seconds: 3,
            shutdown_grace_seconds: 30,
            hostname: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("最大并发数必须大于0"));
        }
        if self.busy_backoff_seconds == 0 || self.dequeue_backoff_seconds == 0 {
            return Err(anyhow::anyhow!("退避时间必须大于0"));
        }
        Ok(())
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_secs(self.busy_backoff_seconds)
    }

    pub fn dequeue_backoff(&self) -> Duration {
        Duration::from_secs(self.dequeue_backoff_seconds)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    pub fn resolve_hostname(&self) -> String {
        if let Some(hostname) = self.hostname.as_ref().filter(|h| !h.is_empty()) {
            return hostname.clone();
        }
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %e, "failed to read hostname, falling back to localhost");
                "localhost".to_string()
            }
        }
    }
}

/// 三类等待的轮询间隔与超时，单位秒
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub subtask_interval_seconds: u64,
    pub subtask_timeout_seconds: u64,
    pub task_interval_seconds: u64,
    pub task_timeout_seconds: u64,
    pub job_interval_seconds: u64,
    pub job_timeout_seconds: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            subtask_interval_seconds: 3,
            subtask_timeout_seconds: 600,
            task_interval_seconds: 3,
            task_timeout_seconds: 3600,
            job_interval_seconds: 3,
            job_timeout_seconds: 7200,
        }
    }
}

impl WaitConfig {
    pub fn validate(&self) -> Result<()> {
        let pairs = [
            ("subtask", self.subtask_interval_seconds, self.subtask_timeout_seconds),
            ("task", self.task_interval_seconds, self.task_timeout_seconds),
            ("job", self.job_interval_seconds, self.job_timeout_seconds),
        ];
        for (what, interval, timeout) in pairs {
            if interval == 0 {
                return Err(anyhow::anyhow!("{what} 轮询间隔必须大于0"));
            }
            if timeout < interval {
                return Err(anyhow::anyhow!("{what} 超时时间不能小于轮询间隔"));
            }
        }
        Ok(())
    }

    pub fn subtask_policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.subtask_interval_seconds, self.subtask_timeout_seconds)
    }

    pub fn task_policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.task_interval_seconds, self.task_timeout_seconds)
    }

    pub fn job_policy(&self) -> WaitPolicy {
        WaitPolicy::from_secs(self.job_interval_seconds, self.job_timeout_seconds)
    }
}

/// 远端HTTP服务地址
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_seconds: 30,
        }
    }
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(anyhow::anyhow!("无效的服务地址: {endpoint}"));
            }
        }
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default = "default_provider_kind")]
    pub kind: String,
    pub endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_provider_kind() -> String {
    "vmbased".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(anyhow::anyhow!("provider名称不能为空"));
        }
        if self.name == TARGET_PILOT {
            return Err(anyhow::anyhow!("provider名称不能使用保留名称: {TARGET_PILOT}"));
        }
        if self.kind != "vmbased" {
            return Err(anyhow::anyhow!(
                "不支持的provider类型: {}，支持的类型: [\"vmbased\"]",
                self.kind
            ));
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(anyhow::anyhow!("无效的provider地址: {}", self.endpoint));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" 或 "pretty"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.level,
                valid_levels
            ));
        }
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志格式: {}，支持的格式: {:?}",
                self.format,
                valid_formats
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.listen_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(anyhow::anyhow!("无效的指标监听地址: {}", self.listen_address));
        }
        Ok(())
    }
}
