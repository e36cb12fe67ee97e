use async_trait::async_trait;
use pitrix_core::config::EndpointConfig;
use pitrix_core::traits::PilotClient;
use pitrix_core::{PitrixError, PitrixResult, SubtaskMessage, WorkStatus};
use serde::Deserialize;
use tracing::info;

use super::JsonHttpClient;

#[derive(Debug, Deserialize)]
struct SubtaskStatusResponse {
    status: WorkStatus,
}

/// pilot服务的HTTP客户端
pub struct HttpPilotClient {
    client: JsonHttpClient,
}

impl HttpPilotClient {
    pub fn new(config: &EndpointConfig) -> PitrixResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| PitrixError::config_error("pilot.endpoint 未配置"))?;
        Ok(Self {
            client: JsonHttpClient::new(endpoint, config.request_timeout())?,
        })
    }
}

#[async_trait]
impl PilotClient for HttpPilotClient {
    async fn handle_subtask(&self, subtask: &SubtaskMessage) -> PitrixResult<()> {
        self.client.post_empty("/v1/subtasks", subtask).await?;
        info!(
            "Subtask {} ({}) submitted to pilot",
            subtask.subtask_id, subtask.action
        );
        Ok(())
    }

    async fn get_subtask_status(&self, subtask_id: &str) -> PitrixResult<WorkStatus> {
        let response: SubtaskStatusResponse = self
            .client
            .get(&format!("/v1/subtasks/{subtask_id}/status"))
            .await?;
        Ok(response.status)
    }
}
