use std::time::Duration;

use async_trait::async_trait;
use pitrix_core::{PitrixResult, TaskAction, WorkStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clients::JsonHttpClient;

/// 云平台对一次资源操作的应答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResponse {
    pub status: WorkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// 需要合并回任务指令的字段，例如 instance_id、volume_id
    #[serde(default)]
    pub fields: Map<String, Value>,
}

/// 虚拟机云平台接口
#[async_trait]
pub trait CloudApi: Send + Sync {
    async fn submit(&self, action: &TaskAction, directive: &str) -> PitrixResult<CloudResponse>;

    async fn describe(&self, action: &TaskAction, directive: &str) -> PitrixResult<CloudResponse>;
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    action: &'a str,
    directive: &'a str,
}

pub struct HttpCloudApi {
    client: JsonHttpClient,
}

impl HttpCloudApi {
    pub fn new(endpoint: &str, request_timeout: Duration) -> PitrixResult<Self> {
        Ok(Self {
            client: JsonHttpClient::new(endpoint, request_timeout)?,
        })
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn submit(&self, action: &TaskAction, directive: &str) -> PitrixResult<CloudResponse> {
        let request = ActionRequest {
            action: action.as_str(),
            directive,
        };
        self.client.post("/v1/actions", &request).await
    }

    async fn describe(&self, action: &TaskAction, directive: &str) -> PitrixResult<CloudResponse> {
        let request = ActionRequest {
            action: action.as_str(),
            directive,
        };
        self.client.post("/v1/actions/describe", &request).await
    }
}
