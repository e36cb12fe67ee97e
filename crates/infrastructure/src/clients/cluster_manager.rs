use async_trait::async_trait;
use pitrix_core::config::EndpointConfig;
use pitrix_core::traits::ClusterManager;
use pitrix_core::{
    ClusterModification, ClusterNode, ClusterNodeModification, ClusterWrapper, PitrixError,
    PitrixResult,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::JsonHttpClient;

#[derive(Serialize)]
struct DescribeNodesRequest<'a> {
    node_ids: &'a [String],
}

#[derive(Deserialize)]
struct DescribeNodesResponse {
    #[serde(default)]
    nodes: Vec<ClusterNode>,
}

#[derive(Serialize)]
struct DescribeClustersRequest<'a> {
    cluster_ids: &'a [String],
}

#[derive(Deserialize)]
struct DescribeClustersResponse {
    #[serde(default)]
    clusters: Vec<ClusterWrapper>,
}

/// 集群管理服务的HTTP客户端
pub struct HttpClusterManager {
    client: JsonHttpClient,
}

impl HttpClusterManager {
    pub fn new(config: &EndpointConfig) -> PitrixResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| PitrixError::config_error("cluster_manager.endpoint 未配置"))?;
        Ok(Self {
            client: JsonHttpClient::new(endpoint, config.request_timeout())?,
        })
    }
}

#[async_trait]
impl ClusterManager for HttpClusterManager {
    async fn modify_cluster(&self, modification: &ClusterModification) -> PitrixResult<()> {
        debug!("Modifying cluster {}", modification.cluster_id);
        self.client
            .post_empty("/v1/clusters/modify", modification)
            .await
    }

    async fn modify_cluster_node(
        &self,
        modification: &ClusterNodeModification,
    ) -> PitrixResult<()> {
        debug!("Modifying cluster node {}", modification.node_id);
        self.client
            .post_empty("/v1/cluster_nodes/modify", modification)
            .await
    }

    async fn get_cluster_nodes(&self, node_ids: &[String]) -> PitrixResult<Vec<ClusterNode>> {
        let response: DescribeNodesResponse = self
            .client
            .post("/v1/cluster_nodes/describe", &DescribeNodesRequest { node_ids })
            .await?;
        Ok(response.nodes)
    }

    async fn get_cluster_wrappers(
        &self,
        cluster_ids: &[String],
    ) -> PitrixResult<Vec<ClusterWrapper>> {
        let response: DescribeClustersResponse = self
            .client
            .post("/v1/clusters/describe", &DescribeClustersRequest { cluster_ids })
            .await?;
        Ok(response.clusters)
    }
}
