use async_trait::async_trait;

use crate::errors::{PitrixError, PitrixResult};
use crate::models::{ClusterModification, ClusterNode, ClusterNodeModification, ClusterWrapper};

/// 集群管理服务
#[async_trait]
pub trait ClusterManager: Send + Sync {
    async fn modify_cluster(&self, modification: &ClusterModification) -> PitrixResult<()>;

    async fn modify_cluster_node(&self, modification: &ClusterNodeModification)
        -> PitrixResult<()>;

    async fn get_cluster_nodes(&self, node_ids: &[String]) -> PitrixResult<Vec<ClusterNode>>;

    async fn get_cluster_wrappers(&self, cluster_ids: &[String])
        -> PitrixResult<Vec<ClusterWrapper>>;

    async fn get_cluster_node(&self, node_id: &str) -> PitrixResult<ClusterNode> {
        self.get_cluster_nodes(&[node_id.to_string()])
            .await?
            .into_iter()
            .find(|n| n.node_id == node_id)
            .ok_or_else(|| PitrixError::ClusterNodeNotFound {
                id: node_id.to_string(),
            })
    }

    async fn get_cluster_wrapper(&self, cluster_id: &str) -> PitrixResult<ClusterWrapper> {
        self.get_cluster_wrappers(&[cluster_id.to_string()])
            .await?
            .into_iter()
            .find(|w| w.cluster.cluster_id == cluster_id)
            .ok_or_else(|| PitrixError::ClusterNotFound {
                id: cluster_id.to_string(),
            })
    }
}
