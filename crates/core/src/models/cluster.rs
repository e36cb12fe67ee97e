use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterType {
    #[default]
    Normal,
    /// 网关集群，节点可被pilot直接访问
    Frontgate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub cluster_id: String,
    pub name: String,
    pub app_id: String,
    pub version_id: String,
    pub frontgate_id: String,
    pub cluster_type: ClusterType,
    pub status: String,
    pub transition_status: String,
    /// 应用环境变量，注册元数据时一并下发
    pub env: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterNode {
    pub node_id: String,
    pub cluster_id: String,
    pub name: String,
    pub role: String,
    pub image_id: String,
    pub cpu: u32,
    pub memory: u32,
    /// 数据盘大小，GB，0 表示没有数据盘
    pub volume_size: u32,
    pub instance_id: String,
    pub volume_id: String,
    pub device: String,
    pub mount_point: String,
    pub mount_options: String,
    pub file_system: String,
    pub private_ip: String,
    pub status: String,
    pub transition_status: String,
}

impl ClusterNode {
    pub fn has_volume(&self) -> bool {
        self.volume_size > 0
    }
}

/// 集群及其全部节点
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterWrapper {
    pub cluster: Cluster,
    #[serde(default)]
    pub nodes: Vec<ClusterNode>,
}

impl ClusterWrapper {
    pub fn node(&self, node_id: &str) -> Option<&ClusterNode> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// 按ID选取节点，未知ID会被跳过
    pub fn select_nodes(&self, node_ids: &[String]) -> Vec<&ClusterNode> {
        node_ids.iter().filter_map(|id| self.node(id)).collect()
    }

    /// 下发给confd的元数据树：
    /// `{"cluster": {...}, "env": {...}, "hosts": {role: {node_id: {...}}}}`
    pub fn metadata_tree(&self) -> Value {
        let mut hosts: Map<String, Value> = Map::new();
        for node in &self.nodes {
            let role = if node.role.is_empty() {
                "default".to_string()
            } else {
                node.role.clone()
            };
            let entry = hosts
                .entry(role)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(role_hosts) = entry {
                role_hosts.insert(
                    node.node_id.clone(),
                    json!({
                        "node_id": node.node_id,
                        "instance_id": node.instance_id,
                        "ip": node.private_ip,
                        "cpu": node.cpu,
                        "memory": node.memory,
                        "volume_size": node.volume_size,
                    }),
                );
            }
        }

        json!({
            "cluster": {
                "cluster_id": self.cluster.cluster_id,
                "app_id": self.cluster.app_id,
                "version_id": self.cluster.version_id,
                "frontgate_id": self.cluster.frontgate_id,
            },
            "env": Value::Object(self.cluster.env.clone()),
            "hosts": Value::Object(hosts),
        })
    }
}

/// 对集群记录的部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterModification {
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_status: Option<String>,
}

impl ClusterModification {
    pub fn transition(cluster_id: impl Into<String>, transition: &str) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            status: None,
            transition_status: Some(transition.to_string()),
        }
    }

    /// 写入稳定状态并清除过渡状态
    pub fn settle(cluster_id: impl Into<String>, status: &str) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            status: Some(status.to_string()),
            transition_status: Some(crate::constants::TRANSITION_CLEARED.to_string()),
        }
    }

    pub fn apply_to(&self, cluster: &mut Cluster) {
        if let Some(status) = &self.status {
            cluster.status = status.clone();
        }
        if let Some(transition) = &self.transition_status {
            cluster.transition_status = transition.clone();
        }
    }
}

/// 对集群节点记录的部分更新
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterNodeModification {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl ClusterNodeModification {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }

    pub fn transition(node_id: impl Into<String>, transition: &str) -> Self {
        Self {
            transition_status: Some(transition.to_string()),
            ..Self::new(node_id)
        }
    }

    pub fn settle(node_id: impl Into<String>, status: &str) -> Self {
        Self {
            status: Some(status.to_string()),
            transition_status: Some(crate::constants::TRANSITION_CLEARED.to_string()),
            ..Self::new(node_id)
        }
    }

    pub fn apply_to(&self, node: &mut ClusterNode) {
        let fields = [
            (&self.status, &mut node.status),
            (&self.transition_status, &mut node.transition_status),
            (&self.instance_id, &mut node.instance_id),
            (&self.volume_id, &mut node.volume_id),
            (&self.private_ip, &mut node.private_ip),
            (&self.device, &mut node.device),
        ];
        for (update, field) in fields {
            if let Some(value) = update {
                *field = value.clone();
            }
        }
    }
}
