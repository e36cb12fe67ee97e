use pitrix_core::constants::TARGET_PILOT;
use pitrix_core::{Cluster, ClusterNode, ClusterType, ClusterWrapper, Job, JobAction, Task, TaskAction};

/// 构造包含 `nodes` 个节点的集群，节点ID为 `cln-1`、`cln-2` ...
pub fn cluster_wrapper(cluster_id: &str, nodes: usize) -> ClusterWrapper {
    ClusterWrapper {
        cluster: Cluster {
            cluster_id: cluster_id.to_string(),
            name: format!("{cluster_id}-name"),
            app_id: "app-1".to_string(),
            version_id: "appv-1".to_string(),
            frontgate_id: "cl-frontgate".to_string(),
            cluster_type: ClusterType::Normal,
            status: "pending".to_string(),
            ..Default::default()
        },
        nodes: (1..=nodes)
            .map(|i| ClusterNode {
                node_id: format!("cln-{i}"),
                cluster_id: cluster_id.to_string(),
                name: format!("node-{i}"),
                role: if i == 1 { "master" } else { "slave" }.to_string(),
                image_id: "img-ubuntu".to_string(),
                cpu: 2,
                memory: 4096,
                private_ip: format!("10.0.0.{i}"),
                ..Default::default()
            })
            .collect(),
    }
}

/// 给每个节点配上数据盘
pub fn with_volumes(mut wrapper: ClusterWrapper, size: u32) -> ClusterWrapper {
    for node in &mut wrapper.nodes {
        node.volume_size = size;
    }
    wrapper
}

pub fn job(action: JobAction, cluster_id: &str, provider: &str) -> Job {
    Job::new(cluster_id, action, provider, "{}").with_owner("usr-test")
}

pub fn pilot_task(action: TaskAction, node_id: Option<&str>, directive: &str) -> Task {
    Task::new(action, TARGET_PILOT, node_id.map(str::to_string), directive)
}

pub fn provider_task(action: TaskAction, provider: &str, node_id: Option<&str>, directive: &str) -> Task {
    Task::new(action, provider, node_id.map(str::to_string), directive)
}
