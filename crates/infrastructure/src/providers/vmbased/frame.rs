//! 作业拆分计划
//!
//! 每种作业动作对应一串有序的任务层，空层会被跳过。

use pitrix_core::constants::TARGET_PILOT;
use pitrix_core::{
    decode_directive, encode_directive, ClusterNode, ClusterWrapper, CmdDirective,
    InstanceDirective, Job, JobAction, MetadataDirective, NodeSelection, PitrixError,
    PitrixResult, Task, TaskAction, TaskLayers, VolumeDirective,
};

/// 格式化挂载等节点命令的默认超时，秒
const NODE_COMMAND_TIMEOUT: u64 = 600;

pub(crate) struct Frame<'a> {
    job: &'a Job,
    wrapper: &'a ClusterWrapper,
    provider: &'a str,
}

impl<'a> Frame<'a> {
    pub fn new(job: &'a Job, wrapper: &'a ClusterWrapper, provider: &'a str) -> Self {
        Self {
            job,
            wrapper,
            provider,
        }
    }

    pub fn plan(&self) -> PitrixResult<TaskLayers> {
        let mut layers = TaskLayers::new();
        let mut push = |tasks: Vec<Task>| {
            if !tasks.is_empty() {
                layers.push_layer(tasks);
            }
        };

        match &self.job.job_action {
            JobAction::CreateCluster => {
                let nodes = self.all_nodes();
                push(self.create_volumes(&nodes)?);
                push(self.run_instances(&nodes)?);
                push(self.format_and_mount(&nodes)?);
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
                push(self.confd(&nodes, TaskAction::StartConfd)?);
            }
            JobAction::AddClusterNodes => {
                let nodes = self.selected_nodes()?;
                push(self.create_volumes(&nodes)?);
                push(self.run_instances(&nodes)?);
                push(self.format_and_mount(&nodes)?);
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
                push(self.confd(&nodes, TaskAction::StartConfd)?);
            }
            JobAction::DeleteClusterNodes => {
                let nodes = self.selected_nodes()?;
                push(self.confd(&nodes, TaskAction::StopConfd)?);
                push(self.instances(&nodes, TaskAction::TerminateInstances)?);
                push(self.volumes(&nodes, TaskAction::DeleteVolumes)?);
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
            }
            JobAction::StartClusters | JobAction::RecoverClusters => {
                let nodes = self.all_nodes();
                push(self.instances(&nodes, TaskAction::StartInstances)?);
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
                push(self.confd(&nodes, TaskAction::StartConfd)?);
            }
            JobAction::StopClusters => {
                let nodes = self.all_nodes();
                push(self.confd(&nodes, TaskAction::StopConfd)?);
                push(self.instances(&nodes, TaskAction::StopInstances)?);
            }
            JobAction::DeleteClusters => {
                let nodes = self.all_nodes();
                push(self.confd(&nodes, TaskAction::StopConfd)?);
                push(self.instances(&nodes, TaskAction::TerminateInstances)?);
                push(self.volumes(&nodes, TaskAction::DeleteVolumes)?);
                push(vec![self.metadata(TaskAction::DeregisterMetadata)?]);
            }
            JobAction::CeaseClusters => {
                let nodes = self.all_nodes();
                push(self.instances(&nodes, TaskAction::TerminateInstances)?);
                push(self.volumes(&nodes, TaskAction::DeleteVolumes)?);
                push(vec![self.metadata(TaskAction::DeregisterMetadata)?]);
            }
            JobAction::ResizeCluster => {
                let nodes = self.all_nodes();
                push(self.confd(&nodes, TaskAction::StopConfd)?);
                push(self.instances(&nodes, TaskAction::StopInstances)?);
                let mut resize = self.instances(&nodes, TaskAction::ResizeInstances)?;
                resize.extend(self.volumes(&nodes, TaskAction::ResizeVolumes)?);
                push(resize);
                push(self.instances(&nodes, TaskAction::StartInstances)?);
                push(self.confd(&nodes, TaskAction::StartConfd)?);
            }
            JobAction::UpgradeCluster | JobAction::RollbackCluster => {
                let nodes = self.all_nodes();
                push(self.confd(&nodes, TaskAction::StopConfd)?);
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
                push(self.confd(&nodes, TaskAction::StartConfd)?);
            }
            JobAction::UpdateClusterEnv => {
                push(vec![self.metadata(TaskAction::RegisterMetadata)?]);
            }
            JobAction::Unknown(raw) => {
                return Err(PitrixError::UnsupportedAction(raw.clone()));
            }
        }

        Ok(layers)
    }

    fn all_nodes(&self) -> Vec<&'a ClusterNode> {
        self.wrapper.nodes.iter().collect()
    }

    fn selected_nodes(&self) -> PitrixResult<Vec<&'a ClusterNode>> {
        let selection: NodeSelection = decode_directive(&self.job.directive)?;
        let nodes = self.wrapper.select_nodes(&selection.node_ids);
        if nodes.is_empty() {
            return Err(PitrixError::invalid_directive(format!(
                "作业 {} 没有选中任何节点",
                self.job.job_id
            )));
        }
        Ok(nodes)
    }

    fn cluster_id(&self) -> String {
        self.wrapper.cluster.cluster_id.clone()
    }

    fn frontgate_id(&self) -> String {
        self.wrapper.cluster.frontgate_id.clone()
    }

    fn node_task<D: serde::Serialize>(
        &self,
        action: TaskAction,
        target: &str,
        node: &ClusterNode,
        directive: &D,
    ) -> PitrixResult<Task> {
        Ok(Task::new(
            action,
            target,
            Some(node.node_id.clone()),
            encode_directive(directive)?,
        ))
    }

    fn create_volumes(&self, nodes: &[&ClusterNode]) -> PitrixResult<Vec<Task>> {
        nodes
            .iter()
            .filter(|n| n.has_volume())
            .map(|node| {
                let directive = VolumeDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    size: Some(node.volume_size),
                    ..Default::default()
                };
                self.node_task(TaskAction::CreateVolumes, self.provider, node, &directive)
            })
            .collect()
    }

    fn run_instances(&self, nodes: &[&ClusterNode]) -> PitrixResult<Vec<Task>> {
        nodes
            .iter()
            .map(|node| {
                let directive = InstanceDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    role: node.role.clone(),
                    image_id: node.image_id.clone(),
                    cpu: Some(node.cpu),
                    memory: Some(node.memory),
                    ..Default::default()
                };
                self.node_task(TaskAction::RunInstances, self.provider, node, &directive)
            })
            .collect()
    }

    fn instances(&self, nodes: &[&ClusterNode], action: TaskAction) -> PitrixResult<Vec<Task>> {
        let resize = action == TaskAction::ResizeInstances;
        nodes
            .iter()
            .map(|node| {
                let directive = InstanceDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    instance_id: node.instance_id.clone(),
                    cpu: resize.then_some(node.cpu),
                    memory: resize.then_some(node.memory),
                    ..Default::default()
                };
                self.node_task(action.clone(), self.provider, node, &directive)
            })
            .collect()
    }

    fn volumes(&self, nodes: &[&ClusterNode], action: TaskAction) -> PitrixResult<Vec<Task>> {
        let resize = action == TaskAction::ResizeVolumes;
        nodes
            .iter()
            .filter(|n| n.has_volume())
            .map(|node| {
                let directive = VolumeDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    volume_id: node.volume_id.clone(),
                    instance_id: node.instance_id.clone(),
                    size: resize.then_some(node.volume_size),
                    ..Default::default()
                };
                self.node_task(action.clone(), self.provider, node, &directive)
            })
            .collect()
    }

    fn format_and_mount(&self, nodes: &[&ClusterNode]) -> PitrixResult<Vec<Task>> {
        nodes
            .iter()
            .filter(|n| n.has_volume())
            .map(|node| {
                let directive = CmdDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    frontgate_id: self.frontgate_id(),
                    timeout: Some(NODE_COMMAND_TIMEOUT),
                    ..Default::default()
                };
                self.node_task(TaskAction::FormatAndMountVolume, TARGET_PILOT, node, &directive)
            })
            .collect()
    }

    fn confd(&self, nodes: &[&ClusterNode], action: TaskAction) -> PitrixResult<Vec<Task>> {
        nodes
            .iter()
            .map(|node| {
                let directive = CmdDirective {
                    cluster_id: self.cluster_id(),
                    node_id: node.node_id.clone(),
                    frontgate_id: self.frontgate_id(),
                    ..Default::default()
                };
                self.node_task(action.clone(), TARGET_PILOT, node, &directive)
            })
            .collect()
    }

    fn metadata(&self, action: TaskAction) -> PitrixResult<Task> {
        let directive = MetadataDirective {
            cluster_id: self.cluster_id(),
            frontgate_id: self.frontgate_id(),
            ..Default::default()
        };
        Ok(Task::new(
            action,
            TARGET_PILOT,
            None,
            encode_directive(&directive)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitrix_core::Cluster;

    fn node(id: &str, volume_size: u32) -> ClusterNode {
        ClusterNode {
            node_id: id.to_string(),
            cluster_id: "cl-1".to_string(),
            role: "master".to_string(),
            instance_id: format!("i-{id}"),
            volume_id: if volume_size > 0 { format!("vol-{id}") } else { String::new() },
            volume_size,
            ..Default::default()
        }
    }

    fn wrapper() -> ClusterWrapper {
        ClusterWrapper {
            cluster: Cluster {
                cluster_id: "cl-1".to_string(),
                frontgate_id: "cl-fg".to_string(),
                ..Default::default()
            },
            nodes: vec![node("cln-1", 20), node("cln-2", 0)],
        }
    }

    fn plan(action: JobAction, directive: &str) -> PitrixResult<TaskLayers> {
        let job = Job::new("cl-1", action, "vmbased", directive);
        Frame::new(&job, &wrapper(), "vmbased").plan()
    }

    fn actions(layers: &TaskLayers) -> Vec<Vec<String>> {
        layers
            .walk()
            .map(|(_, layer)| layer.tasks().map(|t| t.task_action.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_create_cluster_layers_in_order() {
        let layers = plan(JobAction::CreateCluster, "{}").unwrap();
        assert_eq!(
            actions(&layers),
            vec![
                vec!["CreateVolumes"],
                vec!["RunInstances", "RunInstances"],
                vec!["FormatAndMountVolume"],
                vec!["RegisterMetadata"],
                vec!["StartConfd", "StartConfd"],
            ]
        );

        let volume_task = &layers.tasks()[0];
        assert_eq!(volume_task.target, "vmbased");
        assert_eq!(volume_task.node_id.as_deref(), Some("cln-1"));
        let confd = layers.leaf().unwrap();
        assert!(confd.tasks().all(|t| t.target == TARGET_PILOT));
    }

    #[test]
    fn test_volume_layers_are_skipped_without_data_disks() {
        let job = Job::new("cl-1", JobAction::CreateCluster, "vmbased", "{}");
        let mut wrapper = wrapper();
        wrapper.nodes.iter_mut().for_each(|n| n.volume_size = 0);

        let layers = Frame::new(&job, &wrapper, "vmbased").plan().unwrap();
        assert_eq!(
            actions(&layers),
            vec![
                vec!["RunInstances", "RunInstances"],
                vec!["RegisterMetadata"],
                vec!["StartConfd", "StartConfd"],
            ]
        );
    }

    #[test]
    fn test_delete_cluster_terminates_and_releases_volumes() {
        let layers = plan(JobAction::DeleteClusters, "{}").unwrap();
        assert_eq!(
            actions(&layers),
            vec![
                vec!["StopConfd", "StopConfd"],
                vec!["TerminateInstances", "TerminateInstances"],
                vec!["DeleteVolumes"],
                vec!["DeregisterMetadata"],
            ]
        );

        let delete_volume = layers.layer(2).unwrap().tasks().next().unwrap();
        let directive: VolumeDirective = decode_directive(&delete_volume.directive).unwrap();
        assert_eq!(directive.volume_id, "vol-cln-1");
    }

    #[test]
    fn test_stop_cluster_keeps_instances() {
        let layers = plan(JobAction::StopClusters, "{}").unwrap();
        assert_eq!(
            actions(&layers),
            vec![vec!["StopConfd", "StopConfd"], vec!["StopInstances", "StopInstances"]]
        );
    }

    #[test]
    fn test_add_nodes_only_touches_selected_nodes() {
        let layers = plan(JobAction::AddClusterNodes, r#"{"node_ids":["cln-2"]}"#).unwrap();
        assert_eq!(
            actions(&layers),
            vec![vec!["RunInstances"], vec!["RegisterMetadata"], vec!["StartConfd"]]
        );
        assert!(layers
            .tasks()
            .iter()
            .filter_map(|t| t.node_id.as_deref())
            .all(|id| id == "cln-2"));
    }

    #[test]
    fn test_delete_nodes_requires_a_known_node() {
        let err = plan(JobAction::DeleteClusterNodes, r#"{"node_ids":["cln-9"]}"#).unwrap_err();
        assert!(matches!(err, PitrixError::InvalidDirective(_)));
    }

    #[test]
    fn test_unknown_action_is_unsupported() {
        let err = plan(JobAction::from("Hibernate"), "{}").unwrap_err();
        assert!(matches!(err, PitrixError::UnsupportedAction(raw) if raw == "Hibernate"));
    }
}
