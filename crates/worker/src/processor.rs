//! 任务的前置/后置处理
//!
//! 前置处理在派发前执行：写入节点过渡状态，并按改写表解析指令中
//! 派发时才能确定的字段。改写后的指令只有确实变化时才落库。
//! 后置处理把执行结果中的资源属性回写到节点记录，并写入节点稳定状态。

use std::sync::Arc;

use pitrix_core::constants::{DEFAULT_FILESYSTEM, DEFAULT_MOUNT_POINT, TRANSITION_CLEARED};
use pitrix_core::traits::{ClusterManager, TaskRepository};
use pitrix_core::transitions::{
    task_node_transition, task_rewrite, task_write_back, DirectiveRewrite, NodeWriteBack,
};
use pitrix_core::{
    decode_directive, directive_changed, encode_directive, ClusterNode,
    ClusterNodeModification, ClusterType, CmdDirective, InstanceDirective, MetadataDirective,
    PitrixError, PitrixResult, Task, TaskAction, VolumeDirective,
};
use tracing::{debug, info};

/// 格式化挂载命令的默认超时，秒
const MOUNT_COMMAND_TIMEOUT: u64 = 600;

pub struct TaskProcessor {
    cluster_manager: Arc<dyn ClusterManager>,
    tasks: Arc<dyn TaskRepository>,
}

impl TaskProcessor {
    pub fn new(cluster_manager: Arc<dyn ClusterManager>, tasks: Arc<dyn TaskRepository>) -> Self {
        Self {
            cluster_manager,
            tasks,
        }
    }

    /// 派发前处理，可能改写任务的动作和指令
    pub async fn pre(&self, task: &mut Task) -> PitrixResult<()> {
        if let (Some(node_id), Some(pair)) =
            (&task.node_id, task_node_transition(&task.task_action))
        {
            self.cluster_manager
                .modify_cluster_node(&ClusterNodeModification::transition(node_id, pair.pre))
                .await?;
            debug!("节点 {} 进入过渡状态 {}", node_id, pair.pre);
        }

        let Some(rewrite) = task_rewrite(&task.task_action) else {
            return Ok(());
        };

        let before_action = task.task_action.clone();
        let before_directive = task.directive.clone();
        self.rewrite(rewrite, task).await?;

        if task.task_action != before_action
            || directive_changed(&before_directive, &task.directive)
        {
            self.tasks
                .update_directive(&task.task_id, &task.task_action, &task.directive)
                .await?;
            info!(
                "任务 {} 指令已改写: {} -> {}",
                task.task_id, before_action, task.task_action
            );
        } else {
            debug!("任务 {} 指令无变化，跳过写入", task.task_id);
        }
        Ok(())
    }

    /// 执行成功后回写节点属性并写入稳定状态
    pub async fn post(&self, task: &Task) -> PitrixResult<()> {
        let write_back = task_write_back(&task.task_action);
        let transition = task_node_transition(&task.task_action);
        if write_back.is_none() && transition.is_none() {
            return Ok(());
        }
        let Some(node_id) = task.node_id.as_deref() else {
            if write_back.is_some() {
                return Err(missing_node(task));
            }
            return Ok(());
        };

        let mut modification = match transition {
            Some(pair) => ClusterNodeModification::settle(node_id, pair.post),
            None => ClusterNodeModification::new(node_id),
        };
        if let Some(write_back) = write_back {
            apply_write_back(write_back, task, &mut modification)?;
        }

        self.cluster_manager
            .modify_cluster_node(&modification)
            .await?;
        debug!("任务 {} 已回写节点 {}", task.task_id, node_id);
        Ok(())
    }

    /// 任务失败时清除节点过渡状态
    pub async fn on_failure(&self, task: &Task) -> PitrixResult<()> {
        if let (Some(node_id), Some(_)) =
            (&task.node_id, task_node_transition(&task.task_action))
        {
            self.cluster_manager
                .modify_cluster_node(&ClusterNodeModification::transition(
                    node_id,
                    TRANSITION_CLEARED,
                ))
                .await?;
        }
        Ok(())
    }

    async fn rewrite(&self, rewrite: DirectiveRewrite, task: &mut Task) -> PitrixResult<()> {
        match rewrite {
            DirectiveRewrite::InjectVolumeId => {
                let node = self.node_of(task).await?;
                let mut directive: InstanceDirective = decode_directive(&task.directive)?;
                if !node.volume_id.is_empty() {
                    directive.volume_id = node.volume_id;
                }
                task.directive = encode_directive(&directive)?;
            }
            DirectiveRewrite::FormatAndMount => {
                let node = self.node_of(task).await?;
                if node.device.is_empty() {
                    return Err(PitrixError::invalid_directive(format!(
                        "节点 {} 还没有挂载设备，无法格式化",
                        node.node_id
                    )));
                }
                let wrapper = self
                    .cluster_manager
                    .get_cluster_wrapper(&node.cluster_id)
                    .await?;

                let mut directive: CmdDirective = decode_directive(&task.directive)?;
                if directive.cluster_id.is_empty() {
                    directive.cluster_id = node.cluster_id.clone();
                }
                if directive.node_id.is_empty() {
                    directive.node_id = node.node_id.clone();
                }
                if directive.frontgate_id.is_empty() {
                    directive.frontgate_id = wrapper.cluster.frontgate_id.clone();
                }
                directive.command = mount_command(&node);
                directive.drone_ip = node.private_ip.clone();
                directive.timeout.get_or_insert(MOUNT_COMMAND_TIMEOUT);

                task.task_action = match wrapper.cluster.cluster_type {
                    ClusterType::Frontgate => TaskAction::RunCommandOnFrontgateNode,
                    ClusterType::Normal => TaskAction::RunCommandOnDrone,
                };
                task.directive = encode_directive(&directive)?;
            }
            DirectiveRewrite::EmbedMetadata => {
                let mut directive: MetadataDirective = decode_directive(&task.directive)?;
                if directive.cluster_id.is_empty() {
                    return Err(PitrixError::invalid_directive(format!(
                        "任务 {} 的元数据指令缺少集群ID",
                        task.task_id
                    )));
                }
                let wrapper = self
                    .cluster_manager
                    .get_cluster_wrapper(&directive.cluster_id)
                    .await?;
                if directive.frontgate_id.is_empty() {
                    directive.frontgate_id = wrapper.cluster.frontgate_id.clone();
                }
                directive.cnodes = Some(wrapper.metadata_tree());
                task.directive = encode_directive(&directive)?;
            }
            DirectiveRewrite::InjectDroneIp => {
                let node = self.node_of(task).await?;
                if node.private_ip.is_empty() {
                    return Err(PitrixError::invalid_directive(format!(
                        "节点 {} 没有内网地址，无法连接drone",
                        node.node_id
                    )));
                }
                let mut directive: CmdDirective = decode_directive(&task.directive)?;
                directive.drone_ip = node.private_ip;
                task.directive = encode_directive(&directive)?;
            }
        }
        Ok(())
    }

    async fn node_of(&self, task: &Task) -> PitrixResult<ClusterNode> {
        let node_id = task.node_id.as_deref().ok_or_else(|| missing_node(task))?;
        self.cluster_manager.get_cluster_node(node_id).await
    }
}

fn missing_node(task: &Task) -> PitrixError {
    PitrixError::invalid_directive(format!(
        "任务 {} ({}) 缺少节点ID",
        task.task_id, task.task_action
    ))
}

fn apply_write_back(
    write_back: NodeWriteBack,
    task: &Task,
    modification: &mut ClusterNodeModification,
) -> PitrixResult<()> {
    match write_back {
        NodeWriteBack::InstanceAttributes => {
            let directive: InstanceDirective = decode_directive(&task.directive)?;
            if directive.instance_id.is_empty() {
                return Err(PitrixError::invalid_directive(format!(
                    "任务 {} 执行完成但没有返回实例ID",
                    task.task_id
                )));
            }
            modification.instance_id = Some(directive.instance_id);
            modification.private_ip = non_empty(directive.private_ip);
            modification.device = non_empty(directive.device);
        }
        NodeWriteBack::VolumeId => {
            let directive: VolumeDirective = decode_directive(&task.directive)?;
            if directive.volume_id.is_empty() {
                return Err(PitrixError::invalid_directive(format!(
                    "任务 {} 执行完成但没有返回卷ID",
                    task.task_id
                )));
            }
            modification.volume_id = Some(directive.volume_id);
        }
        NodeWriteBack::Device => {
            let directive: VolumeDirective = decode_directive(&task.directive)?;
            if directive.device.is_empty() {
                return Err(PitrixError::invalid_directive(format!(
                    "任务 {} 执行完成但没有返回设备路径",
                    task.task_id
                )));
            }
            modification.device = Some(directive.device);
        }
    }
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// 已有文件系统时只挂载，不重新格式化
fn mount_command(node: &ClusterNode) -> String {
    let device = &node.device;
    let mount_point = or_default(&node.mount_point, DEFAULT_MOUNT_POINT);
    let file_system = or_default(&node.file_system, DEFAULT_FILESYSTEM);
    let options = or_default(&node.mount_options, "defaults");

    format!(
        "mkdir -p {mount_point} && \
         (blkid {device} || mkfs -t {file_system} {device}) && \
         (mountpoint -q {mount_point} || mount -t {file_system} -o {options} {device} {mount_point}) && \
         (grep -q '^{device} ' /etc/fstab || echo '{device} {mount_point} {file_system} {options} 0 2' >> /etc/fstab)"
    )
}
