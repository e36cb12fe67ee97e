//! 动作转换表
//!
//! 作业和任务处理器在执行前后查表决定要做什么。
//! 表中没有的动作在对应阶段是无操作。

use crate::constants::*;
use crate::models::{JobAction, TaskAction};

/// 执行前写入的过渡状态，以及成功后写入的稳定状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPair {
    pub pre: &'static str,
    pub post: &'static str,
}

const fn pair(pre: &'static str, post: &'static str) -> TransitionPair {
    TransitionPair { pre, post }
}

pub fn job_transition(action: &JobAction) -> Option<TransitionPair> {
    let transition = match action {
        JobAction::CreateCluster => pair(TRANSITION_CREATING, STATUS_ACTIVE),
        JobAction::UpgradeCluster => pair(TRANSITION_UPGRADING, STATUS_ACTIVE),
        JobAction::RollbackCluster => pair(TRANSITION_ROLLBACKING, STATUS_ACTIVE),
        JobAction::ResizeCluster => pair(TRANSITION_RESIZING, STATUS_ACTIVE),
        JobAction::AddClusterNodes | JobAction::DeleteClusterNodes => {
            pair(TRANSITION_SCALING, STATUS_ACTIVE)
        }
        JobAction::StopClusters => pair(TRANSITION_STOPPING, STATUS_STOPPED),
        JobAction::StartClusters => pair(TRANSITION_STARTING, STATUS_ACTIVE),
        JobAction::DeleteClusters => pair(TRANSITION_DELETING, STATUS_DELETED),
        JobAction::RecoverClusters => pair(TRANSITION_RECOVERING, STATUS_ACTIVE),
        JobAction::CeaseClusters => pair(TRANSITION_CEASING, STATUS_CEASED),
        JobAction::UpdateClusterEnv => pair(TRANSITION_UPDATING, STATUS_ACTIVE),
        JobAction::Unknown(_) => return None,
    };
    Some(transition)
}

/// 仅对带节点ID的任务生效
pub fn task_node_transition(action: &TaskAction) -> Option<TransitionPair> {
    match action {
        TaskAction::RunInstances => Some(pair(TRANSITION_CREATING, STATUS_ACTIVE)),
        TaskAction::StartInstances => Some(pair(TRANSITION_STARTING, STATUS_ACTIVE)),
        TaskAction::StopInstances => Some(pair(TRANSITION_STOPPING, STATUS_STOPPED)),
        TaskAction::TerminateInstances => Some(pair(TRANSITION_DELETING, STATUS_DELETED)),
        TaskAction::ResizeInstances => Some(pair(TRANSITION_RESIZING, STATUS_ACTIVE)),
        _ => None,
    }
}

/// 任务执行前对指令的改写
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveRewrite {
    /// 注入节点已绑定的卷ID
    InjectVolumeId,
    /// 生成格式化挂载命令，并改写为在节点上执行命令的动作
    FormatAndMount,
    /// 嵌入集群元数据树
    EmbedMetadata,
    /// 注入节点上drone的地址
    InjectDroneIp,
}

pub fn task_rewrite(action: &TaskAction) -> Option<DirectiveRewrite> {
    match action {
        TaskAction::RunInstances => Some(DirectiveRewrite::InjectVolumeId),
        TaskAction::FormatAndMountVolume => Some(DirectiveRewrite::FormatAndMount),
        TaskAction::RegisterMetadata | TaskAction::DeregisterMetadata => {
            Some(DirectiveRewrite::EmbedMetadata)
        }
        TaskAction::StartConfd
        | TaskAction::StopConfd
        | TaskAction::SetDroneConfig
        | TaskAction::PingDrone => Some(DirectiveRewrite::InjectDroneIp),
        _ => None,
    }
}

/// 任务成功后从指令回写到节点记录的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeWriteBack {
    /// instance_id、private_ip、device
    InstanceAttributes,
    VolumeId,
    Device,
}

pub fn task_write_back(action: &TaskAction) -> Option<NodeWriteBack> {
    match action {
        TaskAction::RunInstances => Some(NodeWriteBack::InstanceAttributes),
        TaskAction::CreateVolumes => Some(NodeWriteBack::VolumeId),
        TaskAction::AttachVolumes => Some(NodeWriteBack::Device),
        _ => None,
    }
}
