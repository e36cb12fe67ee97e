pub mod action;
pub mod cluster;
pub mod directive;
pub mod job;
pub mod status;
pub mod task;

pub use action::{JobAction, TaskAction};
pub use cluster::{
    Cluster, ClusterModification, ClusterNode, ClusterNodeModification, ClusterType,
    ClusterWrapper,
};
pub use directive::{
    decode_directive, directive_changed, encode_directive, CmdDirective, InstanceDirective,
    MetadataDirective, NodeSelection, VolumeDirective,
};
pub use job::Job;
pub use status::WorkStatus;
pub use task::{SubtaskMessage, Task};

/// 生成带前缀的短ID，例如 `j-3f9a1c0b7d2e`
pub fn new_id(prefix: &str) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &raw[..12])
}
