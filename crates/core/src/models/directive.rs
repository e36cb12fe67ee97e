//! 类型化的指令结构
//!
//! 指令在存储层中是JSON文本。每种结构只声明编排层关心的字段，
//! 其余字段通过 `extra` 原样保留，解码再编码不会丢失任何键。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PitrixError, PitrixResult};

/// 实例类任务的指令：RunInstances / StartInstances / ResizeInstances 等
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceDirective {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 存储卷类任务的指令
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeDirective {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub volume_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 在节点上执行命令的指令，confd/drone 相关任务也使用这个结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdDirective {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub frontgate_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub drone_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    /// 命令超时，秒
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 元数据注册/注销指令
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDirective {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub frontgate_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cnodes: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// AddClusterNodes / DeleteClusterNodes 作业指令中的节点选择
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSelection {
    #[serde(default)]
    pub node_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// 解码指令文本，空文本视为空对象
pub fn decode_directive<T: DeserializeOwned>(raw: &str) -> PitrixResult<T> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw)
        .map_err(|e| PitrixError::invalid_directive(format!("指令解析失败: {e}")))
}

pub fn encode_directive<T: Serialize>(directive: &T) -> PitrixResult<String> {
    Ok(serde_json::to_string(directive)?)
}

/// 按JSON语义比较两份指令，忽略键顺序和空白
pub fn directive_changed(before: &str, after: &str) -> bool {
    let parse = |raw: &str| -> Option<Value> {
        let raw = if raw.trim().is_empty() { "{}" } else { raw };
        serde_json::from_str(raw).ok()
    };
    match (parse(before), parse(after)) {
        (Some(a), Some(b)) => a != b,
        _ => before != after,
    }
}
