//! 作业动作与任务动作
//!
//! 动作集合是开放的：无法识别的名称保留在 `Unknown` 中，
//! 由各张转换表把它视为无操作。

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! open_action {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Unknown(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $text,)+
                    $name::Unknown(raw) => raw.as_str(),
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, $name::Unknown(_))
            }

            /// 全部已知动作，按声明顺序
            pub fn known() -> Vec<$name> {
                vec![$($name::$variant,)+]
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($text => $name::$variant,)+
                    _ => $name::Unknown(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(action: $name) -> Self {
                match action {
                    $name::Unknown(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

open_action! {
    /// 作业级别的集群动作
    JobAction {
        CreateCluster => "CreateCluster",
        UpgradeCluster => "UpgradeCluster",
        RollbackCluster => "RollbackCluster",
        ResizeCluster => "ResizeCluster",
        AddClusterNodes => "AddClusterNodes",
        DeleteClusterNodes => "DeleteClusterNodes",
        StopClusters => "StopClusters",
        StartClusters => "StartClusters",
        DeleteClusters => "DeleteClusters",
        RecoverClusters => "RecoverClusters",
        CeaseClusters => "CeaseClusters",
        UpdateClusterEnv => "UpdateClusterEnv",
    }
}

open_action! {
    /// 任务级别的原子动作
    TaskAction {
        RunInstances => "RunInstances",
        StartInstances => "StartInstances",
        StopInstances => "StopInstances",
        TerminateInstances => "TerminateInstances",
        ResizeInstances => "ResizeInstances",
        CreateVolumes => "CreateVolumes",
        AttachVolumes => "AttachVolumes",
        DetachVolumes => "DetachVolumes",
        DeleteVolumes => "DeleteVolumes",
        ResizeVolumes => "ResizeVolumes",
        FormatAndMountVolume => "FormatAndMountVolume",
        RegisterMetadata => "RegisterMetadata",
        DeregisterMetadata => "DeregisterMetadata",
        StartConfd => "StartConfd",
        StopConfd => "StopConfd",
        SetDroneConfig => "SetDroneConfig",
        PingDrone => "PingDrone",
        RunCommandOnDrone => "RunCommandOnDrone",
        RunCommandOnFrontgateNode => "RunCommandOnFrontgateNode",
    }
}
