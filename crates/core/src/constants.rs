//! 编排核心共享常量

/// 由pilot执行的任务目标
pub const TARGET_PILOT: &str = "pilot";

pub const JOB_ID_PREFIX: &str = "j-";
pub const TASK_ID_PREFIX: &str = "t-";

pub const DEFAULT_JOB_QUEUE: &str = "pitrix:job";
pub const DEFAULT_TASK_QUEUE: &str = "pitrix:task";

/// 环境变量前缀，例如 `PITRIX__QUEUE__BACKEND=redis`
pub const ENV_PREFIX: &str = "PITRIX";
pub const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "config/pitrix.toml",
    "pitrix.toml",
    "/etc/pitrix/pitrix.toml",
];

// 集群与节点的稳定状态
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_DELETED: &str = "deleted";
pub const STATUS_CEASED: &str = "ceased";

// 集群与节点的过渡状态
pub const TRANSITION_CREATING: &str = "creating";
pub const TRANSITION_UPGRADING: &str = "upgrading";
pub const TRANSITION_ROLLBACKING: &str = "rollbacking";
pub const TRANSITION_RESIZING: &str = "resizing";
pub const TRANSITION_SCALING: &str = "scaling";
pub const TRANSITION_STOPPING: &str = "stopping";
pub const TRANSITION_STARTING: &str = "starting";
pub const TRANSITION_DELETING: &str = "deleting";
pub const TRANSITION_RECOVERING: &str = "recovering";
pub const TRANSITION_CEASING: &str = "ceasing";
pub const TRANSITION_UPDATING: &str = "updating";

/// 清除过渡状态时写入的值
pub const TRANSITION_CLEARED: &str = "";

pub const DEFAULT_MOUNT_POINT: &str = "/data";
pub const DEFAULT_FILESYSTEM: &str = "ext4";
