//! 作业/任务编排核心
//!
//! 数据模型、转换表、任务分层、端口trait，以及控制器共用的提取循环。

pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod logging;
pub mod models;
pub mod registry;
pub mod task_layer;
pub mod traits;
pub mod transitions;
pub mod wait;

pub use controller::{Controller, ControllerSettings, UnitHandler};
pub use errors::{PitrixError, PitrixResult};
pub use models::*;
pub use registry::ProviderRegistry;
pub use task_layer::{LayerRef, TaskLayers};
pub use wait::{wait_for, PollStatus, WaitPolicy};
