//! 任务控制器
//!
//! 从任务队列取出任务，执行前置处理（改写指令），
//! 交给pilot或provider执行并等待结果，成功后把资源属性回写到节点。

pub mod controller;
pub mod executor;
pub mod processor;

pub use controller::{TaskController, TaskControllerDeps};
pub use executor::RemoteExecutor;
pub use processor::TaskProcessor;
