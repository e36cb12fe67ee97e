//! 作业侧：作业控制器、作业处理器和提交客户端

pub mod client;
pub mod controller;
pub mod processor;
pub mod waiter;

pub use client::JobClient;
pub use controller::{JobController, JobControllerDeps};
pub use processor::JobProcessor;
