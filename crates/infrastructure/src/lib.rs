//! 基础设施：工作队列、仓储、远端服务客户端和provider实现

pub mod clients;
pub mod database;
pub mod in_memory_queue;
pub mod providers;
pub mod queue_factory;
pub mod redis_queue;

pub use clients::{HttpClusterManager, HttpPilotClient};
pub use database::{InMemoryJobRepository, InMemoryTaskRepository, Repositories};
pub use in_memory_queue::InMemoryWorkQueue;
pub use providers::{register_providers, CloudApi, CloudResponse, VmBasedProvider};
pub use queue_factory::{WorkQueueFactory, WorkQueues};
pub use redis_queue::RedisWorkQueue;
