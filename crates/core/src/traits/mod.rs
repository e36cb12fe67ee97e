pub mod cluster;
pub mod pilot;
pub mod provider;
pub mod queue;
pub mod repository;

pub use cluster::ClusterManager;
pub use pilot::PilotClient;
pub use provider::ProviderPlugin;
pub use queue::WorkQueue;
pub use repository::{JobRepository, TaskRepository};
