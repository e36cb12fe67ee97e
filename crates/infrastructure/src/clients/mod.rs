mod http;
pub mod cluster_manager;
pub mod pilot;

pub use cluster_manager::HttpClusterManager;
pub(crate) use http::JsonHttpClient;
pub use pilot::HttpPilotClient;
