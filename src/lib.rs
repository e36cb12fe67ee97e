pub mod app;
pub mod shutdown;

pub use app::{connect_job_client, init_metrics, AppMode, Application, Backends};
pub use shutdown::{wait_for_signal, ShutdownManager};
