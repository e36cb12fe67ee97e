pub mod memory;
pub mod postgres;

use std::sync::Arc;

use pitrix_core::config::{DatabaseBackend, DatabaseConfig};
use pitrix_core::traits::{JobRepository, TaskRepository};
use pitrix_core::PitrixResult;
use tracing::info;

pub use memory::{InMemoryJobRepository, InMemoryTaskRepository};
pub use postgres::{PostgresJobRepository, PostgresTaskRepository};

#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobRepository>,
    pub tasks: Arc<dyn TaskRepository>,
}

impl Repositories {
    pub async fn create(config: &DatabaseConfig) -> PitrixResult<Self> {
        match config.backend {
            DatabaseBackend::Memory => {
                info!("Using in-memory repositories");
                Ok(Self {
                    jobs: Arc::new(InMemoryJobRepository::new()),
                    tasks: Arc::new(InMemoryTaskRepository::new()),
                })
            }
            DatabaseBackend::Postgres => {
                let pool = postgres::connect(config).await?;
                postgres::migrate(&pool).await?;
                Ok(Self {
                    jobs: Arc::new(PostgresJobRepository::new(pool.clone())),
                    tasks: Arc::new(PostgresTaskRepository::new(pool)),
                })
            }
        }
    }
}
