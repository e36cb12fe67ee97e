mod job_repository;
mod task_repository;

use std::time::Duration;

use pitrix_core::config::DatabaseConfig;
use pitrix_core::{PitrixError, PitrixResult, WorkStatus};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use job_repository::PostgresJobRepository;
pub use task_repository::PostgresTaskRepository;

pub async fn connect(config: &DatabaseConfig) -> PitrixResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
        .connect(&config.url)
        .await
        .map_err(db_error)?;
    info!(max_connections = config.max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> PitrixResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| PitrixError::database_error(format!("数据库迁移失败: {e}")))?;
    Ok(())
}

pub(crate) fn db_error(e: sqlx::Error) -> PitrixError {
    PitrixError::database_error(e.to_string())
}

pub(crate) fn decode_status(raw: &str) -> Result<WorkStatus, sqlx::Error> {
    raw.parse::<WorkStatus>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
