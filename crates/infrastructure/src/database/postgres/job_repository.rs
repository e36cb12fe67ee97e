use async_trait::async_trait;
use chrono::Utc;
use pitrix_core::traits::JobRepository;
use pitrix_core::{Job, JobAction, PitrixError, PitrixResult, WorkStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use super::{db_error, decode_status};

const JOB_COLUMNS: &str = "job_id, cluster_id, app_id, version_id, job_action, directive, \
     provider, status, executor, owner, create_time, status_time";

pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &PgRow) -> Result<Job, sqlx::Error> {
        let job_action: String = row.try_get("job_action")?;
        let status: String = row.try_get("status")?;
        Ok(Job {
            job_id: row.try_get("job_id")?,
            cluster_id: row.try_get("cluster_id")?,
            app_id: row.try_get("app_id")?,
            version_id: row.try_get("version_id")?,
            job_action: JobAction::from(job_action),
            directive: row.try_get("directive")?,
            provider: row.try_get("provider")?,
            status: decode_status(&status)?,
            executor: row.try_get("executor")?,
            owner: row.try_get("owner")?,
            create_time: row.try_get("create_time")?,
            status_time: row.try_get("status_time")?,
        })
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.job_id, action = %job.job_action))]
    async fn create(&self, job: &Job) -> PitrixResult<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, cluster_id, app_id, version_id, job_action, directive,
                              provider, status, executor, owner, create_time, status_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.cluster_id)
        .bind(&job.app_id)
        .bind(&job.version_id)
        .bind(job.job_action.as_str())
        .bind(&job.directive)
        .bind(&job.provider)
        .bind(job.status.as_str())
        .bind(&job.executor)
        .bind(&job.owner)
        .bind(job.create_time)
        .bind(job.status_time)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!("Created job {}", job.job_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, job_id: &str) -> PitrixResult<Option<Job>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = $1");
        let row = sqlx::query(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref()
            .map(Self::row_to_job)
            .transpose()
            .map_err(db_error)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        job_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, status_time = $3, executor = COALESCE($4, executor)
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(executor)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(PitrixError::job_not_found(job_id));
        }
        Ok(())
    }
}
