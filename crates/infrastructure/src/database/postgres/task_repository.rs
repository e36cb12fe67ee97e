use async_trait::async_trait;
use chrono::Utc;
use pitrix_core::traits::TaskRepository;
use pitrix_core::{PitrixError, PitrixResult, Task, TaskAction, WorkStatus};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use super::{db_error, decode_status};

const TASK_COLUMNS: &str = "task_id, job_id, node_id, task_action, directive, target, \
     status, executor, owner, create_time, status_time";

pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &PgRow) -> Result<Task, sqlx::Error> {
        let task_action: String = row.try_get("task_action")?;
        let status: String = row.try_get("status")?;
        Ok(Task {
            task_id: row.try_get("task_id")?,
            job_id: row.try_get("job_id")?,
            node_id: row.try_get("node_id")?,
            task_action: TaskAction::from(task_action),
            directive: row.try_get("directive")?,
            target: row.try_get("target")?,
            status: decode_status(&status)?,
            executor: row.try_get("executor")?,
            owner: row.try_get("owner")?,
            create_time: row.try_get("create_time")?,
            status_time: row.try_get("status_time")?,
        })
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    #[instrument(skip(self, task), fields(task_id = %task.task_id, action = %task.task_action))]
    async fn create(&self, task: &Task) -> PitrixResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (task_id, job_id, node_id, task_action, directive, target,
                               status, executor, owner, create_time, status_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.job_id)
        .bind(&task.node_id)
        .bind(task.task_action.as_str())
        .bind(&task.directive)
        .bind(&task.target)
        .bind(task.status.as_str())
        .bind(&task.executor)
        .bind(&task.owner)
        .bind(task.create_time)
        .bind(task.status_time)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        debug!("Created task {} for job {}", task.task_id, task.job_id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, task_id: &str) -> PitrixResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = $1");
        let row = sqlx::query(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref()
            .map(Self::row_to_task)
            .transpose()
            .map_err(db_error)
    }

    #[instrument(skip(self))]
    async fn update_status(
        &self,
        task_id: &str,
        status: WorkStatus,
        executor: Option<&str>,
    ) -> PitrixResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = $2, status_time = $3, executor = COALESCE($4, executor)
            WHERE task_id = $1
            "#,
        )
        .bind(task_id)
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(executor)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(PitrixError::task_not_found(task_id));
        }
        Ok(())
    }

    #[instrument(skip(self, directive))]
    async fn update_directive(
        &self,
        task_id: &str,
        task_action: &TaskAction,
        directive: &str,
    ) -> PitrixResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET task_action = $2, directive = $3 WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(task_action.as_str())
        .bind(directive)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(PitrixError::task_not_found(task_id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_by_job(&self, job_id: &str) -> PitrixResult<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE job_id = $1 ORDER BY create_time");
        let rows = sqlx::query(&sql)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter()
            .map(Self::row_to_task)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)
    }
}
