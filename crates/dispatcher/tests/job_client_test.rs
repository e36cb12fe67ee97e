#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pitrix_core::traits::{JobRepository, TaskRepository, WorkQueue};
    use pitrix_core::{JobAction, PitrixError, TaskAction, WaitPolicy, WorkStatus};
    use pitrix_dispatcher::JobClient;
    use pitrix_testing_utils::{fast_policy, job, pilot_task, MemoryBackend};

    fn client(backend: &MemoryBackend, wait: WaitPolicy) -> JobClient {
        JobClient::new(
            backend.jobs.clone(),
            backend.tasks.clone(),
            backend.job_queue.clone(),
            wait,
            wait,
        )
    }

    #[tokio::test]
    async fn test_submit_persists_pending_job_and_enqueues() {
        let backend = MemoryBackend::new();
        let client = client(&backend, fast_policy());

        let mut submitted = job(JobAction::CreateCluster, "cl-1", "vmbased");
        submitted.status = WorkStatus::Failed;
        let job_id = client.submit(submitted).await.unwrap();

        let stored = client.get_job(&job_id).await.unwrap();
        assert_eq!(stored.status, WorkStatus::Pending);
        assert_eq!(backend.job_queue.dequeue().await.unwrap(), job_id);
    }

    #[tokio::test]
    async fn test_wait_job_returns_when_job_succeeds() {
        let backend = MemoryBackend::new();
        let client = client(&backend, fast_policy());
        let job_id = client
            .submit(job(JobAction::StartClusters, "cl-1", "vmbased"))
            .await
            .unwrap();

        let jobs = Arc::clone(&backend.jobs);
        let finisher = {
            let job_id = job_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                jobs.update_status(&job_id, WorkStatus::Successful, None)
                    .await
                    .unwrap();
            })
        };

        client.wait_job(&job_id).await.unwrap();
        finisher.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_task_reports_failure() {
        let backend = MemoryBackend::new();
        let client = client(&backend, fast_policy());
        let task = pilot_task(TaskAction::StartConfd, Some("cln-1"), "{}");
        backend.tasks.create(&task).await.unwrap();
        backend
            .tasks
            .update_status(&task.task_id, WorkStatus::Failed, None)
            .await
            .unwrap();

        let err = client.wait_task(&task.task_id).await.unwrap_err();
        assert!(matches!(err, PitrixError::RemoteFailed { .. }));
    }

    #[tokio::test]
    async fn test_wait_job_times_out() {
        let backend = MemoryBackend::new();
        let client = client(
            &backend,
            WaitPolicy::new(Duration::from_millis(5), Duration::from_millis(50)),
        );
        let job_id = client
            .submit(job(JobAction::StopClusters, "cl-1", "vmbased"))
            .await
            .unwrap();

        let err = client.wait_job(&job_id).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_for_unknown_job_fails_fast() {
        let backend = MemoryBackend::new();
        let client = client(&backend, fast_policy());

        let err = client.wait_job("j-unknown").await.unwrap_err();
        assert!(matches!(err, PitrixError::JobNotFound { .. }));
    }
}
