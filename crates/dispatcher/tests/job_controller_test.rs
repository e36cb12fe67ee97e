#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use pitrix_core::traits::{JobRepository, TaskRepository, WorkQueue};
    use pitrix_core::{
        JobAction, ProviderRegistry, TaskAction, TaskLayers, UnitHandler, WorkStatus,
    };
    use pitrix_dispatcher::{JobClient, JobController, JobControllerDeps};
    use pitrix_testing_utils::{
        cluster_wrapper, fast_policy, job, pilot_task, provider_task, MemoryBackend,
        MockClusterManager, MockProvider,
    };
    use tokio::task::JoinHandle;

    struct Harness {
        backend: MemoryBackend,
        cluster_manager: MockClusterManager,
        provider: MockProvider,
        controller: JobController,
        client: JobClient,
    }

    fn create_cluster_layers() -> TaskLayers {
        TaskLayers::new()
            .with_layer(vec![
                provider_task(TaskAction::RunInstances, "vmbased", Some("cln-1"), "{}"),
                provider_task(TaskAction::RunInstances, "vmbased", Some("cln-2"), "{}"),
                provider_task(TaskAction::RunInstances, "vmbased", Some("cln-3"), "{}"),
            ])
            .with_layer(vec![pilot_task(TaskAction::RegisterMetadata, None, "{}")])
    }

    async fn harness(layers: TaskLayers) -> Harness {
        let backend = MemoryBackend::new();
        let cluster_manager = MockClusterManager::with_wrapper(cluster_wrapper("cl-1", 3));
        let provider = MockProvider::new("vmbased").with_layers(layers);

        let providers = ProviderRegistry::new();
        providers.register(Arc::new(provider.clone())).await.unwrap();

        let deps = JobControllerDeps {
            jobs: backend.jobs.clone(),
            tasks: backend.tasks.clone(),
            task_queue: backend.task_queue.clone(),
            providers,
            cluster_manager: Arc::new(cluster_manager.clone()),
        };
        let controller = JobController::new(deps, fast_policy(), "ctl-test");
        let client = JobClient::new(
            backend.jobs.clone(),
            backend.tasks.clone(),
            backend.job_queue.clone(),
            fast_policy(),
            fast_policy(),
        );

        Harness {
            backend,
            cluster_manager,
            provider,
            controller,
            client,
        }
    }

    /// 代替任务控制器：取出任务，记录开始/结束事件，然后写入终态
    fn spawn_task_simulator(
        backend: &MemoryBackend,
        failing: Option<TaskAction>,
    ) -> (Arc<Mutex<Vec<String>>>, JoinHandle<()>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let queue = backend.task_queue.clone();
        let tasks = backend.tasks.clone();
        let log = events.clone();

        let handle = tokio::spawn(async move {
            while let Ok(task_id) = queue.dequeue().await {
                let tasks = tasks.clone();
                let log = log.clone();
                let failing = failing.clone();
                tokio::spawn(async move {
                    let task = tasks.get_by_id(&task_id).await.unwrap().unwrap();
                    log.lock()
                        .unwrap()
                        .push(format!("start {}", task.task_action));
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    let status = if Some(&task.task_action) == failing.as_ref() {
                        WorkStatus::Failed
                    } else {
                        WorkStatus::Successful
                    };
                    log.lock().unwrap().push(format!("done {}", task.task_action));
                    tasks.update_status(&task_id, status, None).await.unwrap();
                });
            }
        });
        (events, handle)
    }

    #[tokio::test]
    async fn test_create_cluster_waits_for_parent_layer() {
        let h = harness(create_cluster_layers()).await;
        let (events, simulator) = spawn_task_simulator(&h.backend, None);

        let job_id = h
            .client
            .submit(job(JobAction::CreateCluster, "cl-1", "vmbased"))
            .await
            .unwrap();
        assert_eq!(h.backend.job_queue.dequeue().await.unwrap(), job_id);

        h.controller.handle(job_id.clone()).await;
        simulator.abort();

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Successful);
        assert_eq!(stored.executor, "ctl-test");

        let events = events.lock().unwrap().clone();
        let register_start = events
            .iter()
            .position(|e| e == "start RegisterMetadata")
            .expect("metadata task dispatched");
        let run_done: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == "done RunInstances")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(run_done.len(), 3);
        assert!(run_done.iter().all(|&i| i < register_start));

        let tasks = h.backend.tasks.list_by_job(&job_id).await.unwrap();
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().all(|t| t.status == WorkStatus::Successful));
        assert!(tasks.iter().all(|t| t.owner == "usr-test"));

        assert_eq!(
            h.cluster_manager.cluster_transitions("cl-1"),
            vec!["creating".to_string(), String::new()]
        );
        assert_eq!(h.cluster_manager.cluster("cl-1").unwrap().status, "active");
    }

    #[tokio::test]
    async fn test_failed_parent_layer_stops_the_walk() {
        let h = harness(create_cluster_layers()).await;
        let (events, simulator) = spawn_task_simulator(&h.backend, Some(TaskAction::RunInstances));

        let job_id = h
            .client
            .submit(job(JobAction::CreateCluster, "cl-1", "vmbased"))
            .await
            .unwrap();
        h.controller.handle(job_id.clone()).await;
        simulator.abort();

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Failed);

        let tasks = h.backend.tasks.list_by_job(&job_id).await.unwrap();
        assert_eq!(tasks.len(), 4);
        for task in &tasks {
            let expected = match task.task_action {
                TaskAction::RunInstances => WorkStatus::Failed,
                _ => WorkStatus::Pending,
            };
            assert_eq!(task.status, expected, "{}", task.task_action);
        }
        assert!(!events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains("RegisterMetadata")));

        let cluster = h.cluster_manager.cluster("cl-1").unwrap();
        assert_eq!(cluster.status, "pending");
        assert_eq!(cluster.transition_status, "");
        assert_eq!(
            h.cluster_manager.cluster_transitions("cl-1"),
            vec!["creating".to_string(), String::new()]
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_fails_job_without_tasks() {
        let h = harness(create_cluster_layers()).await;

        let job_id = h
            .client
            .submit(job(JobAction::StopClusters, "cl-1", "kubernetes"))
            .await
            .unwrap();
        h.controller.handle(job_id.clone()).await;

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Failed);
        assert!(h.backend.tasks.list_by_job(&job_id).await.unwrap().is_empty());
        assert!(h.backend.task_queue.is_empty());
    }

    #[tokio::test]
    async fn test_missing_job_does_not_dispatch() {
        let h = harness(create_cluster_layers()).await;
        h.controller.handle("j-missing".to_string()).await;

        assert!(h.backend.task_queue.is_empty());
        assert!(h.cluster_manager.cluster_modifications().is_empty());
    }

    #[tokio::test]
    async fn test_job_without_tasks_succeeds() {
        let h = harness(TaskLayers::new()).await;

        let job_id = h
            .client
            .submit(job(JobAction::StopClusters, "cl-1", "vmbased"))
            .await
            .unwrap();
        h.controller.handle(job_id.clone()).await;

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Successful);
        assert_eq!(h.cluster_manager.cluster("cl-1").unwrap().status, "stopped");
    }

    #[tokio::test]
    async fn test_unknown_action_leaves_cluster_untouched() {
        let layers = TaskLayers::new().with_layer(vec![pilot_task(
            TaskAction::PingDrone,
            Some("cln-1"),
            "{}",
        )]);
        let h = harness(layers).await;
        let (_events, simulator) = spawn_task_simulator(&h.backend, None);

        let job_id = h
            .client
            .submit(job(JobAction::from("Hibernate"), "cl-1", "vmbased"))
            .await
            .unwrap();
        h.controller.handle(job_id.clone()).await;
        simulator.abort();

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Successful);
        assert!(h.cluster_manager.cluster_modifications().is_empty());
    }

    #[tokio::test]
    async fn test_pre_failure_fails_job_before_split() {
        let h = harness(create_cluster_layers()).await;
        h.cluster_manager.set_fail_modifications(true);

        let job_id = h
            .client
            .submit(job(JobAction::CreateCluster, "cl-1", "vmbased"))
            .await
            .unwrap();
        h.controller.handle(job_id.clone()).await;

        let stored = h.backend.jobs.get_by_id(&job_id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Failed);
        assert!(h.backend.task_queue.is_empty());
        assert!(h.provider.handled().is_empty());
    }
}
