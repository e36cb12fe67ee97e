#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pitrix_core::traits::{TaskRepository, WorkQueue};
    use pitrix_core::{
        decode_directive, Controller, ControllerSettings, InstanceDirective, ProviderRegistry,
        Task, TaskAction, UnitHandler, WaitPolicy, WorkStatus,
    };
    use pitrix_testing_utils::{
        cluster_wrapper, eventually, fast_policy, pilot_task, provider_task, with_volumes,
        MemoryBackend, MockClusterManager, MockPilotClient, MockProvider,
    };
    use pitrix_worker::{TaskController, TaskControllerDeps};
    use serde_json::json;
    use tokio::sync::broadcast;

    struct Harness {
        backend: MemoryBackend,
        cluster_manager: MockClusterManager,
        pilot: MockPilotClient,
        provider: MockProvider,
        controller: TaskController,
    }

    async fn harness(policy: WaitPolicy) -> Harness {
        let backend = MemoryBackend::new();
        let cluster_manager =
            MockClusterManager::with_wrapper(with_volumes(cluster_wrapper("cl-1", 2), 20));
        let pilot = MockPilotClient::new();
        let provider = MockProvider::new("vmbased");

        let providers = ProviderRegistry::new();
        providers.register(Arc::new(provider.clone())).await.unwrap();

        let deps = TaskControllerDeps {
            tasks: backend.tasks.clone(),
            pilot: Arc::new(pilot.clone()),
            providers,
            cluster_manager: Arc::new(cluster_manager.clone()),
        };
        let controller = TaskController::new(deps, policy, "wk-test");

        Harness {
            backend,
            cluster_manager,
            pilot,
            provider,
            controller,
        }
    }

    async fn store(h: &Harness, task: &Task) {
        h.backend.tasks.create(task).await.unwrap();
    }

    async fn stored(h: &Harness, task_id: &str) -> Task {
        h.backend.tasks.get_by_id(task_id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_pilot_task_succeeds_with_resolved_drone_ip() {
        let h = harness(fast_policy()).await;
        let task = pilot_task(TaskAction::StartConfd, Some("cln-2"), r#"{"cluster_id":"cl-1"}"#);
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        let task = stored(&h, &task.task_id).await;
        assert_eq!(task.status, WorkStatus::Successful);
        assert_eq!(task.executor, "wk-test");

        let submitted = h.pilot.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].action, "StartConfd");
        assert!(submitted[0].directive.contains("10.0.0.2"));
    }

    #[tokio::test]
    async fn test_pilot_failure_marks_task_failed() {
        let h = harness(fast_policy()).await;
        h.pilot.fail_action("StopConfd");
        let task = pilot_task(TaskAction::StopConfd, Some("cln-1"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
    }

    #[tokio::test]
    async fn test_pilot_transport_errors_are_retried() {
        let h = harness(fast_policy()).await;
        let task = pilot_task(TaskAction::PingDrone, Some("cln-1"), "{}");
        store(&h, &task).await;
        h.pilot.script(
            &task.task_id,
            (0..5)
                .map(|_| Err(pitrix_core::PitrixError::network_error("connection reset")))
                .chain(std::iter::once(Ok(WorkStatus::Successful)))
                .collect(),
        );

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Successful);
        assert_eq!(h.pilot.status_calls(), 6);
    }

    #[tokio::test]
    async fn test_wait_timeout_marks_task_failed() {
        let h = harness(WaitPolicy::new(
            Duration::from_millis(5),
            Duration::from_millis(60),
        ))
        .await;
        h.pilot.set_default_status(WorkStatus::Working);
        let task = pilot_task(TaskAction::SetDroneConfig, Some("cln-1"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
        assert!(h.pilot.status_calls() > 1);
    }

    #[tokio::test]
    async fn test_unknown_target_fails_without_waiting() {
        let h = harness(fast_policy()).await;
        let task = provider_task(TaskAction::StopInstances, "kubernetes", Some("cln-1"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
        assert_eq!(h.provider.wait_calls(), 0);
        assert!(h.provider.handled().is_empty());
        assert_eq!(h.pilot.status_calls(), 0);

        let node = h.cluster_manager.node("cln-1").unwrap();
        assert_eq!(node.transition_status, "");
        assert_ne!(node.status, "stopped");
    }

    #[tokio::test]
    async fn test_run_instances_writes_back_node_attributes() {
        let h = harness(fast_policy()).await;
        h.cluster_manager
            .update_node("cln-1", |n| n.volume_id = "vol-1".to_string());
        h.provider.resolve_fields(
            "RunInstances",
            json!({"instance_id": "i-abc", "private_ip": "10.1.0.5", "device": "/dev/vdc"}),
        );
        let task = provider_task(
            TaskAction::RunInstances,
            "vmbased",
            Some("cln-1"),
            r#"{"cluster_id":"cl-1","node_id":"cln-1","zone":"pek3"}"#,
        );
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        let task = stored(&h, &task.task_id).await;
        assert_eq!(task.status, WorkStatus::Successful);
        let directive: InstanceDirective = decode_directive(&task.directive).unwrap();
        assert_eq!(directive.volume_id, "vol-1");
        assert_eq!(directive.instance_id, "i-abc");
        assert_eq!(directive.extra["zone"], "pek3");

        let node = h.cluster_manager.node("cln-1").unwrap();
        assert_eq!(node.instance_id, "i-abc");
        assert_eq!(node.private_ip, "10.1.0.5");
        assert_eq!(node.device, "/dev/vdc");
        assert_eq!(node.status, "active");
        assert_eq!(node.transition_status, "");
    }

    #[tokio::test]
    async fn test_provider_failure_clears_node_transition() {
        let h = harness(fast_policy()).await;
        h.provider.fail_action("StartInstances");
        let task = provider_task(TaskAction::StartInstances, "vmbased", Some("cln-2"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
        assert_eq!(h.provider.wait_calls(), 0);
        let transitions: Vec<_> = h
            .cluster_manager
            .node_modifications()
            .into_iter()
            .filter_map(|m| m.transition_status)
            .collect();
        assert_eq!(transitions, vec!["starting".to_string(), String::new()]);
    }

    #[tokio::test]
    async fn test_missing_write_back_field_fails_task() {
        let h = harness(fast_policy()).await;
        let task = provider_task(TaskAction::CreateVolumes, "vmbased", Some("cln-1"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
        assert_eq!(h.cluster_manager.node("cln-1").unwrap().volume_id, "");
    }

    #[tokio::test]
    async fn test_missing_task_is_ignored() {
        let h = harness(fast_policy()).await;
        h.controller.handle("t-missing".to_string()).await;

        assert!(h.pilot.submitted().is_empty());
        assert!(h.provider.handled().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_subtask_is_never_polled() {
        let h = harness(fast_policy()).await;
        h.pilot.reject_action("StartConfd");
        let task = pilot_task(TaskAction::StartConfd, Some("cln-1"), "{}");
        store(&h, &task).await;

        h.controller.handle(task.task_id.clone()).await;

        assert_eq!(stored(&h, &task.task_id).await.status, WorkStatus::Failed);
        assert!(h.pilot.submitted().is_empty());
        assert_eq!(h.pilot.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_controller_loop_bounds_in_flight_tasks() {
        let h = harness(fast_policy()).await;
        h.provider.set_wait_delay(Duration::from_millis(40));

        let mut ids = Vec::new();
        for _ in 0..6 {
            let task = provider_task(TaskAction::DetachVolumes, "vmbased", None, "{}");
            store(&h, &task).await;
            h.backend.task_queue.enqueue(&task.task_id).await.unwrap();
            ids.push(task.task_id);
        }

        let controller = Arc::new(Controller::new(
            Arc::new(h.controller),
            h.backend.task_queue.clone(),
            ControllerSettings {
                max_workers: 2,
                busy_backoff: Duration::from_millis(5),
                dequeue_backoff: Duration::from_millis(5),
            },
        ));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let serving = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.serve(shutdown_rx).await })
        };

        let tasks = h.backend.tasks.clone();
        let mut peak = 0;
        let finished = eventually(Duration::from_secs(5), || {
            peak = peak.max(controller.in_flight());
            let tasks = tasks.clone();
            let ids = ids.clone();
            async move {
                for id in &ids {
                    let task = tasks.get_by_id(id).await.unwrap().unwrap();
                    if task.status != WorkStatus::Successful {
                        return false;
                    }
                }
                true
            }
        })
        .await;

        assert!(finished);
        assert!(peak <= 2, "in-flight peaked at {peak}");
        assert_eq!(h.provider.wait_calls(), 6);

        shutdown_tx.send(()).unwrap();
        serving.await.unwrap();
    }
}
