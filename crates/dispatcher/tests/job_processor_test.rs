#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pitrix_core::JobAction;
    use pitrix_dispatcher::JobProcessor;
    use pitrix_testing_utils::{cluster_wrapper, job, MockClusterManager};

    fn processor() -> (JobProcessor, MockClusterManager) {
        let manager = MockClusterManager::with_wrapper(cluster_wrapper("cl-1", 1));
        (JobProcessor::new(Arc::new(manager.clone())), manager)
    }

    #[tokio::test]
    async fn test_pre_then_post_settles_cluster() {
        let (processor, manager) = processor();
        let stop = job(JobAction::StopClusters, "cl-1", "vmbased");

        processor.pre(&stop).await.unwrap();
        let cluster = manager.cluster("cl-1").unwrap();
        assert_eq!(cluster.transition_status, "stopping");

        processor.post(&stop).await.unwrap();
        let cluster = manager.cluster("cl-1").unwrap();
        assert_eq!(cluster.status, "stopped");
        assert_eq!(cluster.transition_status, "");
    }

    #[tokio::test]
    async fn test_on_failure_keeps_stable_status() {
        let (processor, manager) = processor();
        manager.update_cluster("cl-1", |c| c.status = "active".to_string());
        let cease = job(JobAction::CeaseClusters, "cl-1", "vmbased");

        processor.pre(&cease).await.unwrap();
        processor.on_failure(&cease).await.unwrap();

        let cluster = manager.cluster("cl-1").unwrap();
        assert_eq!(cluster.status, "active");
        assert_eq!(cluster.transition_status, "");
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_no_op() {
        let (processor, manager) = processor();
        let unknown = job(JobAction::from("Hibernate"), "cl-1", "vmbased");

        processor.pre(&unknown).await.unwrap();
        processor.post(&unknown).await.unwrap();
        processor.on_failure(&unknown).await.unwrap();
        assert!(manager.cluster_modifications().is_empty());
    }

    #[tokio::test]
    async fn test_pre_error_propagates() {
        let (processor, manager) = processor();
        manager.set_fail_modifications(true);

        let create = job(JobAction::CreateCluster, "cl-1", "vmbased");
        assert!(processor.pre(&create).await.is_err());
    }
}
