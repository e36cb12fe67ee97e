use std::sync::Arc;

use pitrix_core::constants::TRANSITION_CLEARED;
use pitrix_core::traits::ClusterManager;
use pitrix_core::transitions::job_transition;
use pitrix_core::{ClusterModification, Job, PitrixResult};
use tracing::{debug, info};

/// 作业处理器
///
/// 执行前把集群置为动作对应的过渡状态，成功后写入稳定状态，
/// 失败后清除过渡状态。表中没有的动作不做任何处理。
pub struct JobProcessor {
    cluster_manager: Arc<dyn ClusterManager>,
}

impl JobProcessor {
    pub fn new(cluster_manager: Arc<dyn ClusterManager>) -> Self {
        Self { cluster_manager }
    }

    pub async fn pre(&self, job: &Job) -> PitrixResult<()> {
        let Some(transition) = job_transition(&job.job_action) else {
            debug!("作业 {} 的动作 {} 无需前置处理", job.job_id, job.job_action);
            return Ok(());
        };
        self.cluster_manager
            .modify_cluster(&ClusterModification::transition(
                &job.cluster_id,
                transition.pre,
            ))
            .await?;
        info!(
            "集群 {} 进入过渡状态 {} (作业 {})",
            job.cluster_id, transition.pre, job.job_id
        );
        Ok(())
    }

    pub async fn post(&self, job: &Job) -> PitrixResult<()> {
        let Some(transition) = job_transition(&job.job_action) else {
            return Ok(());
        };
        self.cluster_manager
            .modify_cluster(&ClusterModification::settle(&job.cluster_id, transition.post))
            .await?;
        info!(
            "集群 {} 状态更新为 {} (作业 {})",
            job.cluster_id, transition.post, job.job_id
        );
        Ok(())
    }

    /// 作业失败后的收尾：清除过渡状态，稳定状态保持不变
    pub async fn on_failure(&self, job: &Job) -> PitrixResult<()> {
        if job_transition(&job.job_action).is_none() {
            return Ok(());
        }
        self.cluster_manager
            .modify_cluster(&ClusterModification::transition(
                &job.cluster_id,
                TRANSITION_CLEARED,
            ))
            .await?;
        info!("作业 {} 失败，已清除集群 {} 的过渡状态", job.job_id, job.cluster_id);
        Ok(())
    }
}
