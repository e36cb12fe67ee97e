//! 外部服务的内存模拟实现
//!
//! 集群管理服务、pilot 和 provider 插件都可以在这里配置行为，
//! 并在测试结束后检查收到的调用。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pitrix_core::traits::{ClusterManager, PilotClient, ProviderPlugin};
use pitrix_core::{
    decode_directive, encode_directive, Cluster, ClusterModification, ClusterNode,
    ClusterNodeModification, ClusterWrapper, Job, PitrixError, PitrixResult, SubtaskMessage,
    Task, TaskLayers, WorkStatus,
};
use serde_json::{Map, Value};

/// 集群管理服务的模拟实现
#[derive(Debug, Clone, Default)]
pub struct MockClusterManager {
    clusters: Arc<Mutex<HashMap<String, Cluster>>>,
    nodes: Arc<Mutex<HashMap<String, ClusterNode>>>,
    cluster_modifications: Arc<Mutex<Vec<ClusterModification>>>,
    node_modifications: Arc<Mutex<Vec<ClusterNodeModification>>>,
    fail_modifications: Arc<AtomicBool>,
}

impl MockClusterManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wrapper(wrapper: ClusterWrapper) -> Self {
        let manager = Self::new();
        manager.add_wrapper(wrapper);
        manager
    }

    pub fn add_wrapper(&self, wrapper: ClusterWrapper) {
        let mut nodes = self.nodes.lock().unwrap();
        for node in wrapper.nodes {
            nodes.insert(node.node_id.clone(), node);
        }
        self.clusters
            .lock()
            .unwrap()
            .insert(wrapper.cluster.cluster_id.clone(), wrapper.cluster);
    }

    pub fn update_node(&self, node_id: &str, update: impl FnOnce(&mut ClusterNode)) {
        if let Some(node) = self.nodes.lock().unwrap().get_mut(node_id) {
            update(node);
        }
    }

    pub fn update_cluster(&self, cluster_id: &str, update: impl FnOnce(&mut Cluster)) {
        if let Some(cluster) = self.clusters.lock().unwrap().get_mut(cluster_id) {
            update(cluster);
        }
    }

    pub fn node(&self, node_id: &str) -> Option<ClusterNode> {
        self.nodes.lock().unwrap().get(node_id).cloned()
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<Cluster> {
        self.clusters.lock().unwrap().get(cluster_id).cloned()
    }

    pub fn cluster_modifications(&self) -> Vec<ClusterModification> {
        self.cluster_modifications.lock().unwrap().clone()
    }

    pub fn node_modifications(&self) -> Vec<ClusterNodeModification> {
        self.node_modifications.lock().unwrap().clone()
    }

    /// 记录过的集群过渡状态，按时间顺序
    pub fn cluster_transitions(&self, cluster_id: &str) -> Vec<String> {
        self.cluster_modifications()
            .into_iter()
            .filter(|m| m.cluster_id == cluster_id)
            .filter_map(|m| m.transition_status)
            .collect()
    }

    pub fn set_fail_modifications(&self, fail: bool) {
        self.fail_modifications.store(fail, Ordering::SeqCst);
    }

    fn check_modifications(&self) -> PitrixResult<()> {
        if self.fail_modifications.load(Ordering::SeqCst) {
            return Err(PitrixError::internal("cluster manager rejected modification"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterManager for MockClusterManager {
    async fn modify_cluster(&self, modification: &ClusterModification) -> PitrixResult<()> {
        self.check_modifications()?;
        let mut clusters = self.clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&modification.cluster_id)
            .ok_or_else(|| PitrixError::ClusterNotFound {
                id: modification.cluster_id.clone(),
            })?;
        modification.apply_to(cluster);
        self.cluster_modifications
            .lock()
            .unwrap()
            .push(modification.clone());
        Ok(())
    }

    async fn modify_cluster_node(
        &self,
        modification: &ClusterNodeModification,
    ) -> PitrixResult<()> {
        self.check_modifications()?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .get_mut(&modification.node_id)
            .ok_or_else(|| PitrixError::ClusterNodeNotFound {
                id: modification.node_id.clone(),
            })?;
        modification.apply_to(node);
        self.node_modifications
            .lock()
            .unwrap()
            .push(modification.clone());
        Ok(())
    }

    async fn get_cluster_nodes(&self, node_ids: &[String]) -> PitrixResult<Vec<ClusterNode>> {
        let nodes = self.nodes.lock().unwrap();
        Ok(node_ids
            .iter()
            .filter_map(|id| nodes.get(id).cloned())
            .collect())
    }

    async fn get_cluster_wrappers(
        &self,
        cluster_ids: &[String],
    ) -> PitrixResult<Vec<ClusterWrapper>> {
        let clusters = self.clusters.lock().unwrap();
        let nodes = self.nodes.lock().unwrap();
        Ok(cluster_ids
            .iter()
            .filter_map(|id| clusters.get(id))
            .map(|cluster| {
                let mut members: Vec<ClusterNode> = nodes
                    .values()
                    .filter(|n| n.cluster_id == cluster.cluster_id)
                    .cloned()
                    .collect();
                members.sort_by(|a, b| a.node_id.cmp(&b.node_id));
                ClusterWrapper {
                    cluster: cluster.clone(),
                    nodes: members,
                }
            })
            .collect())
    }
}

/// pilot服务的模拟实现
///
/// 默认每个子任务第一次查询即成功。可以按动作让子任务失败，
/// 或者为某个子任务预设一串查询结果。
#[derive(Debug, Clone)]
pub struct MockPilotClient {
    submitted: Arc<Mutex<Vec<SubtaskMessage>>>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<PitrixResult<WorkStatus>>>>>,
    failing_actions: Arc<Mutex<HashSet<String>>>,
    rejecting_actions: Arc<Mutex<HashSet<String>>>,
    default_status: Arc<Mutex<WorkStatus>>,
    status_calls: Arc<AtomicUsize>,
}

impl Default for MockPilotClient {
    fn default() -> Self {
        Self {
            submitted: Arc::new(Mutex::new(Vec::new())),
            scripts: Arc::new(Mutex::new(HashMap::new())),
            failing_actions: Arc::new(Mutex::new(HashSet::new())),
            rejecting_actions: Arc::new(Mutex::new(HashSet::new())),
            default_status: Arc::new(Mutex::new(WorkStatus::Successful)),
            status_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockPilotClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 该动作的子任务执行结果为失败
    pub fn fail_action(&self, action: &str) {
        self.failing_actions
            .lock()
            .unwrap()
            .insert(action.to_string());
    }

    /// 该动作的子任务在提交时就被拒绝
    pub fn reject_action(&self, action: &str) {
        self.rejecting_actions
            .lock()
            .unwrap()
            .insert(action.to_string());
    }

    pub fn set_default_status(&self, status: WorkStatus) {
        *self.default_status.lock().unwrap() = status;
    }

    /// 为子任务预设依次返回的查询结果，用完后回到默认行为
    pub fn script(&self, subtask_id: &str, results: Vec<PitrixResult<WorkStatus>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(subtask_id.to_string(), results.into());
    }

    pub fn submitted(&self) -> Vec<SubtaskMessage> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_actions(&self) -> Vec<String> {
        self.submitted().into_iter().map(|s| s.action).collect()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PilotClient for MockPilotClient {
    async fn handle_subtask(&self, subtask: &SubtaskMessage) -> PitrixResult<()> {
        if self.rejecting_actions.lock().unwrap().contains(&subtask.action) {
            return Err(PitrixError::remote_failed(
                format!("subtask {}", subtask.subtask_id),
                "rejected by pilot",
            ));
        }
        self.submitted.lock().unwrap().push(subtask.clone());
        Ok(())
    }

    async fn get_subtask_status(&self, subtask_id: &str) -> PitrixResult<WorkStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(next) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(subtask_id)
            .and_then(|script| script.pop_front())
        {
            return next;
        }

        let action = self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.subtask_id == subtask_id)
            .map(|s| s.action.clone());
        match action {
            Some(action) if self.failing_actions.lock().unwrap().contains(&action) => {
                Ok(WorkStatus::Failed)
            }
            Some(_) => Ok(*self.default_status.lock().unwrap()),
            None => Err(PitrixError::internal(format!(
                "unknown subtask {subtask_id}"
            ))),
        }
    }
}

/// provider插件的模拟实现
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    layers: Arc<Mutex<Option<TaskLayers>>>,
    handled: Arc<Mutex<Vec<Task>>>,
    failing_actions: Arc<Mutex<HashSet<String>>>,
    resolved_fields: Arc<Mutex<HashMap<String, Map<String, Value>>>>,
    wait_calls: Arc<AtomicUsize>,
    wait_delay: Arc<Mutex<Duration>>,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            layers: Arc::new(Mutex::new(None)),
            handled: Arc::new(Mutex::new(Vec::new())),
            failing_actions: Arc::new(Mutex::new(HashSet::new())),
            resolved_fields: Arc::new(Mutex::new(HashMap::new())),
            wait_calls: Arc::new(AtomicUsize::new(0)),
            wait_delay: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// 拆分任何作业都返回这组任务层（任务ID每次重新生成）
    pub fn with_layers(self, layers: TaskLayers) -> Self {
        *self.layers.lock().unwrap() = Some(layers);
        self
    }

    pub fn fail_action(&self, action: &str) {
        self.failing_actions
            .lock()
            .unwrap()
            .insert(action.to_string());
    }

    /// 等待成功后合并进该动作任务指令的字段
    pub fn resolve_fields(&self, action: &str, fields: Value) {
        if let Value::Object(map) = fields {
            self.resolved_fields
                .lock()
                .unwrap()
                .insert(action.to_string(), map);
        }
    }

    pub fn set_wait_delay(&self, delay: Duration) {
        *self.wait_delay.lock().unwrap() = delay;
    }

    pub fn handled(&self) -> Vec<Task> {
        self.handled.lock().unwrap().clone()
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderPlugin for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn split_job_into_tasks(&self, job: &Job) -> PitrixResult<TaskLayers> {
        let template = self.layers.lock().unwrap().clone();
        let template = template.ok_or_else(|| {
            PitrixError::UnsupportedAction(job.job_action.to_string())
        })?;

        let mut fresh = TaskLayers::new();
        for (_, layer) in template.walk() {
            fresh.push_layer(
                layer
                    .tasks()
                    .map(|t| {
                        Task::new(
                            t.task_action.clone(),
                            t.target.clone(),
                            t.node_id.clone(),
                            t.directive.clone(),
                        )
                    })
                    .collect(),
            );
        }
        Ok(fresh)
    }

    async fn handle_subtask(&self, task: &mut Task) -> PitrixResult<()> {
        self.handled.lock().unwrap().push(task.clone());
        if self
            .failing_actions
            .lock()
            .unwrap()
            .contains(task.task_action.as_str())
        {
            return Err(PitrixError::remote_failed(
                format!("{} {}", task.task_action, task.task_id),
                "mock provider failure",
            ));
        }
        Ok(())
    }

    async fn wait_subtask(
        &self,
        task: &mut Task,
        _timeout: Duration,
        _interval: Duration,
    ) -> PitrixResult<()> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.wait_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let fields = self
            .resolved_fields
            .lock()
            .unwrap()
            .get(task.task_action.as_str())
            .cloned();
        if let Some(fields) = fields {
            let mut directive: Map<String, Value> = decode_directive(&task.directive)?;
            directive.extend(fields);
            task.directive = encode_directive(&directive)?;
        }
        Ok(())
    }
}
