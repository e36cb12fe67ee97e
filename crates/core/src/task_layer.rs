//! 任务分层
//!
//! 作业被拆分为有序的任务层：同一层内的任务可以并行，
//! 某一层只有在它的父层全部成功之后才会被派发。
//! 任务统一存放在一个扁平数组中，层只保存下标。

use crate::models::{Job, Task, WorkStatus};

#[derive(Debug, Clone, Default)]
pub struct TaskLayers {
    tasks: Vec<Task>,
    layers: Vec<Vec<usize>>,
}

/// 对某一层的只读视图
#[derive(Debug, Clone, Copy)]
pub struct LayerRef<'a> {
    index: usize,
    is_leaf: bool,
    members: &'a [usize],
    tasks: &'a [Task],
}

impl<'a> LayerRef<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// 最后一层，没有子层
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &'a Task> + 'a {
        let (members, tasks) = (self.members, self.tasks);
        members.iter().map(move |&i| &tasks[i])
    }
}

impl TaskLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一层，返回该层下标。空层也是合法的。
    pub fn push_layer(&mut self, tasks: Vec<Task>) -> usize {
        let start = self.tasks.len();
        self.tasks.extend(tasks);
        self.layers.push((start..self.tasks.len()).collect());
        self.layers.len() - 1
    }

    pub fn with_layer(mut self, tasks: Vec<Task>) -> Self {
        self.push_layer(tasks);
        self
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn layer(&self, index: usize) -> Option<LayerRef<'_>> {
        self.layers.get(index).map(|members| LayerRef {
            index,
            is_leaf: index + 1 == self.layers.len(),
            members,
            tasks: &self.tasks,
        })
    }

    pub fn leaf(&self) -> Option<LayerRef<'_>> {
        self.layers.len().checked_sub(1).and_then(|i| self.layer(i))
    }

    /// 把全部任务绑定到作业上：写入作业ID和属主，状态重置为pending
    pub fn bind_to_job(&mut self, job: &Job) {
        for task in &mut self.tasks {
            task.job_id = job.job_id.clone();
            task.owner = job.owner.clone();
            task.status = WorkStatus::Pending;
        }
    }

    /// 自根层到叶子层依次产出 `(父层, 当前层)`
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            layers: self,
            next: 0,
        }
    }
}

pub struct Walk<'a> {
    layers: &'a TaskLayers,
    next: usize,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (Option<LayerRef<'a>>, LayerRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.layers.layer(self.next)?;
        let parent = self
            .next
            .checked_sub(1)
            .and_then(|i| self.layers.layer(i));
        self.next += 1;
        Some((parent, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobAction, TaskAction};

    fn task(action: TaskAction) -> Task {
        Task::new(action, "pilot", None, "{}")
    }

    #[test]
    fn test_walk_visits_each_layer_once_parent_first() {
        let layers = TaskLayers::new()
            .with_layer(vec![task(TaskAction::RunInstances), task(TaskAction::RunInstances)])
            .with_layer(vec![task(TaskAction::RegisterMetadata)])
            .with_layer(vec![task(TaskAction::StartConfd)]);

        let visited: Vec<(Option<usize>, usize, bool)> = layers
            .walk()
            .map(|(parent, current)| (parent.map(|p| p.index()), current.index(), current.is_leaf()))
            .collect();

        assert_eq!(
            visited,
            vec![(None, 0, false), (Some(0), 1, false), (Some(1), 2, true)]
        );
    }

    #[test]
    fn test_empty_layers_walk_nothing() {
        let layers = TaskLayers::new();
        assert_eq!(layers.walk().count(), 0);
        assert!(layers.leaf().is_none());
    }

    #[test]
    fn test_empty_layer_is_kept_in_order() {
        let layers = TaskLayers::new()
            .with_layer(vec![task(TaskAction::StopConfd)])
            .with_layer(Vec::new())
            .with_layer(vec![task(TaskAction::StopInstances)]);

        let sizes: Vec<usize> = layers.walk().map(|(_, l)| l.len()).collect();
        assert_eq!(sizes, vec![1, 0, 1]);
        assert_eq!(layers.task_count(), 2);
    }

    #[test]
    fn test_bind_to_job() {
        let job = Job::new("cl-1", JobAction::CreateCluster, "vmbased", "{}").with_owner("usr-1");
        let mut layers = TaskLayers::new().with_layer(vec![task(TaskAction::RunInstances)]);
        layers.bind_to_job(&job);

        let bound = &layers.tasks()[0];
        assert_eq!(bound.job_id, job.job_id);
        assert_eq!(bound.owner, "usr-1");
        assert!(bound.task_id.starts_with("t-"));
    }
}
