//! Dependency graph over the sub-tasks of one workflow.
//!
//! The graph owns every [`SubTask`] and is the only place statuses change.
//! Failure propagates eagerly: as soon as a task fails or is skipped, every
//! pending task that transitively depends on it is skipped as well, so the
//! graph can never stall on a dependency that will not succeed.

use super::task::{SubTask, TaskStatus};
use crate::errors::GraphError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<SubTask>", into = "Vec<SubTask>")]
pub struct TaskGraph {
    tasks: BTreeMap<u64, SubTask>,
    /// Insertion order, which is planning order
    order: Vec<u64>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a graph from a previously persisted plan, keeping statuses and results.
    pub fn from_tasks(tasks: Vec<SubTask>) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        graph.validate(&tasks)?;
        graph.commit(tasks);
        Ok(graph)
    }

    /// Inserts new tasks as pending.
    ///
    /// The insert is atomic: on any validation error (bad id, unknown
    /// dependency, cycle) the graph is left untouched. New tasks whose
    /// dependencies already failed or were skipped are skipped immediately.
    pub fn add_tasks(&mut self, tasks: Vec<SubTask>) -> Result<Vec<u64>, GraphError> {
        let tasks: Vec<SubTask> = tasks
            .into_iter()
            .map(|mut t| {
                t.status = TaskStatus::Pending;
                t.result = None;
                t
            })
            .collect();
        self.validate(&tasks)?;
        let ids: Vec<u64> = tasks.iter().map(|t| t.id).collect();
        self.commit(tasks);
        self.cascade_skips();
        Ok(ids)
    }

    fn commit(&mut self, tasks: Vec<SubTask>) {
        for task in tasks {
            self.order.push(task.id);
            self.tasks.insert(task.id, task);
        }
    }

    fn validate(&self, incoming: &[SubTask]) -> Result<(), GraphError> {
        let mut seen = BTreeSet::new();
        for task in incoming {
            if task.id == 0 {
                return Err(GraphError::InvalidTaskId);
            }
            if self.tasks.contains_key(&task.id) || !seen.insert(task.id) {
                return Err(GraphError::DuplicateTaskId(task.id));
            }
        }
        for task in incoming {
            for dep in &task.dependencies {
                if !self.tasks.contains_key(dep) && !seen.contains(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: task.id,
                        dependency: *dep,
                    });
                }
            }
        }

        // Kahn's algorithm over existing and incoming tasks together
        let mut indegree: BTreeMap<u64, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<u64, Vec<u64>> = BTreeMap::new();
        for task in self.tasks.values().chain(incoming.iter()) {
            indegree.insert(task.id, task.dependencies.len());
            for dep in &task.dependencies {
                dependents.entry(*dep).or_default().push(task.id);
            }
        }
        let mut queue: VecDeque<u64> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for dependent in dependents.get(&id).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
        if visited != indegree.len() {
            let involved = indegree
                .into_iter()
                .filter(|(_, d)| *d > 0)
                .map(|(id, _)| id)
                .collect();
            return Err(GraphError::Cycle { involved });
        }
        Ok(())
    }

    pub fn get(&self, id: u64) -> Option<&SubTask> {
        self.tasks.get(&id)
    }

    /// Tasks in planning order
    pub fn tasks(&self) -> impl Iterator<Item = &SubTask> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn max_id(&self) -> u64 {
        self.tasks.keys().next_back().copied().unwrap_or(0)
    }

    /// Pending tasks whose dependencies have all succeeded, in ascending id order.
    pub fn ready_tasks(&self) -> Vec<u64> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .filter(|t| {
                t.dependencies.iter().all(|dep| {
                    self.tasks
                        .get(dep)
                        .is_some_and(|d| d.status == TaskStatus::Succeeded)
                })
            })
            .map(|t| t.id)
            .collect()
    }

    /// True once no task is pending or running
    pub fn is_complete(&self) -> bool {
        self.tasks
            .values()
            .all(|t| !matches!(t.status, TaskStatus::Pending | TaskStatus::Running))
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }

    pub fn mark_running(&mut self, id: u64) -> Result<(), GraphError> {
        self.transition(id, TaskStatus::Running)?;
        Ok(())
    }

    /// Records the outcome of a running task.
    ///
    /// `status` must be succeeded, failed or skipped. Returns the ids of
    /// pending tasks that were cascade-skipped as a consequence.
    pub fn mark_result(
        &mut self,
        id: u64,
        status: TaskStatus,
        result: Option<String>,
    ) -> Result<Vec<u64>, GraphError> {
        let from = self.status_of(id)?;
        if from != TaskStatus::Running || !status.is_terminal() {
            return Err(GraphError::InvalidTransition {
                id,
                from,
                to: status,
            });
        }
        let task = self.transition(id, status)?;
        task.result = result;
        Ok(self.cascade_skips())
    }

    /// Skips a pending task with a reason and cascades to its dependents.
    pub fn skip(&mut self, id: u64, reason: &str) -> Result<Vec<u64>, GraphError> {
        let task = self.transition(id, TaskStatus::Skipped)?;
        task.result = Some(reason.to_string());
        let mut skipped = vec![id];
        skipped.extend(self.cascade_skips());
        Ok(skipped)
    }

    /// Skips every pending task; used when the workflow stops scheduling work.
    pub fn skip_remaining(&mut self, reason: &str) -> Vec<u64> {
        let mut skipped = self.cascade_skips();
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::Skipped;
                task.result = Some(reason.to_string());
                skipped.push(task.id);
            }
        }
        skipped
    }

    /// Puts running tasks back to pending.
    ///
    /// A running task in a checkpoint was interrupted mid-dispatch; its
    /// outcome was never committed, so it is dispatched again on resume.
    pub fn requeue_running(&mut self) -> Vec<u64> {
        let mut requeued = Vec::new();
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Pending;
                task.result = None;
                requeued.push(task.id);
            }
        }
        requeued
    }

    fn status_of(&self, id: u64) -> Result<TaskStatus, GraphError> {
        self.tasks
            .get(&id)
            .map(|t| t.status)
            .ok_or(GraphError::TaskNotFound(id))
    }

    fn transition(&mut self, id: u64, to: TaskStatus) -> Result<&mut SubTask, GraphError> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or(GraphError::TaskNotFound(id))?;
        if !task.status.can_transition_to(to) {
            return Err(GraphError::InvalidTransition {
                id,
                from: task.status,
                to,
            });
        }
        task.status = to;
        Ok(task)
    }

    /// Skips pending tasks that depend on a failed or skipped task, until a fixpoint.
    fn cascade_skips(&mut self) -> Vec<u64> {
        let mut skipped = Vec::new();
        loop {
            let blocked: Vec<(u64, u64, TaskStatus)> = self
                .tasks
                .values()
                .filter(|t| t.status == TaskStatus::Pending)
                .filter_map(|t| {
                    t.dependencies.iter().find_map(|dep| {
                        let dep_status = self.tasks.get(dep)?.status;
                        matches!(dep_status, TaskStatus::Failed | TaskStatus::Skipped)
                            .then_some((t.id, *dep, dep_status))
                    })
                })
                .collect();
            if blocked.is_empty() {
                return skipped;
            }
            for (id, dep, dep_status) in blocked {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.status = TaskStatus::Skipped;
                    task.result = Some(format!("skipped: dependency {} {}", dep, dep_status));
                    skipped.push(id);
                }
            }
        }
    }
}

impl TryFrom<Vec<SubTask>> for TaskGraph {
    type Error = GraphError;

    fn try_from(tasks: Vec<SubTask>) -> Result<Self, Self::Error> {
        TaskGraph::from_tasks(tasks)
    }
}

impl From<TaskGraph> for Vec<SubTask> {
    fn from(mut graph: TaskGraph) -> Self {
        graph
            .order
            .iter()
            .filter_map(|id| graph.tasks.remove(id))
            .collect()
    }
}
