use crate::tasks::task::{Task, TaskStage, TaskStatus};
use crate::utils::error::{SchedulerError, SchedulerResult};
use crate::utils::ids;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;

/// Whether a status update referred to a task the tracker knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKnowledge {
    Known,
    Unknown,
}

/// In-memory index of known tasks grouped by application.
///
/// Per-app mutation is serialized by the map's entry locking, which is
/// what makes concurrent status updates and scaling calls for the same
/// app safe. An app entry survives `shut_down` (emptied) and is only
/// forgotten by `expunge`.
#[derive(Debug, Default)]
pub struct TaskTracker {
    apps: DashMap<String, HashMap<String, Task>>,
}

impl TaskTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a unique task id carrying the app id prefix.
    #[must_use]
    pub fn new_task_id(&self, app_id: &str) -> String {
        ids::new_task_id(app_id)
    }

    /// Record launch intent before the driver acknowledges anything.
    pub fn starting(&self, app_id: &str, task: Task) {
        self.apps
            .entry(app_id.to_string())
            .or_default()
            .insert(task.id.clone(), task);
    }

    /// Promote a starting task to running and append the status.
    pub fn running(&self, app_id: &str, status: &TaskStatus) -> SchedulerResult<Task> {
        let mut entry = self
            .apps
            .get_mut(app_id)
            .ok_or_else(|| SchedulerError::UnknownTask {
                task_id: status.task_id.clone(),
            })?;
        let task = entry
            .get_mut(&status.task_id)
            .ok_or_else(|| SchedulerError::UnknownTask {
                task_id: status.task_id.clone(),
            })?;
        task.stage = TaskStage::Running;
        task.statuses.push(status.clone());
        Ok(task.clone())
    }

    /// Remove a task that reached a terminal state.
    pub fn terminated(&self, app_id: &str, status: &TaskStatus) -> Option<Task> {
        self.apps.get_mut(app_id)?.remove(&status.task_id)
    }

    /// Append a non-terminal, non-running status to the task's history.
    pub fn status_update(&self, app_id: &str, status: &TaskStatus) -> TaskKnowledge {
        match self
            .apps
            .get_mut(app_id)
            .and_then(|mut entry| entry.get_mut(&status.task_id).map(|task| {
                task.statuses.push(status.clone());
            })) {
            Some(()) => TaskKnowledge::Known,
            None => TaskKnowledge::Unknown,
        }
    }

    /// Tasks that have sat in a pre-running stage longer than `grace`.
    #[must_use]
    pub fn check_staged_tasks(&self, grace: chrono::Duration) -> Vec<Task> {
        let cutoff = Utc::now() - grace;
        self.apps
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .values()
                    .filter(|task| task.is_staged() && task.started_at < cutoff)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Snapshot of the tasks tracked for one app.
    #[must_use]
    pub fn get(&self, app_id: &str) -> Vec<Task> {
        self.apps
            .get(app_id)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, app_id: &str) -> usize {
        self.apps.get(app_id).map_or(0, |entry| entry.len())
    }

    #[must_use]
    pub fn contains(&self, app_id: &str) -> bool {
        self.apps.contains_key(app_id)
    }

    /// Select up to `n` tasks for removal, youngest first, so the
    /// older, likely-healthier tasks survive a scale-down.
    #[must_use]
    pub fn take(&self, app_id: &str, n: usize) -> Vec<Task> {
        let mut tasks = self.get(app_id);
        tasks.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        tasks.truncate(n);
        tasks
    }

    /// Snapshot of every tracked task.
    #[must_use]
    pub fn list(&self) -> Vec<Task> {
        self.apps
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Ids of every app with a tracker entry.
    #[must_use]
    pub fn app_ids(&self) -> Vec<String> {
        self.apps.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Clear the app's tasks but keep the entry.
    pub fn shut_down(&self, app_id: &str) {
        if let Some(mut entry) = self.apps.get_mut(app_id) {
            entry.clear();
        }
    }

    /// Clear the app's tasks and forget the entry entirely.
    pub fn expunge(&self, app_id: &str) {
        self.apps.remove(app_id);
    }
}
