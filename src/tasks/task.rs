use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task state as reported by the cluster manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Finished | TaskState::Failed | TaskState::Killed | TaskState::Lost
        )
    }
}

/// A single status record delivered by the driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    pub message: Option<String>,
    pub slave_id: String,
}

impl TaskStatus {
    #[must_use]
    pub fn new(task_id: impl Into<String>, state: TaskState, slave_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            state,
            message: None,
            slave_id: slave_id.into(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Stage marker maintained by the tracker, distinct from the raw driver
/// state: a task is `Starting` from launch intent until the first
/// RUNNING update promotes it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStage {
    Starting,
    Running,
}

/// One running (or launching) instance of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub app_id: String,
    pub host: String,
    pub ports: Vec<u16>,
    /// App definition version this task was launched from.
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub stage: TaskStage,
    /// Status history, oldest first.
    pub statuses: Vec<TaskStatus>,
}

impl Task {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        app_id: impl Into<String>,
        host: impl Into<String>,
        ports: Vec<u16>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            app_id: app_id.into(),
            host: host.into(),
            ports,
            version: version.into(),
            started_at: Utc::now(),
            stage: TaskStage::Starting,
            statuses: Vec::new(),
        }
    }

    #[must_use]
    pub fn latest_status(&self) -> Option<&TaskStatus> {
        self.statuses.last()
    }

    #[must_use]
    pub fn is_staged(&self) -> bool {
        self.stage == TaskStage::Starting
    }
}
