use crate::tasks::TaskStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Launch specification handed to the driver for one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskInfo {
    pub task_id: String,
    pub app_id: String,
    pub slave_id: String,
    pub host: String,
    pub cmd: String,
    pub container: Option<String>,
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub ports: Vec<u16>,
    pub uris: Vec<String>,
    pub env: HashMap<String, String>,
    /// App definition version the task is launched from.
    pub version: String,
}

/// Client library representing the cluster manager to the framework.
///
/// All calls are non-blocking submissions with best-effort delivery;
/// the cluster manager remains authoritative for task state, so none of
/// these return a result to act on.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Launch tasks against the given offers. At-most-once per offer.
    async fn launch_tasks(&self, offer_ids: Vec<String>, tasks: Vec<TaskInfo>);

    /// Release an offer without using it.
    async fn decline_offer(&self, offer_id: &str);

    /// Ask the cluster manager to kill a task. Best effort, no retry.
    async fn kill_task(&self, task_id: &str);

    /// Submit known statuses for reconciliation after a reconnect.
    async fn reconcile_tasks(&self, statuses: Vec<TaskStatus>);
}
