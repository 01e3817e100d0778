use crate::apps::AppDefinition;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// FIFO multiset of pending launches, one entry per desired task.
///
/// Draining is destructive: `remove_all` empties the queue and hands
/// the snapshot to the caller, which re-queues whatever it did not
/// launch. The engine serializes drains through its offer dispatcher,
/// so no concurrent-iteration semantics are needed here.
#[derive(Debug, Default)]
pub struct LaunchQueue {
    entries: Mutex<VecDeque<AppDefinition>>,
}

impl LaunchQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, app: AppDefinition) {
        self.entries.lock().await.push_back(app);
    }

    pub async fn add_all(&self, apps: Vec<AppDefinition>) {
        let mut entries = self.entries.lock().await;
        entries.extend(apps);
    }

    /// Drain the queue, returning the entries in FIFO order.
    pub async fn remove_all(&self) -> Vec<AppDefinition> {
        self.entries.lock().await.drain(..).collect()
    }

    /// Number of pending launches for one app.
    pub async fn count(&self, app_id: &str) -> usize {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|app| app.id == app_id)
            .count()
    }

    /// Drop every pending launch for one app.
    pub async fn purge(&self, app_id: &str) {
        self.entries.lock().await.retain(|app| app.id != app_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
