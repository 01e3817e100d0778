use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the scheduler engine.
///
/// Loading these from files or the environment is the embedding
/// service's business; the core only consumes the resolved values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Grace window before a task stuck in a pre-running stage is killed.
    pub task_launch_grace_secs: u64,
    /// Capacity of the broadcast event bus.
    pub event_capacity: usize,
    /// Delay between re-registration and the reconciliation sweep.
    pub reconciliation_delay_secs: u64,
    /// Scaling rate applied to apps that do not declare their own.
    pub default_task_rate_limit: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_launch_grace_secs: 300,
            event_capacity: 256,
            reconciliation_delay_secs: 10,
            default_task_rate_limit: 1.0,
        }
    }
}

impl SchedulerConfig {
    /// Staging grace window as a chrono duration for timestamp math.
    #[must_use]
    pub fn staging_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.task_launch_grace_secs as i64)
    }

    #[must_use]
    pub fn reconciliation_delay(&self) -> Duration {
        Duration::from_secs(self.reconciliation_delay_secs)
    }
}
