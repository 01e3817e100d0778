use crate::tasks::TaskState;
use crate::utils::error::{SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Domain events emitted by the engine. Fire-and-forget: handlers do
/// not feed back into the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SchedulerEvent {
    TaskStatusUpdate {
        task_id: String,
        app_id: String,
        state: TaskState,
        message: Option<String>,
        host: String,
        ports: Vec<u16>,
        slave_id: String,
    },
    FrameworkMessage {
        executor_id: String,
        slave_id: String,
        payload: Vec<u8>,
    },
    RestartSuccess {
        app_id: String,
    },
    RestartFailed {
        app_id: String,
        reason: String,
    },
}

/// Broadcast-backed event bus shared by external consumers and the
/// upgrade machinery's replace worker.
///
/// The default constructor keeps an internal subscription alive so
/// publishing never fails just because no consumer has attached yet;
/// [`EventBus::detached`] drops that guarantee and surfaces publish
/// failures, which the engine treats per its error policy.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<SchedulerEvent>,
    _guard: Option<broadcast::Receiver<SchedulerEvent>>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, guard) = broadcast::channel(capacity);
        Self {
            tx,
            _guard: Some(guard),
        }
    }

    /// Bus without the internal keep-alive subscription.
    #[must_use]
    pub fn detached(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, _guard: None }
    }

    pub fn publish(&self, event: SchedulerEvent) -> SchedulerResult<()> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| SchedulerError::EventBus {
                reason: "no live subscribers".to_string(),
            })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
