use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain errors for the scheduler core.
///
/// Every fallible operation in the crate returns [`SchedulerResult`];
/// failures travel as values and are never signalled by unwinding.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("App already exists: {id}")]
    AppAlreadyExists { id: String },

    #[error("Unknown app: {id}")]
    UnknownApp { id: String },

    #[error("Unknown task: {task_id}")]
    UnknownTask { task_id: String },

    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Upgrade failed for {app_id}: {reason}")]
    UpgradeFailed { app_id: String, reason: String },

    #[error("Event bus rejected publish: {reason}")]
    EventBus { reason: String },

    #[error("Invalid app definition: {reason}")]
    InvalidDefinition { reason: String },
}

/// Result type used throughout the scheduler core.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = SchedulerError::UpgradeFailed {
            app_id: "web".to_string(),
            reason: "restart phases failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Upgrade failed for web: restart phases failed"
        );
    }

    #[test]
    fn errors_are_comparable() {
        let a = SchedulerError::UnknownApp {
            id: "db".to_string(),
        };
        let b = SchedulerError::UnknownApp {
            id: "db".to_string(),
        };
        assert_eq!(a, b);
    }
}
