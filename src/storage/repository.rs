use crate::apps::AppDefinition;
use crate::utils::error::SchedulerResult;
use async_trait::async_trait;

/// Persistent application repository, versioned per app.
///
/// The engine never owns persistence; it consumes this contract and
/// treats the repository as the source of truth for definitions.
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Latest stored definition for the app, if any version exists.
    async fn current_version(&self, app_id: &str) -> SchedulerResult<Option<AppDefinition>>;

    /// Store a definition under its version. Returns the stored value,
    /// or `None` when the write was not applied.
    async fn store(&self, app: AppDefinition) -> SchedulerResult<Option<AppDefinition>>;

    /// Remove every version of the app. One success flag per version.
    async fn expunge(&self, app_id: &str) -> SchedulerResult<Vec<bool>>;

    /// Ids of all apps with at least one stored version.
    async fn all_ids(&self) -> SchedulerResult<Vec<String>>;
}

/// Store for the opaque framework id handed out at registration.
/// Persisting it verbatim preserves the framework's identity across
/// leader handovers.
#[async_trait]
pub trait FrameworkIdStore: Send + Sync {
    async fn fetch(&self) -> SchedulerResult<Option<String>>;

    async fn store(&self, framework_id: &str) -> SchedulerResult<()>;
}
