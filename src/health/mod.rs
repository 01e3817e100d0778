use crate::apps::AppDefinition;
use async_trait::async_trait;

/// External health-check subsystem. Probing is its business; the core
/// only tells it which definitions are current and when an app dies.
#[async_trait]
pub trait HealthCheckManager: Send + Sync {
    /// Align active probes with the given definition's declarations.
    async fn reconcile_with(&self, app: &AppDefinition);

    /// Drop every probe for the app.
    async fn remove_all_for(&self, app_id: &str);
}

/// No-op manager for embedders without health checking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHealthCheckManager;

#[async_trait]
impl HealthCheckManager for NullHealthCheckManager {
    async fn reconcile_with(&self, app: &AppDefinition) {
        tracing::debug!(app_id = %app.id, checks = app.health_checks.len(), "health reconcile ignored");
    }

    async fn remove_all_for(&self, app_id: &str) {
        tracing::debug!(app_id, "health removal ignored");
    }
}
