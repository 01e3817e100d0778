use crate::apps::AppDefinition;
use crate::storage::repository::{AppRepository, FrameworkIdStore};
use crate::utils::error::SchedulerResult;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Versioned in-memory repository, suitable for tests and embedders
/// that bring their own durability.
#[derive(Debug, Default)]
pub struct InMemoryAppRepository {
    /// app id -> version -> definition; BTreeMap keeps versions ordered.
    apps: RwLock<HashMap<String, BTreeMap<String, AppDefinition>>>,
}

impl InMemoryAppRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions across all apps.
    pub async fn version_count(&self) -> usize {
        self.apps
            .read()
            .await
            .values()
            .map(BTreeMap::len)
            .sum()
    }
}

#[async_trait]
impl AppRepository for InMemoryAppRepository {
    async fn current_version(&self, app_id: &str) -> SchedulerResult<Option<AppDefinition>> {
        let apps = self.apps.read().await;
        Ok(apps
            .get(app_id)
            .and_then(|versions| versions.values().next_back().cloned()))
    }

    async fn store(&self, app: AppDefinition) -> SchedulerResult<Option<AppDefinition>> {
        let mut apps = self.apps.write().await;
        apps.entry(app.id.clone())
            .or_default()
            .insert(app.version.clone(), app.clone());
        Ok(Some(app))
    }

    async fn expunge(&self, app_id: &str) -> SchedulerResult<Vec<bool>> {
        let mut apps = self.apps.write().await;
        let removed = apps.remove(app_id).map(|versions| versions.len());
        Ok(vec![true; removed.unwrap_or(0)])
    }

    async fn all_ids(&self) -> SchedulerResult<Vec<String>> {
        Ok(self.apps.read().await.keys().cloned().collect())
    }
}

/// In-memory framework-id store.
#[derive(Debug, Default)]
pub struct InMemoryFrameworkIdStore {
    id: RwLock<Option<String>>,
}

impl InMemoryFrameworkIdStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FrameworkIdStore for InMemoryFrameworkIdStore {
    async fn fetch(&self) -> SchedulerResult<Option<String>> {
        Ok(self.id.read().await.clone())
    }

    async fn store(&self, framework_id: &str) -> SchedulerResult<()> {
        *self.id.write().await = Some(framework_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn current_version_tracks_the_latest_store() {
        let repo = InMemoryAppRepository::new();
        let v1 = AppDefinition::new("web");
        repo.store(v1.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let v2 = AppDefinition::new("web").with_instances(5);
        repo.store(v2.clone()).await.unwrap();

        let current = repo.current_version("web").await.unwrap().unwrap();
        assert_eq!(current.version, v2.version);
        assert_eq!(repo.version_count().await, 2);
    }

    #[tokio::test]
    async fn expunge_reports_one_flag_per_version() {
        let repo = InMemoryAppRepository::new();
        repo.store(AppDefinition::new("web")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        repo.store(AppDefinition::new("web").with_instances(2))
            .await
            .unwrap();

        assert_eq!(repo.expunge("web").await.unwrap(), vec![true, true]);
        assert!(repo.current_version("web").await.unwrap().is_none());
        assert!(repo.expunge("web").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn framework_id_round_trip() {
        let store = InMemoryFrameworkIdStore::new();
        assert!(store.fetch().await.unwrap().is_none());
        store.store("framework-42").await.unwrap();
        assert_eq!(store.fetch().await.unwrap().as_deref(), Some("framework-42"));
    }
}
