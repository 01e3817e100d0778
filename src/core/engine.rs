use crate::apps::{AppDefinition, AppUpdate};
use crate::config::SchedulerConfig;
use crate::core::barriers::StartupCallbackManager;
use crate::core::upgrade::UpgradeCoordinator;
use crate::driver::{Driver, TaskInfo};
use crate::events::{EventBus, SchedulerEvent};
use crate::health::HealthCheckManager;
use crate::leadership::LeadershipCoordinator;
use crate::offers::{Offer, TaskBuilder};
use crate::storage::{AppRepository, FrameworkIdStore};
use crate::tasks::{LaunchQueue, Task, TaskKnowledge, TaskState, TaskStatus, TaskTracker};
use crate::utils::error::{SchedulerError, SchedulerResult};
use crate::utils::ids;
use crate::utils::rate_limiter::ScalingRateLimiter;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Seam invoked after `update_app` persists a patched definition.
///
/// The shipped default does nothing: an update stores the new version
/// and reconciles health checks, but running tasks stay on the old
/// version until the app is upgraded or its tasks are replaced through
/// ordinary scaling.
#[async_trait]
pub trait UpdateStrategy: Send + Sync {
    async fn on_update(
        &self,
        previous: &AppDefinition,
        updated: &AppDefinition,
    ) -> SchedulerResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUpdateStrategy;

#[async_trait]
impl UpdateStrategy for NoopUpdateStrategy {
    async fn on_update(
        &self,
        _previous: &AppDefinition,
        updated: &AppDefinition,
    ) -> SchedulerResult<()> {
        debug!(app_id = %updated.id, version = %updated.version, "update persisted; no propagation");
        Ok(())
    }
}

/// External collaborators injected at engine construction.
pub struct Collaborators {
    pub driver: Arc<dyn Driver>,
    pub repository: Arc<dyn AppRepository>,
    pub health: Arc<dyn HealthCheckManager>,
    pub leadership: Arc<dyn LeadershipCoordinator>,
    pub framework_ids: Arc<dyn FrameworkIdStore>,
    pub builder: Arc<dyn TaskBuilder>,
    pub events: Arc<EventBus>,
}

/// The scheduler engine: offer matching, the status-update state
/// machine, the per-app scaling controller, upgrade orchestration and
/// task reconciliation.
///
/// Cheap to clone; all state is shared. Driver callbacks may arrive on
/// any thread, concurrently with control-plane calls. Offer batches are
/// serialized by a dispatch lock so the queue's drain+match+re-enqueue
/// sequence is never interleaved; scaling is serialized per app.
#[derive(Clone)]
pub struct SchedulerEngine {
    config: SchedulerConfig,
    driver: Arc<dyn Driver>,
    repository: Arc<dyn AppRepository>,
    health: Arc<dyn HealthCheckManager>,
    leadership: Arc<dyn LeadershipCoordinator>,
    framework_ids: Arc<dyn FrameworkIdStore>,
    builder: Arc<dyn TaskBuilder>,
    update_strategy: Arc<dyn UpdateStrategy>,
    events: Arc<EventBus>,
    queue: Arc<LaunchQueue>,
    tracker: Arc<TaskTracker>,
    rate_limiter: Arc<ScalingRateLimiter>,
    callbacks: Arc<StartupCallbackManager>,
    upgrades: Arc<UpgradeCoordinator>,
    /// Apps with an upgrade in progress; the reactive scale controller
    /// must leave these alone. Read under the per-app scale lock.
    scaling_apps: Arc<Mutex<HashSet<String>>>,
    app_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    offer_dispatch: Arc<Mutex<()>>,
    connected: Arc<AtomicBool>,
}

impl SchedulerEngine {
    #[must_use]
    pub fn new(config: SchedulerConfig, collaborators: Collaborators) -> Self {
        let queue = Arc::new(LaunchQueue::new());
        let tracker = Arc::new(TaskTracker::new());
        let callbacks = Arc::new(StartupCallbackManager::new());
        let upgrades = Arc::new(UpgradeCoordinator::new(
            Arc::clone(&collaborators.driver),
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&callbacks),
            Arc::clone(&collaborators.events),
        ));
        Self {
            config,
            driver: collaborators.driver,
            repository: collaborators.repository,
            health: collaborators.health,
            leadership: collaborators.leadership,
            framework_ids: collaborators.framework_ids,
            builder: collaborators.builder,
            update_strategy: Arc::new(NoopUpdateStrategy),
            events: collaborators.events,
            queue,
            tracker,
            rate_limiter: Arc::new(ScalingRateLimiter::new()),
            callbacks,
            upgrades,
            scaling_apps: Arc::new(Mutex::new(HashSet::new())),
            app_locks: Arc::new(DashMap::new()),
            offer_dispatch: Arc::new(Mutex::new(())),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_update_strategy(mut self, strategy: Arc<dyn UpdateStrategy>) -> Self {
        self.update_strategy = strategy;
        self
    }

    #[must_use]
    pub fn task_queue(&self) -> Arc<LaunchQueue> {
        Arc::clone(&self.queue)
    }

    #[must_use]
    pub fn task_tracker(&self) -> Arc<TaskTracker> {
        Arc::clone(&self.tracker)
    }

    #[must_use]
    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    // ---- driver callbacks ------------------------------------------------

    pub async fn registered(&self, framework_id: &str) {
        self.connected.store(true, Ordering::SeqCst);
        if let Err(err) = self.framework_ids.store(framework_id).await {
            warn!(error = %err, "could not persist framework id");
        }
        info!(framework_id, "registered with cluster manager");
    }

    /// Re-registration after a disconnect. Reconciliation runs after a
    /// settle delay so the driver has a chance to flush queued updates
    /// first.
    pub async fn reregistered(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!(
            delay_secs = self.config.reconciliation_delay_secs,
            "re-registered; scheduling reconciliation"
        );
        let engine = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(engine.config.reconciliation_delay()).await;
            if let Err(err) = engine.reconcile_tasks().await {
                warn!(error = %err, "post-reregistration reconciliation failed");
            }
        });
    }

    /// Handle a batch of offers. Every offer is answered exactly once:
    /// launched on a first-fit match, declined otherwise (including on
    /// any handling error).
    pub async fn resource_offers(&self, offers: Vec<Offer>) {
        let _dispatch = self.offer_dispatch.lock().await;

        for task in self.tracker.check_staged_tasks(self.config.staging_grace()) {
            warn!(task_id = %task.id, app_id = %task.app_id, "killing task stuck in staging");
            self.driver.kill_task(&task.id).await;
        }

        for offer in offers {
            match self.match_offer(&offer).await {
                Ok(Some((app, task_info))) => {
                    info!(
                        offer_id = %offer.id,
                        task_id = %task_info.task_id,
                        app_id = %app.id,
                        host = %offer.hostname,
                        "🚀 launching task"
                    );
                    let task = Task::new(
                        task_info.task_id.clone(),
                        app.id.clone(),
                        offer.hostname.clone(),
                        task_info.ports.clone(),
                        app.version.clone(),
                    );
                    self.tracker.starting(&app.id, task);
                    self.driver
                        .launch_tasks(vec![offer.id.clone()], vec![task_info])
                        .await;
                }
                Ok(None) => {
                    debug!(offer_id = %offer.id, "no matching app; declining offer");
                    self.driver.decline_offer(&offer.id).await;
                }
                Err(err) => {
                    warn!(offer_id = %offer.id, error = %err, "offer handling failed; declining");
                    self.driver.decline_offer(&offer.id).await;
                }
            }
        }
    }

    /// Drain the queue, return the first app the builder can place on
    /// this offer, and re-queue everything else in its original order.
    async fn match_offer(
        &self,
        offer: &Offer,
    ) -> SchedulerResult<Option<(AppDefinition, TaskInfo)>> {
        let drained = self.queue.remove_all().await;
        let mut matched: Option<(AppDefinition, TaskInfo)> = None;
        let mut leftover = Vec::with_capacity(drained.len());
        for app in drained {
            if matched.is_none() {
                if let Some((task_info, _ports)) = self.builder.build_if_matches(&app, offer) {
                    // TODO: launch more than one task per offer when the
                    // remaining resources still fit another queued app
                    matched = Some((app, task_info));
                    continue;
                }
            }
            leftover.push(app);
        }
        self.queue.add_all(leftover).await;
        Ok(matched)
    }

    pub async fn offer_rescinded(&self, offer_id: &str) {
        debug!(offer_id, "offer rescinded");
    }

    /// Dispatch one task-status transition, then drive the upgrade
    /// barriers for the (app, state) pair.
    pub async fn status_update(&self, status: TaskStatus) {
        let Some(app_id) = ids::app_id_for_task(&status.task_id).map(str::to_owned) else {
            warn!(task_id = %status.task_id, "malformed task id in status update; killing");
            self.driver.kill_task(&status.task_id).await;
            return;
        };
        debug!(task_id = %status.task_id, app_id = %app_id, state = ?status.state, "status update");

        match status.state {
            state if state.is_terminal() => self.handle_terminal(&app_id, &status).await,
            TaskState::Running => self.handle_running(&app_id, &status).await,
            TaskState::Staging if !self.tracker.contains(&app_id) => {
                warn!(task_id = %status.task_id, app_id = %app_id, "staging task for unknown app; killing");
                self.driver.kill_task(&status.task_id).await;
            }
            _ => {
                if self.tracker.status_update(&app_id, &status) == TaskKnowledge::Unknown {
                    warn!(task_id = %status.task_id, "status update for unknown task; killing");
                    self.driver.kill_task(&status.task_id).await;
                }
            }
        }

        self.callbacks.countdown(&app_id, status.state).await;
    }

    async fn handle_terminal(&self, app_id: &str, status: &TaskStatus) {
        let Some(task) = self.tracker.terminated(app_id, status) else {
            debug!(task_id = %status.task_id, "terminal status for unknown task");
            return;
        };
        if let Err(err) = self.events.publish(SchedulerEvent::TaskStatusUpdate {
            task_id: status.task_id.clone(),
            app_id: app_id.to_string(),
            state: status.state,
            message: status.message.clone(),
            host: task.host.clone(),
            ports: task.ports.clone(),
            slave_id: status.slave_id.clone(),
        }) {
            warn!(error = %err, "could not publish terminal status event");
        }

        if self.rate_limiter.try_acquire(app_id).await {
            let engine = self.clone();
            let app_id = app_id.to_string();
            tokio::spawn(async move {
                if let Err(err) = engine.scale_app_by_id(&app_id).await {
                    warn!(app_id = %app_id, error = %err, "rescale after task loss failed");
                }
            });
        } else {
            info!(app_id = %app_id, "rescale suppressed by rate limiter");
        }
    }

    async fn handle_running(&self, app_id: &str, status: &TaskStatus) {
        match self.tracker.running(app_id, status) {
            Ok(task) => {
                let event = SchedulerEvent::TaskStatusUpdate {
                    task_id: status.task_id.clone(),
                    app_id: app_id.to_string(),
                    state: TaskState::Running,
                    message: status.message.clone(),
                    host: task.host.clone(),
                    ports: task.ports.clone(),
                    slave_id: status.slave_id.clone(),
                };
                if self.events.publish(event).is_err() {
                    warn!(task_id = %status.task_id, "running update could not be published; killing task");
                    self.driver.kill_task(&status.task_id).await;
                }
            }
            Err(_) => {
                warn!(task_id = %status.task_id, "running status for unknown task; killing");
                self.driver.kill_task(&status.task_id).await;
            }
        }
    }

    pub async fn framework_message(&self, executor_id: &str, slave_id: &str, payload: Vec<u8>) {
        if let Err(err) = self.events.publish(SchedulerEvent::FrameworkMessage {
            executor_id: executor_id.to_string(),
            slave_id: slave_id.to_string(),
            payload,
        }) {
            warn!(error = %err, "could not publish framework message");
        }
    }

    /// The driver lost its connection. Not an error: abdicate so a peer
    /// can take over, and stay quiet until re-registration.
    pub async fn disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        warn!("disconnected from cluster manager; abdicating leadership");
        self.leadership.abdicate().await;
    }

    pub async fn slave_lost(&self, slave_id: &str) {
        warn!(slave_id, "slave lost");
    }

    pub async fn executor_lost(&self, executor_id: &str, slave_id: &str) {
        warn!(executor_id, slave_id, "executor lost");
    }

    /// Fatal driver error: the framework is no longer valid. The
    /// termination request runs off this callback's stack so process
    /// shutdown hooks cannot deadlock against the driver thread.
    pub async fn error(&self, message: &str) {
        error!(driver_error = message, "fatal driver error; scheduling termination");
        self.connected.store(false, Ordering::SeqCst);
        let leadership = Arc::clone(&self.leadership);
        tokio::spawn(async move {
            leadership.terminate().await;
        });
    }

    // ---- control operations ----------------------------------------------

    /// Create an app: persist it, configure its rate limiter, bring it
    /// to scale and hand its health checks over.
    pub async fn start_app(&self, app: AppDefinition) -> SchedulerResult<()> {
        app.validate()?;
        if self.repository.current_version(&app.id).await?.is_some() {
            return Err(SchedulerError::AppAlreadyExists { id: app.id });
        }
        let stored = self
            .repository
            .store(app.clone())
            .await?
            .ok_or_else(|| SchedulerError::Storage {
                reason: format!("store returned nothing for {}", app.id),
            })?;
        self.rate_limiter
            .set_permits(&stored.id, stored.task_rate_limit)
            .await;
        info!(app_id = %stored.id, instances = stored.instances, "starting app");
        self.scale_app(&stored).await?;
        self.health.reconcile_with(&stored).await;
        Ok(())
    }

    /// Destroy an app: expunge all versions, then tear down health
    /// checks, running tasks, queue entries and the tracker entry.
    pub async fn stop_app(&self, app: &AppDefinition) -> SchedulerResult<()> {
        let expunged = self.repository.expunge(&app.id).await?;
        if !expunged.iter().all(|ok| *ok) {
            return Err(SchedulerError::Storage {
                reason: format!("expunge failed for {}", app.id),
            });
        }
        self.health.remove_all_for(&app.id).await;
        let tasks = self.tracker.get(&app.id);
        join_all(tasks.iter().map(|task| self.driver.kill_task(&task.id))).await;
        self.queue.purge(&app.id).await;
        // TODO: defer the tracker cleanup until the kills are
        // acknowledged so a late status update cannot resurrect the app
        self.tracker.shut_down(&app.id);
        self.rate_limiter.remove(&app.id).await;
        self.app_locks.remove(&app.id);
        info!(app_id = %app.id, killed = tasks.len(), "stopped app");
        Ok(())
    }

    /// Patch the current definition and persist the successor. The
    /// update strategy decides what, if anything, happens to running
    /// tasks.
    pub async fn update_app(
        &self,
        app_id: &str,
        update: &AppUpdate,
    ) -> SchedulerResult<AppDefinition> {
        let current = self
            .repository
            .current_version(app_id)
            .await?
            .ok_or_else(|| SchedulerError::UnknownApp {
                id: app_id.to_string(),
            })?;
        let patched = update.apply(&current);
        self.health.reconcile_with(&patched).await;
        let stored = self
            .repository
            .store(patched)
            .await?
            .ok_or_else(|| SchedulerError::Storage {
                reason: format!("store returned nothing for {app_id}"),
            })?;
        self.update_strategy.on_update(&current, &stored).await?;
        info!(app_id, version = %stored.version, "updated app");
        Ok(stored)
    }

    /// Upgrade the app to a new definition, keeping `keep_alive` of the
    /// currently running instances alive throughout. Emits
    /// `RestartSuccess` or `RestartFailed` on completion.
    pub async fn upgrade_app(&self, app: AppDefinition, keep_alive: usize) -> SchedulerResult<()> {
        {
            let mut scaling = self.scaling_apps.lock().await;
            if !scaling.insert(app.id.clone()) {
                return Err(SchedulerError::UpgradeFailed {
                    app_id: app.id.clone(),
                    reason: "upgrade already in progress".to_string(),
                });
            }
        }
        info!(app_id = %app.id, keep_alive, version = %app.version, "upgrading app");
        let outcome = self.run_upgrade(&app, keep_alive).await;
        self.scaling_apps.lock().await.remove(&app.id);

        match outcome {
            Ok(true) => {
                info!(app_id = %app.id, "upgrade succeeded");
                self.publish_restart_outcome(&app.id, None);
                Ok(())
            }
            Ok(false) => {
                let reason = "restart phases failed".to_string();
                self.publish_restart_outcome(&app.id, Some(reason.clone()));
                Err(SchedulerError::UpgradeFailed {
                    app_id: app.id.clone(),
                    reason,
                })
            }
            Err(err) => {
                self.publish_restart_outcome(&app.id, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn run_upgrade(&self, app: &AppDefinition, keep_alive: usize) -> SchedulerResult<bool> {
        self.repository
            .store(app.clone())
            .await?
            .ok_or_else(|| SchedulerError::Storage {
                reason: format!("store returned nothing for {}", app.id),
            })?;
        self.rate_limiter
            .set_permits(&app.id, app.task_rate_limit)
            .await;
        self.upgrades.run(app, keep_alive).await
    }

    fn publish_restart_outcome(&self, app_id: &str, failure: Option<String>) {
        let event = match failure {
            None => SchedulerEvent::RestartSuccess {
                app_id: app_id.to_string(),
            },
            Some(reason) => SchedulerEvent::RestartFailed {
                app_id: app_id.to_string(),
                reason,
            },
        };
        if let Err(err) = self.events.publish(event) {
            warn!(app_id, error = %err, "could not publish restart outcome");
        }
    }

    // ---- scaling ---------------------------------------------------------

    /// Converge the app's task count toward its declared instances.
    /// No-op while an upgrade owns the app.
    pub async fn scale_app(&self, app: &AppDefinition) -> SchedulerResult<()> {
        let lock = self.app_lock(&app.id);
        let _guard = lock.lock().await;
        if self.scaling_apps.lock().await.contains(&app.id) {
            debug!(app_id = %app.id, "scale skipped; upgrade in progress");
            return Ok(());
        }

        let current = self.tracker.count(&app.id);
        let target = app.instances as usize;
        if target > current {
            let queued = self.queue.count(&app.id).await;
            let missing = target.saturating_sub(current + queued);
            if missing > 0 {
                info!(app_id = %app.id, current, queued, missing, "queueing launches");
                self.queue.add_all(vec![app.clone(); missing]).await;
            } else {
                debug!(app_id = %app.id, current, queued, "scale-up already queued");
            }
        } else if target < current {
            let surplus = current - target;
            info!(app_id = %app.id, current, target, surplus, "scaling down");
            self.queue.purge(&app.id).await;
            let doomed = self.tracker.take(&app.id, surplus);
            join_all(doomed.iter().map(|task| self.driver.kill_task(&task.id))).await;
        }
        Ok(())
    }

    /// Resolve the latest stored definition and scale to it.
    pub async fn scale_app_by_id(&self, app_id: &str) -> SchedulerResult<()> {
        match self.repository.current_version(app_id).await? {
            Some(app) => self.scale_app(&app).await,
            None => {
                warn!(app_id, "scale requested for unknown app");
                Ok(())
            }
        }
    }

    fn app_lock(&self, app_id: &str) -> Arc<Mutex<()>> {
        self.app_locks
            .entry(app_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ---- reconciliation --------------------------------------------------

    /// Realign the in-memory view with the cluster manager: rescale
    /// every stored app, expunge tracked apps the repository no longer
    /// knows, and submit the freshest known statuses in one batch.
    pub async fn reconcile_tasks(&self) -> SchedulerResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            debug!("reconciliation skipped while disconnected");
            return Ok(());
        }
        let ids = match self.repository.all_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "could not enumerate apps; skipping reconciliation");
                return Ok(());
            }
        };
        let stored: HashSet<&String> = ids.iter().collect();

        let mut statuses = Vec::new();
        for app_id in &ids {
            if let Err(err) = self.scale_app_by_id(app_id).await {
                warn!(app_id = %app_id, error = %err, "reconciliation scale failed");
            }
            for task in self.tracker.get(app_id) {
                if let Some(status) = task.latest_status() {
                    statuses.push(status.clone());
                }
            }
        }

        for app_id in self.tracker.app_ids() {
            if !stored.contains(&app_id) {
                warn!(app_id = %app_id, "tracked app missing from repository; expunging");
                let orphans = self.tracker.get(&app_id);
                join_all(orphans.iter().map(|task| self.driver.kill_task(&task.id))).await;
                self.tracker.expunge(&app_id);
                self.rate_limiter.remove(&app_id).await;
                self.app_locks.remove(&app_id);
            }
        }

        info!(statuses = statuses.len(), "🔄 reconciling task statuses");
        self.driver.reconcile_tasks(statuses).await;
        Ok(())
    }
}
