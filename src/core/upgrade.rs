use crate::apps::AppDefinition;
use crate::core::barriers::StartupCallbackManager;
use crate::core::replace;
use crate::driver::Driver;
use crate::events::{EventBus, SchedulerEvent};
use crate::tasks::{LaunchQueue, Task, TaskState, TaskTracker};
use crate::utils::error::{SchedulerError, SchedulerResult};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Sequences the kill/start/replace phases of an app upgrade.
///
/// Each phase is an independent future resolving to a success flag; the
/// orchestration joins them and ANDs the results. The engine owns the
/// `scaling_apps` bookkeeping, definition persistence and restart event
/// emission around a run.
pub struct UpgradeCoordinator {
    driver: Arc<dyn Driver>,
    queue: Arc<LaunchQueue>,
    tracker: Arc<TaskTracker>,
    callbacks: Arc<StartupCallbackManager>,
    events: Arc<EventBus>,
}

impl UpgradeCoordinator {
    #[must_use]
    pub fn new(
        driver: Arc<dyn Driver>,
        queue: Arc<LaunchQueue>,
        tracker: Arc<TaskTracker>,
        callbacks: Arc<StartupCallbackManager>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            driver,
            queue,
            tracker,
            callbacks,
            events,
        }
    }

    /// Run the restart appropriate for the app's health checks and the
    /// requested keep-alive. Returns whether every phase succeeded.
    pub(crate) async fn run(&self, app: &AppDefinition, keep_alive: usize) -> SchedulerResult<bool> {
        let mut existing = self.tracker.get(&app.id);
        existing.sort_by(|a, b| a.started_at.cmp(&b.started_at));

        if !app.health_checks.is_empty() && keep_alive > 0 {
            Ok(self.restart_with_health_checks(app, keep_alive, existing).await)
        } else if keep_alive == 0 {
            Ok(self.immediate_restart(app, existing).await)
        } else {
            Err(SchedulerError::UpgradeFailed {
                app_id: app.id.clone(),
                reason: "keep-alive restart requires health checks".to_string(),
            })
        }
    }

    /// Kill the oldest `total - keep_alive` immediately, bring up a full
    /// set of new instances, and roll the survivors out one-by-one as
    /// replacements come up.
    async fn restart_with_health_checks(
        &self,
        app: &AppDefinition,
        keep_alive: usize,
        existing: Vec<Task>,
    ) -> bool {
        let kill_count = existing.len().saturating_sub(keep_alive);
        let (doomed, survivors) = existing.split_at(kill_count);
        info!(
            app_id = %app.id,
            doomed = doomed.len(),
            survivors = survivors.len(),
            instances = app.instances,
            "rolling restart with health checks"
        );

        // Subscribe before any kill is issued so the survivor snapshot
        // and the event stream agree.
        let events = self.events.subscribe();
        let (killed, started, replaced) = tokio::join!(
            self.kill(&app.id, doomed),
            self.start(app, app.instances as usize),
            self.replace(&app.id, events, survivors),
        );
        killed && started && replaced
    }

    /// Kill every existing task and start a fresh set.
    async fn immediate_restart(&self, app: &AppDefinition, existing: Vec<Task>) -> bool {
        info!(
            app_id = %app.id,
            existing = existing.len(),
            instances = app.instances,
            "immediate restart"
        );
        let (killed, started) = tokio::join!(
            self.kill(&app.id, &existing),
            self.start(app, app.instances as usize),
        );
        killed && started
    }

    /// Barrier-gated kill of the given tasks.
    async fn kill(&self, app_id: &str, doomed: &[Task]) -> bool {
        if doomed.is_empty() {
            return true;
        }
        let outcome = self
            .callbacks
            .add(app_id, TaskState::Killed, doomed.len())
            .await;
        join_all(doomed.iter().map(|task| self.driver.kill_task(&task.id))).await;
        outcome.await.unwrap_or(false)
    }

    /// Enqueue `count` launches and wait for as many RUNNING updates.
    /// A single FAILED update during the phase aborts it; failures of
    /// tasks that were already running are ordinary scaling business.
    async fn start(&self, app: &AppDefinition, count: usize) -> bool {
        let mut running = self.callbacks.add(&app.id, TaskState::Running, count).await;
        let mut failed = self.callbacks.add(&app.id, TaskState::Failed, 1).await;
        self.queue.add_all(vec![app.clone(); count]).await;

        tokio::select! {
            outcome = &mut running => {
                self.callbacks.remove(&app.id, TaskState::Failed).await;
                outcome.unwrap_or(false)
            }
            outcome = &mut failed => match outcome {
                Ok(true) => {
                    warn!(app_id = %app.id, "task failed during start phase; aborting");
                    self.callbacks.remove(&app.id, TaskState::Running).await;
                    false
                }
                // The failed barrier was cancelled externally; the
                // running barrier still decides the phase.
                _ => running.await.unwrap_or(false),
            },
        }
    }

    /// Delegate the rolling replace of the survivors to a one-shot
    /// worker; nothing to replace resolves immediately.
    async fn replace(
        &self,
        app_id: &str,
        events: broadcast::Receiver<SchedulerEvent>,
        survivors: &[Task],
    ) -> bool {
        if survivors.is_empty() {
            return true;
        }
        let survivor_ids = survivors.iter().map(|task| task.id.clone()).collect();
        let outcome = replace::spawn(
            Arc::clone(&self.driver),
            events,
            app_id.to_string(),
            survivors.len(),
            survivor_ids,
        );
        outcome.await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TaskInfo;
    use crate::tasks::TaskStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct KillLog {
        kills: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Driver for KillLog {
        async fn launch_tasks(&self, _offer_ids: Vec<String>, _tasks: Vec<TaskInfo>) {}
        async fn decline_offer(&self, _offer_id: &str) {}
        async fn kill_task(&self, task_id: &str) {
            self.kills.lock().unwrap().push(task_id.to_string());
        }
        async fn reconcile_tasks(&self, _statuses: Vec<TaskStatus>) {}
    }

    fn coordinator() -> (UpgradeCoordinator, Arc<KillLog>, Arc<StartupCallbackManager>, Arc<LaunchQueue>) {
        let driver = Arc::new(KillLog::default());
        let queue = Arc::new(LaunchQueue::new());
        let tracker = Arc::new(TaskTracker::new());
        let callbacks = Arc::new(StartupCallbackManager::new());
        let events = Arc::new(EventBus::new(64));
        let coordinator = UpgradeCoordinator::new(
            Arc::clone(&driver) as Arc<dyn Driver>,
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&callbacks),
            events,
        );
        (coordinator, driver, callbacks, queue)
    }

    #[tokio::test]
    async fn keep_alive_without_health_checks_is_rejected() {
        let (coordinator, _, _, _) = coordinator();
        let app = AppDefinition::new("web").with_instances(3);
        let result = coordinator.run(&app, 2).await;
        assert!(matches!(
            result,
            Err(SchedulerError::UpgradeFailed { .. })
        ));
    }

    #[tokio::test]
    async fn start_phase_enqueues_and_waits_for_running() {
        let (coordinator, _, callbacks, queue) = coordinator();
        let app = AppDefinition::new("web").with_instances(2);

        let phase = coordinator.start(&app, 2);
        let countdowns = async {
            // Wait for the launches to be enqueued, then feed updates.
            while queue.len().await < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            callbacks.countdown("web", TaskState::Running).await;
            callbacks.countdown("web", TaskState::Running).await;
        };
        let (succeeded, ()) = tokio::join!(phase, countdowns);
        assert!(succeeded);
        assert_eq!(queue.count("web").await, 2);
    }

    #[tokio::test]
    async fn start_phase_aborts_on_failure() {
        let (coordinator, _, callbacks, queue) = coordinator();
        let app = AppDefinition::new("web").with_instances(2);

        let phase = coordinator.start(&app, 2);
        let countdowns = async {
            while queue.len().await < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            callbacks.countdown("web", TaskState::Running).await;
            callbacks.countdown("web", TaskState::Failed).await;
        };
        let (succeeded, ()) = tokio::join!(phase, countdowns);
        assert!(!succeeded);
    }

    #[tokio::test]
    async fn kill_phase_waits_for_killed_updates() {
        let (coordinator, driver, callbacks, _) = coordinator();
        let doomed = vec![
            Task::new("web.1", "web", "node-1", vec![], "v1"),
            Task::new("web.2", "web", "node-1", vec![], "v1"),
        ];

        let phase = coordinator.kill("web", &doomed);
        let countdowns = async {
            while driver.kills.lock().unwrap().len() < 2 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            callbacks.countdown("web", TaskState::Killed).await;
            callbacks.countdown("web", TaskState::Killed).await;
        };
        let (succeeded, ()) = tokio::join!(phase, countdowns);
        assert!(succeeded);
        assert_eq!(driver.kills.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_kill_and_replace_resolve_immediately() {
        let (coordinator, driver, _, _) = coordinator();
        assert!(coordinator.kill("web", &[]).await);
        let events = coordinator.events.subscribe();
        assert!(coordinator.replace("web", events, &[]).await);
        assert!(driver.kills.lock().unwrap().is_empty());
    }
}
