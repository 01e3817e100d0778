use crate::driver::Driver;
use crate::events::SchedulerEvent;
use crate::tasks::TaskState;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

/// One-shot rolling-replace worker.
///
/// Spawned per upgrade with a snapshot of the surviving tasks taken
/// before any kills were issued. It watches the event bus: each fresh
/// RUNNING task of the app that is not itself a survivor retires the
/// oldest remaining survivor, until `replacements` new tasks have come
/// up. Resolves `true` on completion, `false` if the bus closes first.
pub(crate) fn spawn(
    driver: Arc<dyn Driver>,
    mut events: broadcast::Receiver<SchedulerEvent>,
    app_id: String,
    replacements: usize,
    survivors: Vec<String>,
) -> oneshot::Receiver<bool> {
    let (done, outcome) = oneshot::channel();
    tokio::spawn(async move {
        let mut survivors: VecDeque<String> = survivors.into();
        let mut started = 0usize;
        while started < replacements {
            match events.recv().await {
                Ok(SchedulerEvent::TaskStatusUpdate {
                    task_id,
                    app_id: event_app,
                    state: TaskState::Running,
                    ..
                }) if event_app == app_id && !survivors.contains(&task_id) => {
                    started += 1;
                    if let Some(victim) = survivors.pop_front() {
                        tracing::info!(
                            app_id = %app_id,
                            replacement = %task_id,
                            victim = %victim,
                            "replacement running; retiring survivor"
                        );
                        driver.kill_task(&victim).await;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(app_id = %app_id, skipped, "replace worker lagged on event bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::warn!(app_id = %app_id, "event bus closed mid-replace");
                    let _ = done.send(false);
                    return;
                }
            }
        }
        let _ = done.send(true);
    });
    outcome
}
