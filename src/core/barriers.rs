use crate::tasks::TaskState;
use std::collections::HashMap;
use tokio::sync::{oneshot, Mutex};

struct Barrier {
    remaining: usize,
    done: oneshot::Sender<bool>,
}

/// Countdown barriers keyed by (app id, awaited task state).
///
/// A barrier resolves `true` after its count of matching status
/// updates, or `false` when removed first. The one-shot completion
/// channel makes the Pending/Resolved transition idempotent: a barrier
/// fires at most once, and late sends are dropped.
#[derive(Default)]
pub struct StartupCallbackManager {
    barriers: Mutex<HashMap<(String, TaskState), Vec<Barrier>>>,
}

impl StartupCallbackManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a barrier awaiting `count` updates of `state` for the
    /// app. A zero count resolves `true` immediately. Multiple barriers
    /// may share a key; all are driven by the same countdown stream.
    pub async fn add(
        &self,
        app_id: &str,
        state: TaskState,
        count: usize,
    ) -> oneshot::Receiver<bool> {
        let (done, outcome) = oneshot::channel();
        if count == 0 {
            let _ = done.send(true);
            return outcome;
        }
        self.barriers
            .lock()
            .await
            .entry((app_id.to_string(), state))
            .or_default()
            .push(Barrier {
                remaining: count,
                done,
            });
        outcome
    }

    /// Cancel every barrier registered for the key, resolving `false`.
    pub async fn remove(&self, app_id: &str, state: TaskState) {
        let cancelled = self
            .barriers
            .lock()
            .await
            .remove(&(app_id.to_string(), state));
        if let Some(barriers) = cancelled {
            for barrier in barriers {
                let _ = barrier.done.send(false);
            }
        }
    }

    /// Decrement every barrier for the key by one and resolve those
    /// reaching zero with `true`.
    pub async fn countdown(&self, app_id: &str, state: TaskState) {
        let mut barriers = self.barriers.lock().await;
        let key = (app_id.to_string(), state);
        if let Some(list) = barriers.get_mut(&key) {
            let mut index = 0;
            while index < list.len() {
                list[index].remaining -= 1;
                if list[index].remaining == 0 {
                    let fired = list.swap_remove(index);
                    let _ = fired.done.send(true);
                } else {
                    index += 1;
                }
            }
            if list.is_empty() {
                barriers.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn barrier_fires_after_count_updates() {
        let callbacks = StartupCallbackManager::new();
        let outcome = callbacks.add("web", TaskState::Running, 2).await;

        callbacks.countdown("web", TaskState::Running).await;
        callbacks.countdown("web", TaskState::Running).await;
        assert_eq!(outcome.await, Ok(true));
    }

    #[tokio::test]
    async fn remove_resolves_false() {
        let callbacks = StartupCallbackManager::new();
        let outcome = callbacks.add("web", TaskState::Running, 3).await;

        callbacks.countdown("web", TaskState::Running).await;
        callbacks.remove("web", TaskState::Running).await;
        assert_eq!(outcome.await, Ok(false));
    }

    #[tokio::test]
    async fn zero_count_resolves_immediately() {
        let callbacks = StartupCallbackManager::new();
        let outcome = callbacks.add("web", TaskState::Running, 0).await;
        assert_eq!(outcome.await, Ok(true));
    }

    #[tokio::test]
    async fn countdown_only_touches_matching_keys() {
        let callbacks = StartupCallbackManager::new();
        let running = callbacks.add("web", TaskState::Running, 1).await;
        let mut killed = callbacks.add("web", TaskState::Killed, 1).await;

        callbacks.countdown("web", TaskState::Running).await;
        callbacks.countdown("db", TaskState::Killed).await;

        assert_eq!(running.await, Ok(true));
        assert!(killed.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_barriers_share_one_countdown_stream() {
        let callbacks = StartupCallbackManager::new();
        let first = callbacks.add("web", TaskState::Killed, 1).await;
        let second = callbacks.add("web", TaskState::Killed, 2).await;

        callbacks.countdown("web", TaskState::Killed).await;
        assert_eq!(first.await, Ok(true));

        callbacks.countdown("web", TaskState::Killed).await;
        assert_eq!(second.await, Ok(true));
    }
}
