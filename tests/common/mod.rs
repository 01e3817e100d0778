//! Shared harness for engine integration tests: recording mocks for
//! every collaborator and helpers to build apps, offers and statuses.

// Each test binary uses its own slice of the harness.
#![allow(dead_code)]

use async_trait::async_trait;
use flotilla::{
    AppDefinition, Collaborators, Driver, EventBus, HealthCheckManager, InMemoryAppRepository,
    InMemoryFrameworkIdStore, LeadershipCoordinator, Offer, OfferResources, ResourceMatcher,
    SchedulerConfig, SchedulerEngine, TaskInfo, TaskState, TaskStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Every call the engine makes into the driver, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Launch {
        offer_ids: Vec<String>,
        task_ids: Vec<String>,
    },
    Decline {
        offer_id: String,
    },
    Kill {
        task_id: String,
    },
    Reconcile {
        task_ids: Vec<String>,
    },
}

#[derive(Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<DriverCall>>,
    launched: Mutex<Vec<TaskInfo>>,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Launch specifications in launch order.
    pub fn launched(&self) -> Vec<TaskInfo> {
        self.launched.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Kill { task_id } => Some(task_id),
                _ => None,
            })
            .collect()
    }

    pub fn declines(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Decline { offer_id } => Some(offer_id),
                _ => None,
            })
            .collect()
    }

    pub fn reconciliations(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Reconcile { task_ids } => Some(task_ids),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn launch_tasks(&self, offer_ids: Vec<String>, tasks: Vec<TaskInfo>) {
        self.calls.lock().unwrap().push(DriverCall::Launch {
            offer_ids,
            task_ids: tasks.iter().map(|t| t.task_id.clone()).collect(),
        });
        self.launched.lock().unwrap().extend(tasks);
    }

    async fn decline_offer(&self, offer_id: &str) {
        self.calls.lock().unwrap().push(DriverCall::Decline {
            offer_id: offer_id.to_string(),
        });
    }

    async fn kill_task(&self, task_id: &str) {
        self.calls.lock().unwrap().push(DriverCall::Kill {
            task_id: task_id.to_string(),
        });
    }

    async fn reconcile_tasks(&self, statuses: Vec<TaskStatus>) {
        self.calls.lock().unwrap().push(DriverCall::Reconcile {
            task_ids: statuses.into_iter().map(|s| s.task_id).collect(),
        });
    }
}

#[derive(Default)]
pub struct StubLeadership {
    pub abdications: AtomicUsize,
    pub terminations: AtomicUsize,
}

impl StubLeadership {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl LeadershipCoordinator for StubLeadership {
    async fn abdicate(&self) {
        self.abdications.fetch_add(1, Ordering::SeqCst);
    }

    async fn terminate(&self) {
        self.terminations.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingHealth {
    pub reconciled: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl RecordingHealth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl HealthCheckManager for RecordingHealth {
    async fn reconcile_with(&self, app: &AppDefinition) {
        self.reconciled.lock().unwrap().push(app.id.clone());
    }

    async fn remove_all_for(&self, app_id: &str) {
        self.removed.lock().unwrap().push(app_id.to_string());
    }
}

pub struct Harness {
    pub engine: SchedulerEngine,
    pub driver: Arc<RecordingDriver>,
    pub repository: Arc<InMemoryAppRepository>,
    pub events: Arc<EventBus>,
    pub leadership: Arc<StubLeadership>,
    pub health: Arc<RecordingHealth>,
}

/// Engine wired to recording mocks, already registered with the
/// cluster manager.
pub async fn harness() -> Harness {
    harness_with_events(Arc::new(EventBus::new(256))).await
}

/// Same harness with a caller-supplied event bus (e.g. a detached one
/// to exercise publish-failure policies).
pub async fn harness_with_events(events: Arc<EventBus>) -> Harness {
    let driver = RecordingDriver::new();
    let repository = Arc::new(InMemoryAppRepository::new());
    let leadership = StubLeadership::new();
    let health = RecordingHealth::new();

    let engine = SchedulerEngine::new(
        SchedulerConfig::default(),
        Collaborators {
            driver: Arc::clone(&driver) as Arc<dyn Driver>,
            repository: Arc::clone(&repository) as Arc<dyn flotilla::AppRepository>,
            health: Arc::clone(&health) as Arc<dyn HealthCheckManager>,
            leadership: Arc::clone(&leadership) as Arc<dyn LeadershipCoordinator>,
            framework_ids: Arc::new(InMemoryFrameworkIdStore::new()),
            builder: Arc::new(ResourceMatcher::new()),
            events: Arc::clone(&events),
        },
    );
    engine.registered("framework-test").await;

    Harness {
        engine,
        driver,
        repository,
        events,
        leadership,
        health,
    }
}

pub fn app(id: &str, instances: u32) -> AppDefinition {
    AppDefinition::new(id)
        .with_instances(instances)
        .with_resources(1.0, 256.0, 0.0)
        .with_cmd("sleep 1000")
}

/// Offer big enough for exactly one standard test task.
pub fn single_task_offer(id: &str) -> Offer {
    Offer::new(
        id,
        format!("node-{id}"),
        format!("slave-{id}"),
        OfferResources::new(1.0, 256.0, 0.0).with_port_range(31000, 31100),
    )
}

pub fn status(task_id: &str, state: TaskState) -> TaskStatus {
    TaskStatus::new(task_id, state, "slave-1")
}

/// Poll `check` until it holds or roughly three seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..300 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 3s");
}

/// Wait for the launch queue to settle at `expected` entries for the app.
pub async fn eventually_queue_count(engine: &SchedulerEngine, app_id: &str, expected: usize) {
    let queue = engine.task_queue();
    for _ in 0..300 {
        if queue.count(app_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue count for {app_id} did not reach {expected}");
}

/// Collect whatever the subscription has buffered so far.
pub fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<flotilla::SchedulerEvent>,
) -> Vec<flotilla::SchedulerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Drive one launch through the offer loop and return its task id.
pub async fn launch_one(harness: &Harness, offer_id: &str) -> String {
    let before = harness.driver.launched().len();
    harness
        .engine
        .resource_offers(vec![single_task_offer(offer_id)])
        .await;
    let launched = harness.driver.launched();
    assert_eq!(launched.len(), before + 1, "offer {offer_id} did not launch");
    launched[before].task_id.clone()
}

/// Launch and promote `count` tasks for an already started app.
pub async fn run_tasks(harness: &Harness, count: usize, offer_prefix: &str) -> Vec<String> {
    let mut task_ids = Vec::with_capacity(count);
    for i in 0..count {
        let task_id = launch_one(harness, &format!("{offer_prefix}-{i}")).await;
        harness
            .engine
            .status_update(status(&task_id, TaskState::Running))
            .await;
        task_ids.push(task_id);
        // Distinct start stamps keep oldest-first ordering deterministic.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    task_ids
}
