//! # Flotilla
//!
//! Control core of a resource-offer based cluster workload scheduler.
//! The engine keeps each application at its declared instance count by
//! matching incoming offers to pending launches, reacts to task-status
//! transitions with cleanup, re-queueing and rate-limited rescaling,
//! orchestrates health-check-aware upgrades, and reconciles its
//! in-memory view with the cluster manager after reconnects.
//!
//! The crate is the scheduling core only. The REST layer, durable
//! storage, health probing, leader election and the driver itself are
//! consumed through the contracts in [`driver`], [`storage`],
//! [`health`] and [`leadership`].
//!
//! ```rust,no_run
//! use flotilla::{
//!     AppDefinition, Collaborators, EventBus, InMemoryAppRepository,
//!     InMemoryFrameworkIdStore, NullHealthCheckManager, ResourceMatcher,
//!     SchedulerConfig, SchedulerEngine,
//! };
//! use std::sync::Arc;
//!
//! # async fn wire(driver: Arc<dyn flotilla::Driver>, leadership: Arc<dyn flotilla::LeadershipCoordinator>) -> anyhow::Result<()> {
//! let engine = SchedulerEngine::new(
//!     SchedulerConfig::default(),
//!     Collaborators {
//!         driver,
//!         repository: Arc::new(InMemoryAppRepository::new()),
//!         health: Arc::new(NullHealthCheckManager),
//!         leadership,
//!         framework_ids: Arc::new(InMemoryFrameworkIdStore::new()),
//!         builder: Arc::new(ResourceMatcher::new()),
//!         events: Arc::new(EventBus::new(256)),
//!     },
//! );
//!
//! engine.registered("framework-1").await;
//! engine
//!     .start_app(AppDefinition::new("web").with_instances(2))
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Application definitions and update patches
pub mod apps;
/// Engine tunables
pub mod config;
/// Engine, upgrade orchestration and barriers
pub mod core;
/// Cluster-manager driver contract
pub mod driver;
/// Domain events and the broadcast bus
pub mod events;
/// Health-check collaborator contract
pub mod health;
/// Leadership/process control contract
pub mod leadership;
/// Offers and the first-fit task builder
pub mod offers;
/// Repository contracts and in-memory implementations
pub mod storage;
/// Launch queue, task model and tracker
pub mod tasks;
/// Errors, ids and the scaling rate limiter
pub mod utils;

pub use apps::{
    AppDefinition, AppUpdate, Constraint, ConstraintOperator, HealthCheck, HealthCheckProtocol,
};
pub use config::SchedulerConfig;
pub use crate::core::{
    Collaborators, NoopUpdateStrategy, SchedulerEngine, StartupCallbackManager, UpdateStrategy,
    UpgradeCoordinator,
};
pub use driver::{Driver, TaskInfo};
pub use events::{EventBus, SchedulerEvent};
pub use health::{HealthCheckManager, NullHealthCheckManager};
pub use leadership::LeadershipCoordinator;
pub use offers::{Offer, OfferResources, ResourceMatcher, TaskBuilder};
pub use storage::{
    AppRepository, FrameworkIdStore, InMemoryAppRepository, InMemoryFrameworkIdStore,
};
pub use tasks::{LaunchQueue, Task, TaskKnowledge, TaskStage, TaskState, TaskStatus, TaskTracker};
pub use utils::error::{SchedulerError, SchedulerResult};
pub use utils::rate_limiter::ScalingRateLimiter;
