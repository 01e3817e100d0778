use crate::utils::error::{SchedulerError, SchedulerResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placement constraint matched against offer attributes.
///
/// `hostname` is a pseudo-field resolved from the offer's host; every
/// other field is looked up in the offer's attribute map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraint {
    pub field: String,
    pub operator: ConstraintOperator,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConstraintOperator {
    /// Attribute must match the regex.
    Like,
    /// Attribute must not match the regex.
    Unlike,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthCheckProtocol {
    Http,
    Tcp,
    Command,
}

/// Health check declaration carried by an app definition.
///
/// Probing is performed by the external health-check collaborator; the
/// core only forwards these and branches on their presence during
/// upgrades.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthCheck {
    pub protocol: HealthCheckProtocol,
    pub path: Option<String>,
    pub grace_period_secs: u64,
    pub interval_secs: u64,
    pub max_consecutive_failures: u32,
}

impl Default for HealthCheck {
    fn default() -> Self {
        Self {
            protocol: HealthCheckProtocol::Http,
            path: Some("/".to_string()),
            grace_period_secs: 15,
            interval_secs: 10,
            max_consecutive_failures: 3,
        }
    }
}

/// A declared, versioned set of identical tasks.
///
/// Immutable once stored under a given version; [`AppUpdate::apply`]
/// produces a successor carrying a fresh version stamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppDefinition {
    pub id: String,
    pub instances: u32,
    /// RFC 3339 stamp, monotonic per app.
    pub version: String,
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    pub cmd: String,
    pub container: Option<String>,
    pub ports: Vec<u16>,
    pub constraints: Vec<Constraint>,
    pub uris: Vec<String>,
    pub env: HashMap<String, String>,
    /// Tokens per second for loss-triggered rescaling.
    pub task_rate_limit: f64,
    pub health_checks: Vec<HealthCheck>,
}

/// Fresh version stamp for a definition created or patched now.
#[must_use]
pub fn version_now() -> String {
    Utc::now().to_rfc3339()
}

impl AppDefinition {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            instances: 1,
            version: version_now(),
            cpus: 1.0,
            mem: 128.0,
            disk: 0.0,
            cmd: String::new(),
            container: None,
            ports: Vec::new(),
            constraints: Vec::new(),
            uris: Vec::new(),
            env: HashMap::new(),
            task_rate_limit: 1.0,
            health_checks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }

    #[must_use]
    pub fn with_resources(mut self, cpus: f64, mem: f64, disk: f64) -> Self {
        self.cpus = cpus;
        self.mem = mem;
        self.disk = disk;
        self
    }

    #[must_use]
    pub fn with_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.cmd = cmd.into();
        self
    }

    /// Requested ports; 0 means any free port from the offer.
    #[must_use]
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn with_health_checks(mut self, health_checks: Vec<HealthCheck>) -> Self {
        self.health_checks = health_checks;
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, tokens_per_sec: f64) -> Self {
        self.task_rate_limit = tokens_per_sec;
        self
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.id.is_empty() {
            return Err(SchedulerError::InvalidDefinition {
                reason: "app id must not be empty".to_string(),
            });
        }
        if self.cpus < 0.0 || self.mem < 0.0 || self.disk < 0.0 {
            return Err(SchedulerError::InvalidDefinition {
                reason: format!("negative resources for {}", self.id),
            });
        }
        Ok(())
    }
}

/// Partial patch applied by `update_app`.
///
/// Unset fields keep the current definition's values; applying always
/// produces a new version stamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppUpdate {
    pub instances: Option<u32>,
    pub cpus: Option<f64>,
    pub mem: Option<f64>,
    pub disk: Option<f64>,
    pub cmd: Option<String>,
    pub container: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub constraints: Option<Vec<Constraint>>,
    pub uris: Option<Vec<String>>,
    pub env: Option<HashMap<String, String>>,
    pub task_rate_limit: Option<f64>,
    pub health_checks: Option<Vec<HealthCheck>>,
}

impl AppUpdate {
    #[must_use]
    pub fn apply(&self, current: &AppDefinition) -> AppDefinition {
        let mut updated = current.clone();
        if let Some(instances) = self.instances {
            updated.instances = instances;
        }
        if let Some(cpus) = self.cpus {
            updated.cpus = cpus;
        }
        if let Some(mem) = self.mem {
            updated.mem = mem;
        }
        if let Some(disk) = self.disk {
            updated.disk = disk;
        }
        if let Some(cmd) = &self.cmd {
            updated.cmd = cmd.clone();
        }
        if let Some(container) = &self.container {
            updated.container = Some(container.clone());
        }
        if let Some(ports) = &self.ports {
            updated.ports = ports.clone();
        }
        if let Some(constraints) = &self.constraints {
            updated.constraints = constraints.clone();
        }
        if let Some(uris) = &self.uris {
            updated.uris = uris.clone();
        }
        if let Some(env) = &self.env {
            updated.env = env.clone();
        }
        if let Some(task_rate_limit) = self.task_rate_limit {
            updated.task_rate_limit = task_rate_limit;
        }
        if let Some(health_checks) = &self.health_checks {
            updated.health_checks = health_checks.clone();
        }
        updated.version = version_now();
        updated
    }
}
