/// First-fit task builder matching offers against app requirements
pub mod builder;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use builder::{ResourceMatcher, TaskBuilder};

/// Resources granted by one offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfferResources {
    pub cpus: f64,
    pub mem: f64,
    pub disk: f64,
    /// Inclusive port ranges.
    pub port_ranges: Vec<(u16, u16)>,
}

impl OfferResources {
    #[must_use]
    pub fn new(cpus: f64, mem: f64, disk: f64) -> Self {
        Self {
            cpus,
            mem,
            disk,
            port_ranges: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_port_range(mut self, begin: u16, end: u16) -> Self {
        self.port_ranges.push((begin, end));
        self
    }

    #[must_use]
    pub fn contains_port(&self, port: u16) -> bool {
        self.port_ranges
            .iter()
            .any(|&(begin, end)| port >= begin && port <= end)
    }
}

/// A unit of available resource on a node. Not owned by the core: every
/// offer must be answered with a launch or a decline before the
/// driver's timeout window closes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub id: String,
    pub hostname: String,
    pub slave_id: String,
    pub attributes: HashMap<String, String>,
    pub resources: OfferResources,
}

impl Offer {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        hostname: impl Into<String>,
        slave_id: impl Into<String>,
        resources: OfferResources,
    ) -> Self {
        Self {
            id: id.into(),
            hostname: hostname.into(),
            slave_id: slave_id.into(),
            attributes: HashMap::new(),
            resources,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
