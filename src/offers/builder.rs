use crate::apps::{AppDefinition, Constraint, ConstraintOperator};
use crate::driver::TaskInfo;
use crate::offers::Offer;
use crate::utils::ids;
use regex::Regex;
use std::collections::HashSet;

/// Pure function from (app definition, offer) to an optional launch
/// specification with its port assignment.
///
/// Implementations must not mutate the offer or any tracker state, and
/// must return `None` when the offer lacks resources, violates a
/// constraint, or cannot satisfy the port requirements.
pub trait TaskBuilder: Send + Sync {
    fn build_if_matches(&self, app: &AppDefinition, offer: &Offer)
        -> Option<(TaskInfo, Vec<u16>)>;
}

/// First-fit matcher over scalar resources, placement constraints and
/// port ranges. No scoring; the first app the engine tries that fits
/// the offer wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceMatcher;

impl ResourceMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TaskBuilder for ResourceMatcher {
    fn build_if_matches(
        &self,
        app: &AppDefinition,
        offer: &Offer,
    ) -> Option<(TaskInfo, Vec<u16>)> {
        if offer.resources.cpus < app.cpus
            || offer.resources.mem < app.mem
            || offer.resources.disk < app.disk
        {
            return None;
        }
        if !app
            .constraints
            .iter()
            .all(|constraint| constraint_satisfied(constraint, offer))
        {
            return None;
        }
        let ports = assign_ports(&app.ports, offer)?;

        let task_id = ids::new_task_id(&app.id);
        let info = TaskInfo {
            task_id,
            app_id: app.id.clone(),
            slave_id: offer.slave_id.clone(),
            host: offer.hostname.clone(),
            cmd: app.cmd.clone(),
            container: app.container.clone(),
            cpus: app.cpus,
            mem: app.mem,
            disk: app.disk,
            ports: ports.clone(),
            uris: app.uris.clone(),
            env: app.env.clone(),
            version: app.version.clone(),
        };
        Some((info, ports))
    }
}

fn constraint_satisfied(constraint: &Constraint, offer: &Offer) -> bool {
    let actual = if constraint.field == "hostname" {
        Some(offer.hostname.as_str())
    } else {
        offer.attributes.get(&constraint.field).map(String::as_str)
    };
    let Some(actual) = actual else {
        // A missing attribute satisfies UNLIKE but never LIKE.
        return constraint.operator == ConstraintOperator::Unlike;
    };
    let Ok(pattern) = Regex::new(&constraint.value) else {
        tracing::warn!(
            field = %constraint.field,
            value = %constraint.value,
            "unparseable constraint pattern; treating as unsatisfied"
        );
        return false;
    };
    match constraint.operator {
        ConstraintOperator::Like => pattern.is_match(actual),
        ConstraintOperator::Unlike => !pattern.is_match(actual),
    }
}

/// Resolve the app's port requirements against the offer's ranges.
/// Fixed ports must be covered by a range; zero entries draw any free
/// port. No port is assigned twice.
fn assign_ports(requested: &[u16], offer: &Offer) -> Option<Vec<u16>> {
    let mut assigned = Vec::with_capacity(requested.len());
    let mut used: HashSet<u16> = HashSet::new();

    for &port in requested.iter().filter(|&&port| port != 0) {
        if !offer.resources.contains_port(port) || !used.insert(port) {
            return None;
        }
    }
    // The fixed set is complete here; dynamic picks come off a fresh
    // iterator and cannot repeat.
    let mut free = offer
        .resources
        .port_ranges
        .iter()
        .flat_map(|&(begin, end)| begin..=end)
        .filter(|port| !used.contains(port));

    for &port in requested {
        if port != 0 {
            assigned.push(port);
        } else {
            assigned.push(free.next()?);
        }
    }
    Some(assigned)
}
