/// Application definitions, update patches and health check declarations
pub mod definition;

pub use definition::{
    AppDefinition, AppUpdate, Constraint, ConstraintOperator, HealthCheck, HealthCheckProtocol,
};
