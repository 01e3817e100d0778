/// Domain error types
pub mod error;
/// Task id generation and parsing
pub mod ids;
/// Per-app scaling rate limiter
pub mod rate_limiter;

pub use error::{SchedulerError, SchedulerResult};
pub use rate_limiter::ScalingRateLimiter;
