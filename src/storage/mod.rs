/// In-memory repository and framework-id store
pub mod memory;
/// Persistence contracts consumed by the engine
pub mod repository;

pub use memory::{InMemoryAppRepository, InMemoryFrameworkIdStore};
pub use repository::{AppRepository, FrameworkIdStore};
