//! Package manager adapters and the engine that drives them

pub mod adapters;
pub mod engine;
pub mod feed;
pub mod parsing;
pub mod registry;
pub mod traits;
pub mod types;

pub use engine::{EngineServices, EngineTimeouts, ManagerDefinition, PackageManager};
pub use registry::{ManagerRegistry, find_manager, initialize_all};
pub use traits::{ListingProvider, ManagerContext, OperationProvider, SourceProvider};
pub use types::{ManagerCapabilities, ManagerProperties, ManagerState, ManagerStatus, SourceCapabilities};
