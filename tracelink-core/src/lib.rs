pub mod aggregate;
pub mod coverage;
pub mod error;
pub mod lateral;
pub mod models;
pub mod registry;
pub mod service;
pub mod store;
pub mod trace;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use aggregate::{FitAggregator, SignOffOutcome};
pub use error::{Result, TraceError, ValidationReason};
pub use models::{
    ConfirmationStatus, FitStatus, Requirement, RequirementStatus, ScopeLevel, ScopeNode,
    ScopeStatus,
};
pub use registry::EntityKind;
pub use service::{Scope, TraceService};
pub use store::{Entity, EntityStore, MemoryStore, SqliteStore, YamlStore};
pub use trace::{ChainBuilder, Gap, Hop, TraceChain};
