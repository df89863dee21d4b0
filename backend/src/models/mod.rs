//! Domain models: agents, lifecycle, model state and event log

pub mod agent;
pub mod event;
pub mod lifecycle;
pub mod state;

// Re-exports
pub use agent::{Agent, AgentId, KindId};
pub use event::{EventLog, FiredEvent, SimEvent};
pub use lifecycle::LifecycleTracker;
pub use state::{Model, ModelError};
