//! Orchestrator - main scheduler loop
//!
//! See `engine.rs` for the event loop and `checkpoint.rs` for save/restore.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{
    RunStatus, RunSummary, SchedulerStats, Simulation, SimulationConfig, SimulationError,
    StopReason,
};

// Re-export checkpoint types
pub use checkpoint::{compute_config_hash, validate_snapshot, AgentSnapshot, SimulationSnapshot};
