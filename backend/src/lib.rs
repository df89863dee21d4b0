//! Event Queue Core - Rust Engine
//!
//! Continuous-time stochastic event scheduler for agent-based models.
//!
//! Each live agent owns exactly one pending decision in a time-ordered queue.
//! When the decision fires, its action mutates the model, then the agent
//! draws a new decision: an event kind chosen in proportion to its
//! propensity, and a waiting time (exponential by default). Decisions made
//! obsolete by removals or rescheduling stay in the queue and are discarded
//! lazily when they surface.
//!
//! # Architecture
//!
//! - **core**: Simulated clock
//! - **events**: Event definitions, registry, propensities, next-event selection
//! - **models**: Domain types (Agent, Model, lifecycle generations, event log)
//! - **queue**: Time-ordered queue with insertion-order tie breaking
//! - **orchestrator**: Main scheduler loop and checkpointing
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. All randomness is deterministic (one seeded RNG stream)
//! 2. The clock never moves backwards
//! 3. At most one live queue entry per agent
//! 4. Removed agents never act again

// Module declarations
pub mod core;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod queue;
pub mod rng;

// Re-exports for convenience
pub use core::time::{ClockError, SimClock};
pub use events::{
    evaluate, evaluate_into, select_next_event, ActionError, Applicability, ConfigError,
    EventDefinition, EventKindId, EventRegistry, Propensity, PropensityWeights, RegistryBuilder,
    Selection,
};
pub use models::{
    Agent, AgentId, EventLog, FiredEvent, KindId, LifecycleTracker, Model, ModelError, SimEvent,
};
pub use orchestrator::{
    compute_config_hash, validate_snapshot, AgentSnapshot, RunStatus, RunSummary,
    SchedulerStats, Simulation, SimulationConfig, SimulationError, SimulationSnapshot,
    StopReason,
};
pub use queue::{EventQueue, ScheduleEntry};
pub use rng::RngManager;
