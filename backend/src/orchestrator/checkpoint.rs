//! Checkpoint - Save/Load Simulation State
//!
//! Captures everything needed to resume a run bit-identically: clock, RNG
//! state, queue entries with their sequence counter, the generation table,
//! agent states and model properties.
//!
//! # Critical Invariants
//!
//! - **Determinism**: a restored simulation continues exactly like the original
//! - **Queue Integrity**: every entry references a known agent and event
//! - **Single Live Entry**: at most one current entry per agent
//! - **Config Matching**: state can only be loaded with a matching config and
//!   registry
//!
//! The event log and the action closures are not part of a snapshot; the
//! registry is rebuilt by the caller and matched by name.

use crate::core::time::SimClock;
use crate::events::EventRegistry;
use crate::models::agent::{Agent, AgentId};
use crate::models::lifecycle::LifecycleTracker;
use crate::models::state::Model;
use crate::orchestrator::engine::{SchedulerStats, Simulation, SimulationConfig, SimulationError};
use crate::queue::{EventQueue, ScheduleEntry};
use crate::rng::RngManager;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::info;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete scheduler state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot<A, P> {
    /// Simulated time at snapshot
    pub current_time: f64,

    /// RNG state (CRITICAL for determinism)
    pub rng_state: u64,

    /// Next queue insertion sequence number
    pub next_sequence: u64,

    /// One record per agent slot, indexed by id
    pub agents: Vec<AgentSnapshot<A>>,

    /// Outstanding queue entries in pop order, ghosts included
    pub queue: Vec<ScheduleEntry>,

    pub properties: P,

    /// SHA256 of the canonical JSON config
    pub config_hash: String,

    pub kind_names: Vec<String>,
    pub event_names: Vec<String>,

    pub stats: SchedulerStats,
}

/// Agent slot snapshot
///
/// Removed agents keep their slot (ids are never reused) with no kind or
/// state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot<A> {
    pub id: u64,
    pub generation: u64,
    pub alive: bool,
    pub kind: Option<String>,
    pub state: Option<A>,
}

impl<A: Serialize, P: Serialize> SimulationSnapshot<A, P> {
    pub fn to_json(&self) -> Result<String, SimulationError> {
        serde_json::to_string(self).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }
}

impl<A: DeserializeOwned, P: DeserializeOwned> SimulationSnapshot<A, P> {
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json).map_err(|e| {
            SimulationError::SerializationError(format!("Snapshot deserialization failed: {}", e))
        })
    }
}

// ============================================================================
// Save / Restore
// ============================================================================

impl<A: Clone, P: Clone> Simulation<A, P> {
    /// Capture the current state
    ///
    /// # Errors
    ///
    /// `StateValidationError` if scheduling requests made through
    /// `model_mut()` have not been applied yet (see `apply_pending`).
    pub fn snapshot(&self) -> Result<SimulationSnapshot<A, P>, SimulationError> {
        let model = self.model();
        if model.has_pending() {
            return Err(SimulationError::StateValidationError(
                "Unapplied scheduling requests cannot be captured".to_string(),
            ));
        }
        let lifecycle = model.lifecycle();

        let agents = model
            .slots()
            .iter()
            .enumerate()
            .map(|(idx, slot)| AgentSnapshot {
                id: idx as u64,
                generation: lifecycle.generations()[idx],
                alive: lifecycle.liveness()[idx],
                kind: slot
                    .as_ref()
                    .and_then(|a| model.kind_name(a.kind()))
                    .map(str::to_string),
                state: slot.as_ref().map(|a| a.state().clone()),
            })
            .collect();

        Ok(SimulationSnapshot {
            current_time: model.time(),
            rng_state: self.rng().get_state(),
            next_sequence: self.queue().next_sequence(),
            agents,
            queue: self.queue().entries(),
            properties: model.properties().clone(),
            config_hash: compute_config_hash(self.config())?,
            kind_names: self.registry().kind_names().to_vec(),
            event_names: self
                .registry()
                .event_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            stats: self.stats(),
        })
    }

    /// Restore a simulation from a snapshot
    ///
    /// `registry` must declare the same kinds and events, in the same order,
    /// as the one the snapshot was taken with.
    pub fn from_snapshot(
        config: SimulationConfig,
        registry: EventRegistry<A, P>,
        snapshot: SimulationSnapshot<A, P>,
    ) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;
        validate_snapshot(&snapshot, &config, &registry)?;

        let generations = snapshot.agents.iter().map(|a| a.generation).collect();
        let liveness = snapshot.agents.iter().map(|a| a.alive).collect();
        let lifecycle = LifecycleTracker::from_parts(generations, liveness).ok_or_else(|| {
            SimulationError::StateValidationError("Generation table length mismatch".to_string())
        })?;

        let mut agents = Vec::with_capacity(snapshot.agents.len());
        for record in snapshot.agents {
            let slot = match (record.kind, record.state) {
                (Some(kind), Some(state)) if record.alive => {
                    let kind = registry.kind_id(&kind).ok_or_else(|| {
                        SimulationError::StateValidationError(format!(
                            "Agent {} has unknown kind '{}'",
                            record.id, kind
                        ))
                    })?;
                    Some(Agent::new(AgentId(record.id), kind, state))
                }
                _ => None,
            };
            agents.push(slot);
        }

        let model = Model::from_parts(
            agents,
            lifecycle,
            registry.kind_names().to_vec(),
            snapshot.properties,
            SimClock::starting_at(snapshot.current_time)?,
        );
        let queue = EventQueue::from_entries(snapshot.queue, snapshot.next_sequence);
        let rng = RngManager::new(snapshot.rng_state);

        info!(
            time = snapshot.current_time,
            entries = queue.len(),
            "simulation restored from snapshot"
        );
        Ok(Self::from_parts(
            config,
            registry,
            model,
            queue,
            rng,
            snapshot.stats,
        ))
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on map iteration order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

fn invalid(message: String) -> SimulationError {
    SimulationError::StateValidationError(message)
}

/// Validate snapshot integrity against the config and registry it will be
/// restored with
///
/// Checks:
/// - Config hash and registry names match
/// - Agent slots are dense, and live agents carry a known kind and a state
/// - Queue entries reference known agents and events
/// - No entry is newer than its agent's generation or older than the clock
/// - At most one live entry per agent
pub fn validate_snapshot<A, P>(
    snapshot: &SimulationSnapshot<A, P>,
    config: &SimulationConfig,
    registry: &EventRegistry<A, P>,
) -> Result<(), SimulationError> {
    // 1. Config and registry matching
    let expected_hash = compute_config_hash(config)?;
    if snapshot.config_hash != expected_hash {
        return Err(invalid(format!(
            "Config hash mismatch: snapshot {}, config {}",
            snapshot.config_hash, expected_hash
        )));
    }
    if snapshot.kind_names != registry.kind_names() {
        return Err(invalid(format!(
            "Agent kinds differ: snapshot {:?}, registry {:?}",
            snapshot.kind_names,
            registry.kind_names()
        )));
    }
    let event_names = registry.event_names();
    if snapshot.event_names.len() != event_names.len()
        || snapshot
            .event_names
            .iter()
            .zip(&event_names)
            .any(|(a, b)| a != b)
    {
        return Err(invalid(format!(
            "Event kinds differ: snapshot {:?}, registry {:?}",
            snapshot.event_names, event_names
        )));
    }

    if !snapshot.current_time.is_finite() || snapshot.current_time < 0.0 {
        return Err(invalid(format!(
            "Invalid snapshot time {}",
            snapshot.current_time
        )));
    }

    // 2. Agent slots
    for (idx, agent) in snapshot.agents.iter().enumerate() {
        if agent.id != idx as u64 {
            return Err(invalid(format!(
                "Agent slot {} holds id {}",
                idx, agent.id
            )));
        }
        if agent.alive {
            let kind_known = agent
                .kind
                .as_deref()
                .is_some_and(|k| registry.kind_id(k).is_some());
            if !kind_known || agent.state.is_none() {
                return Err(invalid(format!(
                    "Live agent {} is missing a known kind or its state",
                    agent.id
                )));
            }
        } else if agent.state.is_some() {
            return Err(invalid(format!("Removed agent {} still has state", agent.id)));
        }
    }

    // 3. Queue integrity
    let mut live_agents = HashSet::new();
    let mut sequences = HashSet::new();
    for entry in &snapshot.queue {
        let Some(agent) = snapshot.agents.get(entry.agent_id.index()) else {
            return Err(invalid(format!(
                "Queue entry references unknown agent {}",
                entry.agent_id
            )));
        };
        if registry.event(entry.event).is_none() {
            return Err(invalid(format!(
                "Queue entry references unknown event {}",
                entry.event
            )));
        }
        if entry.generation > agent.generation {
            return Err(invalid(format!(
                "Queue entry for agent {} claims generation {} > {}",
                entry.agent_id, entry.generation, agent.generation
            )));
        }
        if !entry.trigger_time.is_finite() || entry.trigger_time < snapshot.current_time {
            return Err(invalid(format!(
                "Queue entry for agent {} at {} precedes snapshot time {}",
                entry.agent_id, entry.trigger_time, snapshot.current_time
            )));
        }
        if entry.sequence >= snapshot.next_sequence || !sequences.insert(entry.sequence) {
            return Err(invalid(format!(
                "Queue entry sequence {} is duplicated or not below {}",
                entry.sequence, snapshot.next_sequence
            )));
        }

        // 4. Single live entry
        let live = agent.alive && entry.generation == agent.generation;
        if live && !live_agents.insert(entry.agent_id) {
            return Err(invalid(format!(
                "Agent {} has more than one live queue entry",
                entry.agent_id
            )));
        }
    }

    Ok(())
}
