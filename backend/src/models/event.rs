//! Event logging for simulation replay and auditing.
//!
//! Captures every scheduling-relevant state change in simulated-time order:
//! - **Lifecycle**: agents added and removed
//! - **Execution**: events fired
//! - **Diagnostics**: ghost entries discarded, agents going dormant
//!
//! The fired-event trace is the observable used to check reproducibility:
//! two runs with the same seed and the same definitions must produce
//! identical traces.
//!
//! # Example
//!
//! ```rust
//! use event_queue_core_rs::models::{EventLog, SimEvent};
//!
//! let log = EventLog::new();
//! let dormant = log.events_of_type("AgentDormant");
//! assert!(dormant.iter().all(|e| matches!(e, SimEvent::AgentDormant { .. })));
//! assert!(log.fired_trace().is_empty());
//! ```

use crate::events::EventKindId;
use crate::models::agent::{AgentId, KindId};
use serde::{Deserialize, Serialize};

/// Simulation event capturing a state change.
///
/// Every variant carries the simulated time at which it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Agent created (during population or by an action)
    AgentAdded {
        time: f64,
        agent_id: AgentId,
        kind: KindId,
    },

    /// Agent removed; any queued entry for it is now a ghost
    AgentRemoved { time: f64, agent_id: AgentId },

    /// An event's action executed
    EventFired {
        time: f64,
        agent_id: AgentId,
        event: EventKindId,
    },

    /// A popped entry was stale and discarded without executing
    GhostDiscarded {
        time: f64,
        agent_id: AgentId,
        event: EventKindId,
        generation: u64,
    },

    /// Agent has no positive-weight event and got no schedule entry
    AgentDormant { time: f64, agent_id: AgentId },
}

impl SimEvent {
    /// Simulated time at which the event was recorded
    ///
    /// For `GhostDiscarded` this is the ghost's own trigger time.
    pub fn time(&self) -> f64 {
        match self {
            SimEvent::AgentAdded { time, .. }
            | SimEvent::AgentRemoved { time, .. }
            | SimEvent::EventFired { time, .. }
            | SimEvent::GhostDiscarded { time, .. }
            | SimEvent::AgentDormant { time, .. } => *time,
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            SimEvent::AgentAdded { .. } => "AgentAdded",
            SimEvent::AgentRemoved { .. } => "AgentRemoved",
            SimEvent::EventFired { .. } => "EventFired",
            SimEvent::GhostDiscarded { .. } => "GhostDiscarded",
            SimEvent::AgentDormant { .. } => "AgentDormant",
        }
    }

    pub fn agent_id(&self) -> AgentId {
        match self {
            SimEvent::AgentAdded { agent_id, .. }
            | SimEvent::AgentRemoved { agent_id, .. }
            | SimEvent::EventFired { agent_id, .. }
            | SimEvent::GhostDiscarded { agent_id, .. }
            | SimEvent::AgentDormant { agent_id, .. } => *agent_id,
        }
    }
}

/// One executed event: who, what, when
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiredEvent {
    pub agent_id: AgentId,
    pub event: EventKindId,
    pub time: f64,
}

/// Event log for storing and querying simulation events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    /// Get events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&SimEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Get events for a specific agent
    pub fn events_for_agent(&self, agent_id: AgentId) -> Vec<&SimEvent> {
        self.events
            .iter()
            .filter(|e| e.agent_id() == agent_id)
            .collect()
    }

    /// Executed events, in execution order
    pub fn fired_trace(&self) -> Vec<FiredEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SimEvent::EventFired {
                    time,
                    agent_id,
                    event,
                } => Some(FiredEvent {
                    agent_id: *agent_id,
                    event: *event,
                    time: *time,
                }),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
