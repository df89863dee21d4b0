//! Model state
//!
//! The model owns everything an action may touch: the agent arena, the
//! lifecycle table, user-defined model properties, the clock, and the event
//! log. It does NOT own the schedule. Actions create, remove and mutate
//! agents directly; anything they want scheduled is recorded as a request
//! and applied by the scheduler once the action returns.
//!
//! # Critical Invariants
//!
//! 1. **Stable ids**: arena slots are never compacted or reused
//! 2. **Liveness**: a slot holds an agent iff the lifecycle table says alive
//! 3. **No queue access**: actions can only request scheduling, never edit
//!    the queue

use crate::core::time::{ClockError, SimClock};
use crate::events::{EventKindId, EventRegistry};
use crate::models::agent::{Agent, AgentId, KindId};
use crate::models::event::{EventLog, SimEvent};
use crate::models::lifecycle::LifecycleTracker;
use crate::rng::RngManager;
use thiserror::Error;

/// Errors from model operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    #[error("Agent {0} has been removed")]
    AgentRemoved(AgentId),

    #[error("Unknown agent kind: {0}")]
    UnknownKind(KindId),
}

/// A scheduling request recorded by the model, applied by the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ScheduleRequest {
    /// Draw a fresh next event through propensity selection
    Redraw(AgentId),
    /// Schedule a specific event after a fixed delay
    Explicit {
        agent_id: AgentId,
        event: EventKindId,
        delay: f64,
    },
}

/// Agent table plus domain state
///
/// # Example
///
/// ```rust
/// use event_queue_core_rs::{Model, RegistryBuilder};
///
/// let mut builder = RegistryBuilder::<f64, u32>::new();
/// let tree = builder.add_kind("tree").unwrap();
/// let registry = builder.build();
///
/// let mut model = Model::new(&registry, 0);
/// let a = model.add_agent(tree, 1.0).unwrap();
/// let b = model.add_agent(tree, 2.0).unwrap();
/// assert_eq!(model.count(), 2);
///
/// model.remove_agent(a).unwrap();
/// assert!(!model.is_alive(a));
/// assert_eq!(model.count_kind(tree), 1);
/// *model.properties_mut() += 1;
/// assert_eq!(*model.properties(), 1);
/// # let _ = b;
/// ```
#[derive(Debug, Clone)]
pub struct Model<A, P> {
    /// Agent arena, indexed by `AgentId`; `None` marks a removed agent
    agents: Vec<Option<Agent<A>>>,

    lifecycle: LifecycleTracker,

    /// Kind names, indexed by `KindId`
    kind_names: Vec<String>,

    properties: P,

    clock: SimClock,

    /// Requests made since the scheduler last drained them
    pending: Vec<ScheduleRequest>,

    autogenerate_on_add: bool,

    record_events: bool,

    event_log: EventLog,
}

impl<A, P> Model<A, P> {
    /// Create an empty model for the kinds declared in `registry`
    pub fn new(registry: &EventRegistry<A, P>, properties: P) -> Self {
        Self {
            agents: Vec::new(),
            lifecycle: LifecycleTracker::new(),
            kind_names: registry.kind_names().to_vec(),
            properties,
            clock: SimClock::new(),
            pending: Vec::new(),
            autogenerate_on_add: true,
            record_events: true,
            event_log: EventLog::new(),
        }
    }

    pub(crate) fn configure(
        &mut self,
        clock: SimClock,
        autogenerate_on_add: bool,
        record_events: bool,
    ) {
        self.clock = clock;
        self.autogenerate_on_add = autogenerate_on_add;
        self.record_events = record_events;
    }

    pub(crate) fn from_parts(
        agents: Vec<Option<Agent<A>>>,
        lifecycle: LifecycleTracker,
        kind_names: Vec<String>,
        properties: P,
        clock: SimClock,
    ) -> Self {
        Self {
            agents,
            lifecycle,
            kind_names,
            properties,
            clock,
            pending: Vec::new(),
            autogenerate_on_add: true,
            record_events: true,
            event_log: EventLog::new(),
        }
    }

    // ========================================================================
    // Agent lifecycle
    // ========================================================================

    /// Create an agent
    ///
    /// Unless automatic scheduling on creation is disabled, the new agent is
    /// queued for scheduling: immediately when called through
    /// `Simulation::add_agent`, or right after the current action (in
    /// creation order) when called from inside an action.
    pub fn add_agent(&mut self, kind: KindId, state: A) -> Result<AgentId, ModelError> {
        if kind.index() >= self.kind_names.len() {
            return Err(ModelError::UnknownKind(kind));
        }

        let id = self.lifecycle.register();
        debug_assert_eq!(id.index(), self.agents.len());
        self.agents.push(Some(Agent::new(id, kind, state)));

        if self.autogenerate_on_add {
            self.pending.push(ScheduleRequest::Redraw(id));
        }
        self.log(SimEvent::AgentAdded {
            time: self.clock.now(),
            agent_id: id,
            kind,
        });
        Ok(id)
    }

    /// Remove an agent and return its state
    ///
    /// Marks the id dead permanently. Any queued entry for it becomes a
    /// ghost; the queue itself is not touched.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<A, ModelError> {
        let slot = self
            .agents
            .get_mut(id.index())
            .ok_or(ModelError::AgentNotFound(id))?;
        let agent = slot.take().ok_or(ModelError::AgentRemoved(id))?;
        self.lifecycle.retire(id);

        self.log(SimEvent::AgentRemoved {
            time: self.clock.now(),
            agent_id: id,
        });
        Ok(agent.into_state())
    }

    /// Request a fresh next-event draw for an agent
    ///
    /// The only way out of dormancy. Supersedes any entry the agent already
    /// has. Applied after the current action returns (or at the start of
    /// the next run/step when called outside the scheduler).
    pub fn reschedule(&mut self, id: AgentId) -> Result<(), ModelError> {
        self.ensure_alive(id)?;
        self.pending.push(ScheduleRequest::Redraw(id));
        Ok(())
    }

    /// Request a specific event for an agent after `delay`
    ///
    /// Bypasses propensity selection. The event must apply to the agent's
    /// kind and `delay` must be finite and non-negative; both are checked
    /// when the request is applied.
    pub fn schedule_event(
        &mut self,
        id: AgentId,
        event: EventKindId,
        delay: f64,
    ) -> Result<(), ModelError> {
        self.ensure_alive(id)?;
        self.pending.push(ScheduleRequest::Explicit {
            agent_id: id,
            event,
            delay,
        });
        Ok(())
    }

    fn ensure_alive(&self, id: AgentId) -> Result<(), ModelError> {
        if self.lifecycle.is_alive(id) {
            Ok(())
        } else if id.index() < self.agents.len() {
            Err(ModelError::AgentRemoved(id))
        } else {
            Err(ModelError::AgentNotFound(id))
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get reference to a live agent by ID
    pub fn agent(&self, id: AgentId) -> Option<&Agent<A>> {
        self.agents.get(id.index()).and_then(Option::as_ref)
    }

    /// Get mutable reference to a live agent by ID
    pub fn agent_mut(&mut self, id: AgentId) -> Result<&mut Agent<A>, ModelError> {
        match self.agents.get_mut(id.index()) {
            Some(Some(agent)) => Ok(agent),
            Some(None) => Err(ModelError::AgentRemoved(id)),
            None => Err(ModelError::AgentNotFound(id)),
        }
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.lifecycle.is_alive(id)
    }

    /// Live agents in id order
    pub fn agents(&self) -> impl Iterator<Item = &Agent<A>> {
        self.agents.iter().filter_map(Option::as_ref)
    }

    /// Live agents of one kind in id order
    pub fn agents_of_kind(&self, kind: KindId) -> impl Iterator<Item = &Agent<A>> {
        self.agents().filter(move |a| a.kind() == kind)
    }

    /// Live agent ids in id order
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents().map(Agent::id).collect()
    }

    /// Number of live agents
    pub fn count(&self) -> usize {
        self.lifecycle.live_count()
    }

    pub fn count_kind(&self, kind: KindId) -> usize {
        self.agents_of_kind(kind).count()
    }

    /// Uniformly random live agent of `kind`, drawn from the shared stream
    pub fn random_agent_of_kind(&self, kind: KindId, rng: &mut RngManager) -> Option<AgentId> {
        let candidates: Vec<AgentId> = self.agents_of_kind(kind).map(Agent::id).collect();
        rng.index(candidates.len()).map(|idx| candidates[idx])
    }

    pub fn kind_name(&self, kind: KindId) -> Option<&str> {
        self.kind_names.get(kind.index()).map(String::as_str)
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kind_names
            .iter()
            .position(|k| k == name)
            .map(|idx| KindId(idx as u16))
    }

    pub fn properties(&self) -> &P {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut P {
        &mut self.properties
    }

    /// Current simulated time
    pub fn time(&self) -> f64 {
        self.clock.now()
    }

    /// Current generation of an agent id (dead ids included)
    pub fn generation(&self, id: AgentId) -> Option<u64> {
        self.lifecycle.generation(id)
    }

    pub fn lifecycle(&self) -> &LifecycleTracker {
        &self.lifecycle
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    // ========================================================================
    // Scheduler-side hooks
    // ========================================================================

    pub(crate) fn lifecycle_mut(&mut self) -> &mut LifecycleTracker {
        &mut self.lifecycle
    }

    pub(crate) fn advance_clock(&mut self, time: f64) -> Result<(), ClockError> {
        self.clock.advance_to(time)
    }

    pub(crate) fn clock(&self) -> &SimClock {
        &self.clock
    }

    pub(crate) fn take_pending(&mut self) -> Vec<ScheduleRequest> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn slots(&self) -> &[Option<Agent<A>>] {
        &self.agents
    }

    pub(crate) fn log(&mut self, event: SimEvent) {
        if self.record_events {
            self.event_log.log(event);
        }
    }

    pub(crate) fn clear_event_log(&mut self) {
        self.event_log.clear();
    }
}
