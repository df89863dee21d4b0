//! Scheduler - main event loop
//!
//! Owns the registry, the model, the queue and the single RNG stream, and
//! drives the continuous-time loop:
//!
//! ```text
//! loop:
//!   queue empty                    -> Finished(QueueEmpty)
//!   earliest trigger > budget end  -> Finished(BudgetExhausted)
//!   pop earliest entry
//!   stale (dead agent / old gen)   -> discard ghost, continue
//!   clock := entry.trigger_time
//!   run action
//!   reschedule acting agent if still alive
//!   apply requests made by the action (creations first-come first-served)
//!   terminate(model, now)          -> Finished(PredicateSatisfied)
//! ```
//!
//! # Critical Invariants
//!
//! 1. **Determinism**: one seeded stream; ties broken by insertion order
//! 2. **Monotonic clock**: entries pop in non-decreasing time order
//! 3. **At most one live entry per agent**: every new entry bumps the
//!    agent's generation
//! 4. **No resurrection**: removed agents never act again

use crate::core::time::{ClockError, SimClock};
use crate::events::{
    evaluate_into, select_next_event, ActionError, ConfigError, EventKindId, EventRegistry,
    PropensityWeights, Selection,
};
use crate::models::agent::{AgentId, KindId};
use crate::models::event::{EventLog, FiredEvent, SimEvent};
use crate::models::state::{Model, ModelError, ScheduleRequest};
use crate::queue::{EventQueue, ScheduleEntry};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Scheduler configuration
///
/// # Example
/// ```
/// use event_queue_core_rs::SimulationConfig;
///
/// let config: SimulationConfig = serde_json::from_str(r#"{ "rng_seed": 7 }"#).unwrap();
/// assert_eq!(config, SimulationConfig::new(7));
/// assert!(config.autogenerate_on_add && config.autogenerate_after_action);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Seed of the single RNG stream
    pub rng_seed: u64,

    /// Schedule agents as soon as they are created
    #[serde(default = "default_true")]
    pub autogenerate_on_add: bool,

    /// Reschedule the acting agent after each of its events
    #[serde(default = "default_true")]
    pub autogenerate_after_action: bool,

    /// Keep the structured event log
    #[serde(default = "default_true")]
    pub record_events: bool,

    /// Initial clock value
    #[serde(default)]
    pub start_time: f64,
}

fn default_true() -> bool {
    true
}

impl SimulationConfig {
    /// Default configuration with the given seed
    pub fn new(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            autogenerate_on_add: true,
            autogenerate_after_action: true,
            record_events: true,
            start_time: 0.0,
        }
    }
}

// ============================================================================
// Errors and results
// ============================================================================

/// Simulation error types
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Configuration validation error
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Bad event configuration surfaced at registration or evaluation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Clock error: {0}")]
    Clock(#[from] ClockError),

    /// A user action returned an error; the run halted
    #[error("Action '{event}' failed for agent {agent} at time {time}: {source}")]
    ActionFailed {
        event: String,
        agent: AgentId,
        time: f64,
        source: ActionError,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("State validation error: {0}")]
    StateValidationError(String),
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Next entry lies beyond the time budget
    BudgetExhausted,
    /// The termination predicate returned true
    PredicateSatisfied,
    /// Nothing left to execute
    QueueEmpty,
}

/// Scheduler state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Finished(StopReason),
    /// Last run or step halted on an error
    Failed,
}

/// Cumulative diagnostic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub events_fired: u64,
    pub ghosts_discarded: u64,
    pub entries_scheduled: u64,
    pub dormant_transitions: u64,
}

/// Result of one `run` call
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub reason: StopReason,
    pub start_time: f64,
    /// Clock at return: time of the last fired event, or `start_time`
    pub end_time: f64,
    pub events_fired: u64,
    pub ghosts_discarded: u64,
}

// ============================================================================
// Simulation
// ============================================================================

/// Continuous-time stochastic event scheduler
///
/// `A` is the agent state type, `P` the model properties type.
///
/// # Example
///
/// ```rust
/// use event_queue_core_rs::{EventDefinition, RegistryBuilder, Simulation, SimulationConfig};
///
/// // Each cell splits at rate 1.0
/// let mut builder = RegistryBuilder::<(), ()>::new();
/// let cell = builder.add_kind("cell").unwrap();
/// builder
///     .register_event(EventDefinition::new("split", move |id, model, _rng| {
///         let kind = model.agent(id).map(|a| a.kind()).unwrap();
///         model.add_agent(kind, ())?;
///         Ok(())
///     }))
///     .unwrap();
///
/// let mut sim = Simulation::new(SimulationConfig::new(42), builder.build(), ()).unwrap();
/// sim.add_agent(cell, ()).unwrap();
///
/// let summary = sim.run(2.0).unwrap();
/// assert!(sim.current_time() <= 2.0);
/// assert_eq!(sim.model().count() as u64, 1 + summary.events_fired);
/// ```
pub struct Simulation<A, P> {
    config: SimulationConfig,
    registry: EventRegistry<A, P>,
    model: Model<A, P>,
    queue: EventQueue,
    rng: RngManager,
    stats: SchedulerStats,
    status: RunStatus,
    /// Reused propensity buffer
    weights: PropensityWeights,
}

impl<A, P> Simulation<A, P> {
    /// Create a simulation from a config, a frozen registry and the initial
    /// model properties
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `start_time` is negative or not finite.
    pub fn new(
        config: SimulationConfig,
        registry: EventRegistry<A, P>,
        properties: P,
    ) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;

        let mut model = Model::new(&registry, properties);
        model.configure(
            SimClock::starting_at(config.start_time)?,
            config.autogenerate_on_add,
            config.record_events,
        );
        let rng = RngManager::new(config.rng_seed);

        Ok(Self {
            config,
            registry,
            model,
            queue: EventQueue::new(),
            rng,
            stats: SchedulerStats::default(),
            status: RunStatus::Idle,
            weights: PropensityWeights::new(),
        })
    }

    pub(crate) fn validate_config(config: &SimulationConfig) -> Result<(), SimulationError> {
        if !config.start_time.is_finite() || config.start_time < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "start_time must be finite and non-negative, got {}",
                config.start_time
            )));
        }
        Ok(())
    }

    /// Reassemble a simulation from restored parts (checkpoint restore)
    pub(crate) fn from_parts(
        config: SimulationConfig,
        registry: EventRegistry<A, P>,
        mut model: Model<A, P>,
        queue: EventQueue,
        rng: RngManager,
        stats: SchedulerStats,
    ) -> Self {
        let clock = model.clock().clone();
        model.configure(clock, config.autogenerate_on_add, config.record_events);
        Self {
            config,
            registry,
            model,
            queue,
            rng,
            stats,
            status: RunStatus::Idle,
            weights: PropensityWeights::new(),
        }
    }

    // ========================================================================
    // Population
    // ========================================================================

    /// Create an agent and schedule it immediately
    pub fn add_agent(&mut self, kind: KindId, state: A) -> Result<AgentId, SimulationError> {
        let id = self.model.add_agent(kind, state)?;
        self.apply_pending()?;
        Ok(id)
    }

    /// Remove an agent; its queued entry turns into a ghost
    pub fn remove_agent(&mut self, id: AgentId) -> Result<A, SimulationError> {
        Ok(self.model.remove_agent(id)?)
    }

    /// Draw a fresh next event for an agent now
    pub fn reschedule(&mut self, id: AgentId) -> Result<(), SimulationError> {
        self.model.reschedule(id)?;
        self.apply_pending()
    }

    /// Schedule a specific event for an agent after `delay`
    pub fn schedule_event(
        &mut self,
        id: AgentId,
        event: EventKindId,
        delay: f64,
    ) -> Result<(), SimulationError> {
        self.model.schedule_event(id, event, delay)?;
        self.apply_pending()
    }

    /// Apply scheduling requests recorded on the model
    ///
    /// Runs automatically after every action and at the start of every run
    /// or step. Call it directly after populating through `model_mut()` to
    /// schedule those agents right away.
    pub fn apply_pending(&mut self) -> Result<(), SimulationError> {
        for request in self.model.take_pending() {
            match request {
                ScheduleRequest::Redraw(id) => self.schedule_agent(id)?,
                ScheduleRequest::Explicit {
                    agent_id,
                    event,
                    delay,
                } => self.schedule_explicit(agent_id, event, delay)?,
            }
        }
        Ok(())
    }

    /// Discard every queue entry and reschedule all live agents in id order
    ///
    /// Always valid; used to recover after a failed action or after loading
    /// a model without its queue. Returns the new queue size.
    pub fn rebuild_queue(&mut self) -> Result<usize, SimulationError> {
        self.queue.clear();
        self.model.discard_pending();
        for id in self.model.agent_ids() {
            self.schedule_agent(id)?;
        }
        debug!(entries = self.queue.len(), "queue rebuilt");
        Ok(self.queue.len())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run for `budget` units of simulated time from the current time
    pub fn run(&mut self, budget: f64) -> Result<RunSummary, SimulationError> {
        self.run_until(budget, |_, _| false)
    }

    /// Run for at most `budget` units of time, stopping early as soon as
    /// `terminate(model, now)` returns true after an event
    ///
    /// Pass `f64::INFINITY` as the budget to stop on the predicate (or an
    /// empty queue) alone.
    ///
    /// # Errors
    ///
    /// The first configuration error or action error, unmodified. The model
    /// is left as the failing action left it; the failing entry is consumed.
    pub fn run_until<F>(&mut self, budget: f64, mut terminate: F) -> Result<RunSummary, SimulationError>
    where
        F: FnMut(&Model<A, P>, f64) -> bool,
    {
        if budget.is_nan() || budget < 0.0 {
            return Err(SimulationError::InvalidConfig(format!(
                "time budget must be non-negative, got {}",
                budget
            )));
        }

        let start_time = self.model.time();
        let end_time = start_time + budget;
        let fired_before = self.stats.events_fired;
        let ghosts_before = self.stats.ghosts_discarded;

        self.status = RunStatus::Running;
        let reason = match self.run_loop(end_time, &mut terminate) {
            Ok(reason) => reason,
            Err(err) => {
                self.status = RunStatus::Failed;
                return Err(err);
            }
        };
        self.status = RunStatus::Finished(reason);

        let summary = RunSummary {
            reason,
            start_time,
            end_time: self.model.time(),
            events_fired: self.stats.events_fired - fired_before,
            ghosts_discarded: self.stats.ghosts_discarded - ghosts_before,
        };
        info!(
            reason = ?summary.reason,
            events_fired = summary.events_fired,
            ghosts_discarded = summary.ghosts_discarded,
            time = summary.end_time,
            "run finished"
        );
        Ok(summary)
    }

    fn run_loop<F>(&mut self, end_time: f64, terminate: &mut F) -> Result<StopReason, SimulationError>
    where
        F: FnMut(&Model<A, P>, f64) -> bool,
    {
        self.apply_pending()?;

        loop {
            if self.queue.peek_min_time() > end_time {
                return Ok(if self.queue.is_empty() {
                    StopReason::QueueEmpty
                } else {
                    StopReason::BudgetExhausted
                });
            }
            let Some(entry) = self.queue.pop_min() else {
                return Ok(StopReason::QueueEmpty);
            };
            if !self.is_live(&entry) {
                self.discard_ghost(&entry);
                continue;
            }

            self.fire(entry)?;

            if terminate(&self.model, self.model.time()) {
                return Ok(StopReason::PredicateSatisfied);
            }
        }
    }

    /// Execute exactly one valid event, skipping ghosts, ignoring budgets
    ///
    /// Returns `None` once nothing is left to execute.
    pub fn step(&mut self) -> Result<Option<FiredEvent>, SimulationError> {
        self.status = RunStatus::Running;
        let result = self.step_inner();
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => self.status = RunStatus::Finished(StopReason::QueueEmpty),
            Err(_) => self.status = RunStatus::Failed,
        }
        result
    }

    fn step_inner(&mut self) -> Result<Option<FiredEvent>, SimulationError> {
        self.apply_pending()?;
        while let Some(entry) = self.queue.pop_min() {
            if !self.is_live(&entry) {
                self.discard_ghost(&entry);
                continue;
            }
            return self.fire(entry).map(Some);
        }
        Ok(None)
    }

    fn is_live(&self, entry: &ScheduleEntry) -> bool {
        self.model
            .lifecycle()
            .is_current(entry.agent_id, entry.generation)
    }

    fn discard_ghost(&mut self, entry: &ScheduleEntry) {
        self.stats.ghosts_discarded += 1;
        debug!(
            agent = %entry.agent_id,
            event = %entry.event,
            generation = entry.generation,
            time = entry.trigger_time,
            "discarding stale entry"
        );
        self.model.log(SimEvent::GhostDiscarded {
            time: entry.trigger_time,
            agent_id: entry.agent_id,
            event: entry.event,
            generation: entry.generation,
        });
    }

    /// Advance the clock, run the action, then reschedule
    fn fire(&mut self, entry: ScheduleEntry) -> Result<FiredEvent, SimulationError> {
        self.model.advance_clock(entry.trigger_time)?;

        let definition = self
            .registry
            .event(entry.event)
            .ok_or(ConfigError::UnknownEvent(entry.event))?;
        trace!(
            agent = %entry.agent_id,
            event = definition.name(),
            time = entry.trigger_time,
            "firing event"
        );

        if let Err(source) = (definition.action())(entry.agent_id, &mut self.model, &mut self.rng) {
            // The queue stays exactly as it was before the action began
            self.model.discard_pending();
            warn!(
                agent = %entry.agent_id,
                event = definition.name(),
                time = entry.trigger_time,
                error = %source,
                "action failed"
            );
            return Err(SimulationError::ActionFailed {
                event: definition.name().to_string(),
                agent: entry.agent_id,
                time: entry.trigger_time,
                source,
            });
        }

        self.stats.events_fired += 1;
        self.model.log(SimEvent::EventFired {
            time: entry.trigger_time,
            agent_id: entry.agent_id,
            event: entry.event,
        });

        if self.config.autogenerate_after_action && self.model.is_alive(entry.agent_id) {
            self.schedule_agent(entry.agent_id)?;
        }
        self.apply_pending()?;

        Ok(FiredEvent {
            agent_id: entry.agent_id,
            event: entry.event,
            time: entry.trigger_time,
        })
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Evaluate propensities, select the next event, supersede the old entry
    ///
    /// Dead or unknown ids are ignored. A dormant agent still gets its
    /// generation bumped so that any entry it had stops governing it.
    fn schedule_agent(&mut self, id: AgentId) -> Result<(), SimulationError> {
        let Some(agent) = self.model.agent(id) else {
            return Ok(());
        };
        evaluate_into(&self.registry, agent, &self.model, &mut self.weights)?;
        let selection =
            select_next_event(&self.registry, &self.weights, agent, &self.model, &mut self.rng)?;

        let Some(generation) = self.model.lifecycle_mut().bump(id) else {
            return Ok(());
        };

        match selection {
            Selection::Scheduled {
                event,
                trigger_time,
                ..
            } => {
                self.queue.insert(id, event, generation, trigger_time);
                self.stats.entries_scheduled += 1;
            }
            Selection::Dormant => {
                self.stats.dormant_transitions += 1;
                debug!(agent = %id, time = self.model.time(), "agent dormant");
                self.model.log(SimEvent::AgentDormant {
                    time: self.model.time(),
                    agent_id: id,
                });
            }
        }
        Ok(())
    }

    fn schedule_explicit(
        &mut self,
        id: AgentId,
        event: EventKindId,
        delay: f64,
    ) -> Result<(), SimulationError> {
        let Some(agent) = self.model.agent(id) else {
            return Ok(());
        };
        let definition = self
            .registry
            .event(event)
            .ok_or(ConfigError::UnknownEvent(event))?;

        if !self.registry.applies(event, agent.kind()) {
            return Err(ConfigError::NotApplicable {
                event: definition.name().to_string(),
                agent: id,
                kind: self
                    .registry
                    .kind_name(agent.kind())
                    .unwrap_or_default()
                    .to_string(),
            }
            .into());
        }

        let trigger_time = self.model.time() + delay;
        if !delay.is_finite() || delay < 0.0 || !trigger_time.is_finite() {
            return Err(ConfigError::InvalidDelay {
                event: definition.name().to_string(),
                agent: id,
                value: delay,
            }
            .into());
        }

        let Some(generation) = self.model.lifecycle_mut().bump(id) else {
            return Ok(());
        };
        self.queue.insert(id, event, generation, trigger_time);
        self.stats.entries_scheduled += 1;
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current simulated time
    pub fn current_time(&self) -> f64 {
        self.model.time()
    }

    /// Physical queue size, ghosts included
    pub fn pending_event_count(&self) -> usize {
        self.queue.len()
    }

    /// Queue entries that still govern a live agent
    pub fn live_entry_count(&self) -> usize {
        self.queue
            .iter()
            .filter(|e| self.model.lifecycle().is_current(e.agent_id, e.generation))
            .count()
    }

    /// Earliest queued trigger time (ghosts included), or infinity
    pub fn next_event_time(&self) -> f64 {
        self.queue.peek_min_time()
    }

    pub fn model(&self) -> &Model<A, P> {
        &self.model
    }

    /// Mutable model access between runs
    ///
    /// Scheduling requests made through it are applied on the next run,
    /// step, or explicit `apply_pending`.
    pub fn model_mut(&mut self) -> &mut Model<A, P> {
        &mut self.model
    }

    pub fn registry(&self) -> &EventRegistry<A, P> {
        &self.registry
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn event_log(&self) -> &EventLog {
        self.model.event_log()
    }

    pub fn clear_event_log(&mut self) {
        self.model.clear_event_log();
    }

    /// Mutable access to the RNG stream, for randomness drawn between runs
    /// (e.g. random initial positions) that must stay on the same stream
    pub fn rng_mut(&mut self) -> &mut RngManager {
        &mut self.rng
    }

    pub(crate) fn rng(&self) -> &RngManager {
        &self.rng
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.registry.kind_id(name)
    }

    pub fn event_id(&self, name: &str) -> Option<EventKindId> {
        self.registry.event_id(name)
    }
}
