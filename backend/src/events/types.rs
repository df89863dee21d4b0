//! Event definition types
//!
//! An event definition is the immutable description of one kind of thing
//! that can happen to an agent:
//!
//! - **action**: mutates the model in place; its side effects are the result
//! - **propensity**: constant or computed weight, re-evaluated at every draw
//! - **applicability**: which agent kinds the event can apply to
//! - **timing**: waiting time given the chosen propensity (default: exponential)
//!
//! Definitions are registered once through [`RegistryBuilder`] and never
//! change afterwards.
//!
//! [`RegistryBuilder`]: crate::events::RegistryBuilder

use crate::models::agent::{Agent, AgentId};
use crate::models::state::{Model, ModelError};
use crate::rng::RngManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Index of a registered event definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKindId(pub(crate) u32);

impl EventKindId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventKindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event{}", self.0)
    }
}

/// Configuration errors
///
/// Fatal: raised at registration, or at the first evaluation that exposes
/// them, and never retried.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Propensity of event '{event}' must be finite and non-negative, got {value}")]
    InvalidPropensity { event: String, value: f64 },

    #[error("Propensity of event '{event}' for agent {agent} must be finite and non-negative, got {value}")]
    InvalidPropensityForAgent {
        event: String,
        agent: AgentId,
        value: f64,
    },

    #[error("Timing of event '{event}' for agent {agent} must be finite and non-negative, got {value}")]
    InvalidDelay {
        event: String,
        agent: AgentId,
        value: f64,
    },

    #[error("Unknown agent kind '{0}'")]
    UnknownKind(String),

    #[error("Agent kind '{0}' is already declared")]
    DuplicateKind(String),

    #[error("Event '{0}' is already registered")]
    DuplicateEvent(String),

    #[error("Event '{event}' has an empty applicability set")]
    EmptyApplicability { event: String },

    #[error("Unknown event id {0}")]
    UnknownEvent(EventKindId),

    #[error("Event '{event}' does not apply to agent {agent} of kind '{kind}'")]
    NotApplicable {
        event: String,
        agent: AgentId,
        kind: String,
    },

    #[error("Too many {0} registered")]
    CapacityExceeded(&'static str),
}

/// Error returned by a user-supplied action
///
/// Any action error halts the run and is propagated to the caller. The
/// engine does not roll back what the action already did.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A model operation inside the action failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Domain-level failure with a message
    #[error("{0}")]
    Failed(String),

    /// Any other error raised by user code
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ActionError {
    /// Shorthand for [`ActionError::Failed`]
    pub fn msg(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

/// Action: `(acting agent, model, rng) -> Result`
pub type ActionFn<A, P> =
    Box<dyn Fn(AgentId, &mut Model<A, P>, &mut RngManager) -> Result<(), ActionError>>;

/// Computed propensity: `(agent, model) -> weight`
pub type PropensityFn<A, P> = Box<dyn Fn(&Agent<A>, &Model<A, P>) -> f64>;

/// Timing: `(agent, model, chosen propensity, rng) -> waiting time`
pub type TimingFn<A, P> = Box<dyn Fn(&Agent<A>, &Model<A, P>, f64, &mut RngManager) -> f64>;

/// Event weight for a given agent
pub enum Propensity<A, P> {
    /// Fixed weight, validated at registration
    Constant(f64),

    /// Weight computed from the agent and model every time the agent is
    /// (re)scheduled. Never cached.
    Dynamic(PropensityFn<A, P>),
}

impl<A, P> Propensity<A, P> {
    pub fn is_constant(&self) -> bool {
        matches!(self, Propensity::Constant(_))
    }
}

impl<A, P> fmt::Debug for Propensity<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Propensity::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Propensity::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Which agent kinds an event applies to, by kind name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applicability {
    /// Every declared kind
    All,
    /// Only the named kinds
    Kinds(Vec<String>),
}

/// Definition of one event kind
///
/// # Example
/// ```
/// use event_queue_core_rs::{ActionError, EventDefinition};
///
/// // Rabbits (state = energy) lose energy when they move
/// let movement = EventDefinition::<u32, ()>::new("move", |id, model, _rng| {
///     let energy = model.agent_mut(id)?.state_mut();
///     *energy = energy.saturating_sub(1);
///     Ok::<(), ActionError>(())
/// })
/// .with_propensity(0.5)
/// .applies_to(["rabbit"]);
///
/// assert_eq!(movement.name(), "move");
/// ```
pub struct EventDefinition<A, P> {
    name: String,
    action: ActionFn<A, P>,
    propensity: Propensity<A, P>,
    applicability: Applicability,
    timing: Option<TimingFn<A, P>>,
}

impl<A, P> EventDefinition<A, P> {
    /// New definition with propensity 1.0, applicable to all kinds and
    /// with exponential timing
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(AgentId, &mut Model<A, P>, &mut RngManager) -> Result<(), ActionError> + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(action),
            propensity: Propensity::Constant(1.0),
            applicability: Applicability::All,
            timing: None,
        }
    }

    /// Constant propensity
    pub fn with_propensity(mut self, value: f64) -> Self {
        self.propensity = Propensity::Constant(value);
        self
    }

    /// Propensity recomputed from `(agent, model)` at every draw
    pub fn with_propensity_fn<F>(mut self, propensity: F) -> Self
    where
        F: Fn(&Agent<A>, &Model<A, P>) -> f64 + 'static,
    {
        self.propensity = Propensity::Dynamic(Box::new(propensity));
        self
    }

    /// Restrict the event to the named agent kinds
    pub fn applies_to<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicability = Applicability::Kinds(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the default exponential timing
    pub fn with_timing<F>(mut self, timing: F) -> Self
    where
        F: Fn(&Agent<A>, &Model<A, P>, f64, &mut RngManager) -> f64 + 'static,
    {
        self.timing = Some(Box::new(timing));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn propensity(&self) -> &Propensity<A, P> {
        &self.propensity
    }

    pub fn applicability(&self) -> &Applicability {
        &self.applicability
    }

    pub(crate) fn action(&self) -> &ActionFn<A, P> {
        &self.action
    }

    pub(crate) fn timing(&self) -> Option<&TimingFn<A, P>> {
        self.timing.as_ref()
    }
}

impl<A, P> fmt::Debug for EventDefinition<A, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDefinition")
            .field("name", &self.name)
            .field("propensity", &self.propensity)
            .field("applicability", &self.applicability)
            .field("custom_timing", &self.timing.is_some())
            .finish()
    }
}
