//! Agent model
//!
//! An agent is a stable id, a kind tag and arbitrary domain state `A`.
//! The kind tag only decides which event definitions can apply; all domain
//! behavior lives in the user's state type and in event actions.
//!
//! CRITICAL: Only ids are safe to hold across event executions. Any event
//! may remove or replace other agents.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable agent identifier
///
/// Ids index the model's agent arena and are never reused, so an id that
/// once referred to a removed agent can never start referring to a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub(crate) u64);

impl AgentId {
    /// Raw integer value of the id
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Agent kind tag, resolved from a kind name declared in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KindId(pub(crate) u16);

impl KindId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind{}", self.0)
    }
}

/// A live agent
///
/// # Example
/// ```
/// use event_queue_core_rs::{Model, RegistryBuilder};
///
/// let mut builder = RegistryBuilder::<u32, ()>::new();
/// let rabbit = builder.add_kind("rabbit").unwrap();
/// let registry = builder.build();
///
/// let mut model = Model::new(&registry, ());
/// let id = model.add_agent(rabbit, 3).unwrap();
///
/// let agent = model.agent(id).unwrap();
/// assert_eq!(agent.kind(), rabbit);
/// assert_eq!(*agent.state(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent<A> {
    id: AgentId,
    kind: KindId,
    state: A,
}

impl<A> Agent<A> {
    pub(crate) fn new(id: AgentId, kind: KindId, state: A) -> Self {
        Self { id, kind, state }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn kind(&self) -> KindId {
        self.kind
    }

    /// Domain state
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Mutable domain state
    pub fn state_mut(&mut self) -> &mut A {
        &mut self.state
    }

    pub(crate) fn into_state(self) -> A {
        self.state
    }
}
