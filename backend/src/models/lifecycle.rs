//! Agent lifecycle tracking
//!
//! One generation counter and one liveness flag per agent slot, parallel to
//! the agent arena. A queue entry is live only while its agent is alive and
//! the entry's generation equals the agent's current one. Everything else is
//! a ghost and is discarded at pop time, so removals and reschedules never
//! have to touch the queue.

use crate::models::agent::AgentId;

/// Per-agent generation and liveness table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleTracker {
    generations: Vec<u64>,
    alive: Vec<bool>,
    live: usize,
}

impl LifecycleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from parallel generation/liveness vectors
    ///
    /// Returns `None` if the vectors differ in length.
    pub fn from_parts(generations: Vec<u64>, alive: Vec<bool>) -> Option<Self> {
        if generations.len() != alive.len() {
            return None;
        }
        let live = alive.iter().filter(|alive| **alive).count();
        Some(Self {
            generations,
            alive,
            live,
        })
    }

    /// Allocate the next id, alive with generation 0
    pub fn register(&mut self) -> AgentId {
        let id = AgentId(self.generations.len() as u64);
        self.generations.push(0);
        self.alive.push(true);
        self.live += 1;
        id
    }

    /// Current generation, for any id ever registered (dead ones included)
    pub fn generation(&self, id: AgentId) -> Option<u64> {
        self.generations.get(id.index()).copied()
    }

    /// Increment the generation of a live agent and return the new value
    ///
    /// Returns `None` for unknown or dead ids: a dead agent is never
    /// scheduled again.
    pub fn bump(&mut self, id: AgentId) -> Option<u64> {
        if !self.is_alive(id) {
            return None;
        }
        let generation = self.generations.get_mut(id.index())?;
        *generation += 1;
        Some(*generation)
    }

    pub fn is_alive(&self, id: AgentId) -> bool {
        self.alive.get(id.index()).copied().unwrap_or(false)
    }

    /// Whether an entry stamped with `generation` still governs `id`
    pub fn is_current(&self, id: AgentId, generation: u64) -> bool {
        self.is_alive(id) && self.generation(id) == Some(generation)
    }

    /// Mark an agent dead, permanently
    ///
    /// Returns `true` if the agent was alive.
    pub fn retire(&mut self, id: AgentId) -> bool {
        match self.alive.get_mut(id.index()) {
            Some(alive) if *alive => {
                *alive = false;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    /// Number of ids ever registered
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub(crate) fn generations(&self) -> &[u64] {
        &self.generations
    }

    pub(crate) fn liveness(&self) -> &[bool] {
        &self.alive
    }
}
