//! Event kind registry
//!
//! Built once at model construction: declare the agent kinds, register the
//! event definitions, then freeze everything into an [`EventRegistry`]. The
//! frozen registry precomputes, for every agent kind, the ordered list of
//! event kinds that can apply to it so that propensity evaluation never
//! scans definitions that cannot match.

use crate::events::types::{Applicability, ConfigError, EventDefinition, EventKindId, Propensity};
use crate::models::agent::KindId;

/// Collects kinds and event definitions before the registry is frozen
///
/// Kinds must be declared before any event that names them.
///
/// # Example
/// ```
/// use event_queue_core_rs::{EventDefinition, RegistryBuilder};
///
/// let mut builder = RegistryBuilder::<(), ()>::new();
/// let wolf = builder.add_kind("wolf").unwrap();
/// let sheep = builder.add_kind("sheep").unwrap();
///
/// let graze = builder
///     .register_event(EventDefinition::new("graze", |_, _, _| Ok(())).applies_to(["sheep"]))
///     .unwrap();
/// let roam = builder
///     .register_event(EventDefinition::new("roam", |_, _, _| Ok(())))
///     .unwrap();
///
/// let registry = builder.build();
/// assert_eq!(registry.events_for_kind(sheep), &[graze, roam]);
/// assert_eq!(registry.events_for_kind(wolf), &[roam]);
/// ```
pub struct RegistryBuilder<A, P> {
    kinds: Vec<String>,
    events: Vec<EventDefinition<A, P>>,
    /// Resolved kinds per event; `None` means all kinds
    resolved: Vec<Option<Vec<KindId>>>,
}

impl<A, P> RegistryBuilder<A, P> {
    pub fn new() -> Self {
        Self {
            kinds: Vec::new(),
            events: Vec::new(),
            resolved: Vec::new(),
        }
    }

    /// Declare an agent kind
    pub fn add_kind(&mut self, name: impl Into<String>) -> Result<KindId, ConfigError> {
        let name = name.into();
        if self.kinds.contains(&name) {
            return Err(ConfigError::DuplicateKind(name));
        }
        let id = u16::try_from(self.kinds.len())
            .map_err(|_| ConfigError::CapacityExceeded("agent kinds"))?;
        self.kinds.push(name);
        Ok(KindId(id))
    }

    /// Register an event definition
    ///
    /// # Errors
    ///
    /// * `InvalidPropensity` - constant propensity negative or non-finite
    /// * `UnknownKind` - applicability names an undeclared kind
    /// * `EmptyApplicability` - applicability lists no kinds
    /// * `DuplicateEvent` - name already registered
    pub fn register_event(
        &mut self,
        definition: EventDefinition<A, P>,
    ) -> Result<EventKindId, ConfigError> {
        if self.events.iter().any(|e| e.name() == definition.name()) {
            return Err(ConfigError::DuplicateEvent(definition.name().to_string()));
        }

        if let Propensity::Constant(value) = definition.propensity() {
            if !value.is_finite() || *value < 0.0 {
                return Err(ConfigError::InvalidPropensity {
                    event: definition.name().to_string(),
                    value: *value,
                });
            }
        }

        let resolved = match definition.applicability() {
            Applicability::All => None,
            Applicability::Kinds(names) => {
                if names.is_empty() {
                    return Err(ConfigError::EmptyApplicability {
                        event: definition.name().to_string(),
                    });
                }
                let mut kinds = Vec::with_capacity(names.len());
                for name in names {
                    let kind = self
                        .kind_id(name)
                        .ok_or_else(|| ConfigError::UnknownKind(name.clone()))?;
                    if !kinds.contains(&kind) {
                        kinds.push(kind);
                    }
                }
                Some(kinds)
            }
        };

        let id = u32::try_from(self.events.len())
            .map_err(|_| ConfigError::CapacityExceeded("event kinds"))?;
        self.events.push(definition);
        self.resolved.push(resolved);
        Ok(EventKindId(id))
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kinds
            .iter()
            .position(|k| k == name)
            .map(|idx| KindId(idx as u16))
    }

    /// Freeze into an immutable registry
    pub fn build(self) -> EventRegistry<A, P> {
        let mut by_kind: Vec<Vec<EventKindId>> = vec![Vec::new(); self.kinds.len()];
        for (idx, resolved) in self.resolved.iter().enumerate() {
            let event = EventKindId(idx as u32);
            match resolved {
                None => by_kind.iter_mut().for_each(|events| events.push(event)),
                Some(kinds) => {
                    for kind in kinds {
                        by_kind[kind.index()].push(event);
                    }
                }
            }
        }

        EventRegistry {
            kinds: self.kinds,
            events: self.events,
            by_kind,
        }
    }
}

impl<A, P> Default for RegistryBuilder<A, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable set of agent kinds and event definitions
pub struct EventRegistry<A, P> {
    kinds: Vec<String>,
    events: Vec<EventDefinition<A, P>>,
    by_kind: Vec<Vec<EventKindId>>,
}

impl<A, P> EventRegistry<A, P> {
    /// Number of event kinds
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn num_kinds(&self) -> usize {
        self.kinds.len()
    }

    pub fn kind_names(&self) -> &[String] {
        &self.kinds
    }

    pub fn kind_name(&self, kind: KindId) -> Option<&str> {
        self.kinds.get(kind.index()).map(String::as_str)
    }

    pub fn kind_id(&self, name: &str) -> Option<KindId> {
        self.kinds
            .iter()
            .position(|k| k == name)
            .map(|idx| KindId(idx as u16))
    }

    pub fn event(&self, id: EventKindId) -> Option<&EventDefinition<A, P>> {
        self.events.get(id.index())
    }

    pub fn event_id(&self, name: &str) -> Option<EventKindId> {
        self.events
            .iter()
            .position(|e| e.name() == name)
            .map(|idx| EventKindId(idx as u32))
    }

    /// Event names in registration order
    pub fn event_names(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.name()).collect()
    }

    /// Event kinds applicable to `kind`, in registration order
    pub fn events_for_kind(&self, kind: KindId) -> &[EventKindId] {
        self.by_kind
            .get(kind.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn applies(&self, event: EventKindId, kind: KindId) -> bool {
        self.events_for_kind(kind).contains(&event)
    }
}

impl<A, P> std::fmt::Debug for EventRegistry<A, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kinds", &self.kinds)
            .field("events", &self.events)
            .finish()
    }
}
