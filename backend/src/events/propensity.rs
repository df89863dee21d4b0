//! Propensity evaluation
//!
//! Produces, for one agent and the current model state, the weight of every
//! event applicable to the agent's kind. Constant propensities are read
//! directly; computed propensities are called fresh on every evaluation.
//!
//! CRITICAL: Never cache weights across scheduling points. Model state
//! changes between draws and computed propensities may read any of it.

use crate::events::registry::EventRegistry;
use crate::events::types::{ConfigError, EventKindId, Propensity};
use crate::models::agent::Agent;
use crate::models::state::Model;

/// Ordered `(event kind, weight)` pairs for one agent
///
/// Empty means the agent is dormant: nothing applies, or every applicable
/// weight is zero. Zero weights are kept when at least one weight is
/// positive; the selector skips them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropensityWeights {
    events: Vec<EventKindId>,
    weights: Vec<f64>,
}

impl PropensityWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.weights.clear();
    }

    fn push(&mut self, event: EventKindId, weight: f64) {
        self.events.push(event);
        self.weights.push(weight);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Dormancy signal
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[EventKindId] {
        &self.events
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    pub fn weight_of(&self, event: EventKindId) -> Option<f64> {
        self.events
            .iter()
            .position(|e| *e == event)
            .map(|idx| self.weights[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (EventKindId, f64)> + '_ {
        self.events.iter().copied().zip(self.weights.iter().copied())
    }
}

/// Evaluate all applicable propensities for `agent` into `out`
///
/// `out` is cleared first so the scheduler can reuse one buffer.
///
/// # Errors
///
/// `InvalidPropensityForAgent` if a computed propensity is negative or not
/// finite. This is a configuration error and is not retried.
pub fn evaluate_into<A, P>(
    registry: &EventRegistry<A, P>,
    agent: &Agent<A>,
    model: &Model<A, P>,
    out: &mut PropensityWeights,
) -> Result<(), ConfigError> {
    out.clear();
    let mut any_positive = false;

    for &event in registry.events_for_kind(agent.kind()) {
        let definition = registry.event(event).ok_or(ConfigError::UnknownEvent(event))?;
        let weight = match definition.propensity() {
            Propensity::Constant(value) => *value,
            Propensity::Dynamic(compute) => compute(agent, model),
        };

        if !weight.is_finite() || weight < 0.0 {
            out.clear();
            return Err(ConfigError::InvalidPropensityForAgent {
                event: definition.name().to_string(),
                agent: agent.id(),
                value: weight,
            });
        }

        any_positive |= weight > 0.0;
        out.push(event, weight);
    }

    if !any_positive {
        out.clear();
    }
    Ok(())
}

/// Evaluate all applicable propensities for `agent`
pub fn evaluate<A, P>(
    registry: &EventRegistry<A, P>,
    agent: &Agent<A>,
    model: &Model<A, P>,
) -> Result<PropensityWeights, ConfigError> {
    let mut out = PropensityWeights::new();
    evaluate_into(registry, agent, model, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventDefinition, RegistryBuilder};

    /// Agent state: hunger. Model properties: season multiplier.
    fn registry() -> EventRegistry<f64, f64> {
        let mut builder = RegistryBuilder::<f64, f64>::new();
        builder.add_kind("fox").unwrap();
        builder.add_kind("rock").unwrap();
        builder
            .register_event(
                EventDefinition::<f64, f64>::new("hunt", |_, _, _| Ok(()))
                    .with_propensity_fn(|agent, model| *agent.state() * *model.properties())
                    .applies_to(["fox"]),
            )
            .unwrap();
        builder
            .register_event(
                EventDefinition::new("sleep", |_, _, _| Ok(()))
                    .with_propensity(0.25)
                    .applies_to(["fox"]),
            )
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_weights_follow_registration_order() {
        let registry = registry();
        let mut model = Model::new(&registry, 2.0);
        let fox = model.add_agent(registry.kind_id("fox").unwrap(), 1.5).unwrap();

        let weights = evaluate(&registry, model.agent(fox).unwrap(), &model).unwrap();
        let pairs: Vec<_> = weights.iter().collect();
        assert_eq!(
            pairs,
            vec![
                (registry.event_id("hunt").unwrap(), 3.0),
                (registry.event_id("sleep").unwrap(), 0.25)
            ]
        );
        assert_eq!(weights.total(), 3.25);
    }

    #[test]
    fn test_dynamic_propensity_reevaluated_each_call() {
        let registry = registry();
        let mut model = Model::new(&registry, 1.0);
        let fox = model.add_agent(registry.kind_id("fox").unwrap(), 1.0).unwrap();
        let hunt = registry.event_id("hunt").unwrap();

        let before = evaluate(&registry, model.agent(fox).unwrap(), &model).unwrap();
        *model.properties_mut() = 4.0;
        let after = evaluate(&registry, model.agent(fox).unwrap(), &model).unwrap();

        assert_eq!(before.weight_of(hunt), Some(1.0));
        assert_eq!(after.weight_of(hunt), Some(4.0));
    }

    #[test]
    fn test_no_applicable_events_is_dormant() {
        let registry = registry();
        let mut model = Model::new(&registry, 1.0);
        let rock = model.add_agent(registry.kind_id("rock").unwrap(), 0.0).unwrap();

        let weights = evaluate(&registry, model.agent(rock).unwrap(), &model).unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn test_zero_weights_kept_alongside_positive() {
        let registry = registry();
        let mut model = Model::new(&registry, 0.0);
        let fox = model.add_agent(registry.kind_id("fox").unwrap(), 1.0).unwrap();

        let weights = evaluate(&registry, model.agent(fox).unwrap(), &model).unwrap();
        assert_eq!(weights.len(), 2);
        assert_eq!(weights.weight_of(registry.event_id("hunt").unwrap()), Some(0.0));
    }

    #[test]
    fn test_all_zero_weights_is_dormant() {
        let mut builder = RegistryBuilder::<(), ()>::new();
        builder.add_kind("seed").unwrap();
        builder
            .register_event(EventDefinition::new("sprout", |_, _, _| Ok(())).with_propensity(0.0))
            .unwrap();
        let registry = builder.build();
        let mut model = Model::new(&registry, ());
        let seed = model.add_agent(registry.kind_id("seed").unwrap(), ()).unwrap();

        let weights = evaluate(&registry, model.agent(seed).unwrap(), &model).unwrap();
        assert!(weights.is_empty());
    }

    #[test]
    fn test_negative_dynamic_propensity_is_config_error() {
        let registry = registry();
        let mut model = Model::new(&registry, -1.0);
        let fox = model.add_agent(registry.kind_id("fox").unwrap(), 1.0).unwrap();

        let mut out = PropensityWeights::new();
        let err = evaluate_into(&registry, model.agent(fox).unwrap(), &model, &mut out).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPropensityForAgent { ref event, value, .. }
                if event == "hunt" && value == -1.0
        ));
        assert!(out.is_empty());
    }
}
