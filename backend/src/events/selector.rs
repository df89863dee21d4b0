//! Next-event selection
//!
//! Gillespie-style direct method: one categorical draw picks the event kind
//! in proportion to its propensity, then the chosen kind's timing function
//! draws the waiting time from that kind's own propensity. Equivalent to
//! racing one exponential clock per applicable event and keeping the
//! earliest, with two draws instead of one per event.

use crate::events::propensity::PropensityWeights;
use crate::events::registry::EventRegistry;
use crate::events::types::{ConfigError, EventKindId};
use crate::models::agent::Agent;
use crate::models::state::Model;
use crate::rng::RngManager;

/// Outcome of selecting an agent's next event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Selection {
    /// The agent's next event and its absolute trigger time
    Scheduled {
        event: EventKindId,
        propensity: f64,
        trigger_time: f64,
    },
    /// No positive-weight event: the agent gets no entry
    Dormant,
}

/// Select `agent`'s next event from precomputed `weights`
///
/// Draws from `rng` only when some weight is positive: one draw for the
/// event kind, then whatever the timing function consumes (one draw for the
/// default exponential timing). If the default timing overflows to an
/// infinite wait (a positive but subnormal propensity), the agent is
/// `Dormant` after both draws.
///
/// # Errors
///
/// `InvalidDelay` if a custom timing function returns a negative or
/// non-finite waiting time.
pub fn select_next_event<A, P>(
    registry: &EventRegistry<A, P>,
    weights: &PropensityWeights,
    agent: &Agent<A>,
    model: &Model<A, P>,
    rng: &mut RngManager,
) -> Result<Selection, ConfigError> {
    let Some(idx) = rng.weighted_index(weights.weights()) else {
        return Ok(Selection::Dormant);
    };
    let event = weights.events()[idx];
    let propensity = weights.weights()[idx];

    let definition = registry.event(event).ok_or(ConfigError::UnknownEvent(event))?;
    let delay = match definition.timing() {
        Some(timing) => timing(agent, model, propensity, rng),
        None => {
            let delay = rng.exponential(propensity);
            // A vanishing rate can push the wait past f64 range: it never fires
            if !(model.time() + delay).is_finite() {
                return Ok(Selection::Dormant);
            }
            delay
        }
    };

    let trigger_time = model.time() + delay;
    if !delay.is_finite() || delay < 0.0 || !trigger_time.is_finite() {
        return Err(ConfigError::InvalidDelay {
            event: definition.name().to_string(),
            agent: agent.id(),
            value: delay,
        });
    }

    Ok(Selection::Scheduled {
        event,
        propensity,
        trigger_time,
    })
}
