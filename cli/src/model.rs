//! Wolf-sheep predation model on the event-queue engine
//!
//! Sheep graze a shared pasture that regrows continuously, wolves hunt
//! sheep, and both breed when well fed and die when starving. Every rate is
//! a propensity re-evaluated at each draw, so populations and grass feed
//! back into the event mix.

use event_queue_core_rs::{
    ActionError, Agent, AgentId, EventDefinition, EventRegistry, KindId, Model, RegistryBuilder,
    SimulationError,
};
use serde::{Deserialize, Serialize};

/// Tunable rates, loaded from the demo config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredationParams {
    pub initial_sheep: usize,
    pub initial_wolves: usize,
    pub initial_energy: u32,
    pub grass_max: f64,
    pub grass_regrowth: f64,
    pub graze_rate: f64,
    pub hunt_rate: f64,
    pub sheep_breed_rate: f64,
    pub wolf_breed_rate: f64,
    pub sheep_breed_energy: u32,
    pub wolf_breed_energy: u32,
    pub wolf_gain: u32,
    pub metabolism_rate: f64,
    /// Stop once the total population exceeds this
    pub population_limit: usize,
}

impl Default for PredationParams {
    fn default() -> Self {
        Self {
            initial_sheep: 100,
            initial_wolves: 20,
            initial_energy: 4,
            grass_max: 200.0,
            grass_regrowth: 20.0,
            graze_rate: 1.0,
            hunt_rate: 0.02,
            sheep_breed_rate: 0.4,
            wolf_breed_rate: 0.3,
            sheep_breed_energy: 4,
            wolf_breed_energy: 12,
            wolf_gain: 4,
            metabolism_rate: 0.5,
            population_limit: 5_000,
        }
    }
}

/// Agent state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Animal {
    pub energy: u32,
}

/// Model properties: the pasture plus the rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pasture {
    pub grass: f64,
    /// Time the grass level was last brought up to date
    pub updated_at: f64,
    pub params: PredationParams,
}

impl Pasture {
    pub fn new(params: PredationParams) -> Self {
        Self {
            grass: params.grass_max,
            updated_at: 0.0,
            params,
        }
    }

    /// Grass available at `now`, including regrowth since the last update
    pub fn grass_at(&self, now: f64) -> f64 {
        let regrown = self.grass + self.params.grass_regrowth * (now - self.updated_at);
        regrown.min(self.params.grass_max)
    }

    fn settle(&mut self, now: f64) {
        self.grass = self.grass_at(now);
        self.updated_at = now;
    }
}

pub type PredationModel = Model<Animal, Pasture>;
type Def = EventDefinition<Animal, Pasture>;

/// Kind ids of the two species
#[derive(Debug, Clone, Copy)]
pub struct Species {
    pub sheep: KindId,
    pub wolf: KindId,
}

fn energy(agent: &Agent<Animal>) -> u32 {
    agent.state().energy
}

/// Split the parent's energy with a newborn of the same kind
fn give_birth(id: AgentId, model: &mut PredationModel) -> Result<(), ActionError> {
    let parent = model.agent_mut(id)?;
    let kind = parent.kind();
    let share = parent.state().energy / 2;
    parent.state_mut().energy -= share;
    model.add_agent(kind, Animal { energy: share })?;
    Ok(())
}

/// Register both species and their events
pub fn build_registry() -> Result<(EventRegistry<Animal, Pasture>, Species), SimulationError> {
    let mut builder = RegistryBuilder::<Animal, Pasture>::new();
    let sheep = builder.add_kind("sheep")?;
    let wolf = builder.add_kind("wolf")?;

    builder.register_event(
        Def::new("graze", |id, model, _| {
            let now = model.time();
            let pasture = model.properties_mut();
            pasture.settle(now);
            if pasture.grass >= 1.0 {
                pasture.grass -= 1.0;
                model.agent_mut(id)?.state_mut().energy += 1;
            }
            Ok(())
        })
        .with_propensity_fn(|_, model| {
            let pasture = model.properties();
            pasture.params.graze_rate * pasture.grass_at(model.time()) / pasture.params.grass_max
        })
        .applies_to(["sheep"]),
    )?;

    builder.register_event(
        Def::new("hunt", move |id, model, rng| {
            if let Some(prey) = model.random_agent_of_kind(sheep, rng) {
                model.remove_agent(prey)?;
                let gain = model.properties().params.wolf_gain;
                model.agent_mut(id)?.state_mut().energy += gain;
            }
            Ok(())
        })
        .with_propensity_fn(move |_, model| {
            model.properties().params.hunt_rate * model.count_kind(sheep) as f64
        })
        .applies_to(["wolf"]),
    )?;

    builder.register_event(
        Def::new("sheep_breed", |id, model, _| give_birth(id, model))
            .with_propensity_fn(|agent, model| {
                let params = &model.properties().params;
                if energy(agent) >= params.sheep_breed_energy {
                    params.sheep_breed_rate
                } else {
                    0.0
                }
            })
            .applies_to(["sheep"]),
    )?;

    builder.register_event(
        Def::new("wolf_breed", |id, model, _| give_birth(id, model))
            .with_propensity_fn(|agent, model| {
                let params = &model.properties().params;
                if energy(agent) >= params.wolf_breed_energy {
                    params.wolf_breed_rate
                } else {
                    0.0
                }
            })
            .applies_to(["wolf"]),
    )?;

    // Burning energy; an exhausted animal dies on its next metabolism event
    builder.register_event(
        Def::new("metabolize", |id, model, _| {
            let animal = model.agent_mut(id)?.state_mut();
            if animal.energy == 0 {
                model.remove_agent(id)?;
            } else {
                animal.energy -= 1;
            }
            Ok(())
        })
        .with_propensity_fn(|_, model| model.properties().params.metabolism_rate),
    )?;

    Ok((builder.build(), Species { sheep, wolf }))
}
