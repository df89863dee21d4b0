//! Event kinds: definitions, registry, propensity evaluation and
//! next-event selection

pub mod propensity;
pub mod registry;
pub mod selector;
pub mod types;

pub use propensity::{evaluate, evaluate_into, PropensityWeights};
pub use registry::{EventRegistry, RegistryBuilder};
pub use selector::{select_next_event, Selection};
pub use types::{
    ActionError, ActionFn, Applicability, ConfigError, EventDefinition, EventKindId, Propensity,
    PropensityFn, TimingFn,
};
