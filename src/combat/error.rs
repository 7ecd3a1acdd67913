//! Error taxonomy for the simulation core.
//!
//! Rejected operations (stack caps, casts while unavailable) are not errors and
//! never appear here. These variants are either fatal lifecycle violations raised
//! mid-run or configuration problems surfaced while actors are being built.

use bevy::prelude::Entity;
use thiserror::Error;

use super::effects::EffectType;
use super::tick::Tick;

pub type Result<T> = std::result::Result<T, SimulationError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error(
        "tick {tick}: {effect:?} stack on {target:?} references destroyed source {source_entity:?}"
    )]
    DanglingSource {
        tick: Tick,
        target: Entity,
        source_entity: Entity,
        effect: EffectType,
    },

    #[error("{entity:?} is missing required component {component}")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("actor '{actor}' references unknown skill '{skill}'")]
    UnknownSkill { actor: String, skill: String },

    #[error("actor '{actor}' references unknown unique effect '{unique_effect}'")]
    UnknownUniqueEffect {
        actor: String,
        unique_effect: String,
    },

    #[error("actor '{actor}' references unknown actor '{referenced}'")]
    UnknownActor { actor: String, referenced: String },

    #[error("rotation of '{actor}' casts '{skill}' which the actor does not own")]
    RotationSkillNotOwned { actor: String, skill: String },

    #[error("skill '{skill}' on '{actor}' applies effects to a target but the actor has none")]
    MissingTarget { actor: String, skill: String },

    #[error("actor name '{0}' is used more than once")]
    DuplicateActor(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
