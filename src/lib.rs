//! combatsim - Tick-driven combat simulation engine
//!
//! Simulates scripted actors on a fixed discrete time step. Every tick derives
//! effective attributes, accrues and commits condition damage, and casts rotation
//! skills that may spawn short-lived child actors.
//!
//! This library exposes the simulation core and the headless runner for testing
//! and reuse.

pub mod cli;
pub mod combat;
pub mod headless;

// Re-export commonly used types
pub use combat::attributes::{Attribute, AttributeConversion, AttributeModifier, Attributes};
pub use combat::conditions::Condition;
pub use combat::config::{
    ActorSeed, EffectApplicationConfig, EffectTarget, InitialEffect, SimulationConfig,
    SkillCatalog, SkillConfig, TriggerConfig, UniqueEffectConfig,
};
pub use combat::effects::EffectType;
pub use combat::error::SimulationError;
pub use combat::log::{CombatLog, CombatLogEventType};
pub use combat::snapshot::TickSnapshot;
pub use combat::tick::{Simulation, SimulationState, StopHandle, TerminationReason, Tick};
pub use headless::HeadlessScenario;
