//! Tick pipeline
//!
//! Every tick runs three ordered phases, each flushed before the next begins:
//!
//! 1. **AttributeResolution** - effective attributes of every actor
//! 2. **EffectStacks** - damage accrual, gated commits, stack and unique effect expiry
//! 3. **SkillsAndTriggers** - timers, triggers, rotation casts, child cleanup
//!
//! Once a system raises a fault, every remaining system of the tick is skipped.

use bevy::prelude::*;

pub use super::attributes::{log_initial_attributes, resolve_effective_attributes};
pub use super::effects::{accrue_condition_damage, commit_buffered_damage, expire_effect_stacks};
pub use super::skills::{
    advance_skill_timers, cast_rotation_skills, destroy_finished_children, fire_skill_triggers,
};
pub use super::tick::simulation_healthy;
pub use super::uniques::expire_unique_effects;

/// System set labels for the tick phases.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum TickPhase {
    /// Phase 1: derive effective attributes
    AttributeResolution,
    /// Phase 2: condition damage and stack lifetimes
    EffectStacks,
    /// Phase 3: skills, triggers and child actors
    SkillsAndTriggers,
}

/// Configures the ordering between tick phases.
pub fn configure_tick_phases(app: &mut App) {
    app.configure_sets(
        Update,
        (
            TickPhase::AttributeResolution,
            TickPhase::EffectStacks,
            TickPhase::SkillsAndTriggers,
        )
            .chain(),
    );
}

/// Adds the tick pipeline to the app.
pub fn add_tick_systems(app: &mut App) {
    // Phase 1: Attribute Resolution
    app.add_systems(
        Update,
        (resolve_effective_attributes, log_initial_attributes)
            .chain()
            .in_set(TickPhase::AttributeResolution)
            .distributive_run_if(simulation_healthy),
    );

    app.add_systems(
        Update,
        apply_deferred
            .after(TickPhase::AttributeResolution)
            .before(TickPhase::EffectStacks),
    );

    // Phase 2: Effect Stacks
    app.add_systems(
        Update,
        (
            accrue_condition_damage,
            commit_buffered_damage,
            expire_effect_stacks,
            expire_unique_effects,
        )
            .chain()
            .in_set(TickPhase::EffectStacks)
            .distributive_run_if(simulation_healthy),
    );

    app.add_systems(
        Update,
        apply_deferred
            .after(TickPhase::EffectStacks)
            .before(TickPhase::SkillsAndTriggers),
    );

    // Phase 3: Skills and Triggers
    app.add_systems(
        Update,
        (
            advance_skill_timers,
            fire_skill_triggers,
            cast_rotation_skills,
            destroy_finished_children,
        )
            .chain()
            .in_set(TickPhase::SkillsAndTriggers)
            .distributive_run_if(simulation_healthy),
    );
}
