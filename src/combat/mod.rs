//! Combat simulation core
//!
//! Implements the tick-driven simulation:
//! - Actor, skill and unique effect entities (`components`, `store`)
//! - Boon and condition stacks with buffered damage (`effects`)
//! - Effective attribute resolution with conditional modifiers (`attributes`, `conditions`)
//! - Skill casting, triggers and child actors (`skills`, `uniques`, `actors`)
//! - The tick scheduler and reporting snapshots (`tick`, `snapshot`)

use bevy::prelude::*;

pub mod actors;
pub mod attributes;
pub mod components;
pub mod conditions;
pub mod config;
pub mod constants;
pub mod effects;
pub mod error;
pub mod log;
pub mod skills;
pub mod snapshot;
pub mod store;
pub mod systems;
pub mod tick;
pub mod uniques;

use systems::{add_tick_systems, configure_tick_phases};

/// Plugin for the simulation core
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<log::CombatLog>()
            .init_resource::<tick::SimulationFault>()
            .init_resource::<tick::TickContext>()
            .init_resource::<config::SkillCatalog>();

        configure_tick_phases(app);
        add_tick_systems(app);
    }
}
