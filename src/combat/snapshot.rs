//! Post-tick state exposed to reporting.
//!
//! A snapshot is a plain serializable copy of everything observable about each
//! actor. Entries are ordered by entity, so two identical runs serialize to
//! byte-identical JSON.

use bevy::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use super::attributes::Attributes;
use super::components::{Actor, EffectiveAttributes, OwnedSkills, OwnedUniqueEffects, Team};
use super::effects::{ActiveEffects, EffectType, EffectiveIncomingDamage};
use super::skills::{Skill, SkillState};
use super::store;
use super::tick::{Tick, TickContext};
use super::uniques::UniqueEffect;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillSnapshot {
    pub key: String,
    pub ammo: u32,
    pub max_ammo: u32,
    pub cooldown: Tick,
    pub recharge: Tick,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSnapshot {
    pub effect: EffectType,
    pub stacks: usize,
    pub buffered_damage: f64,
    /// Stack count per source actor name.
    pub sources: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorSnapshot {
    pub name: String,
    pub team: u8,
    /// `None` until the actor's attributes have been resolved once.
    pub effective_attributes: Option<Attributes>,
    pub incoming_damage: EffectiveIncomingDamage,
    pub skills: Vec<SkillSnapshot>,
    pub effects: Vec<EffectSnapshot>,
    /// Held unique effects per key.
    pub unique_effects: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSnapshot {
    pub tick: Tick,
    pub actors: Vec<ActorSnapshot>,
}

impl TickSnapshot {
    pub fn capture(world: &World) -> Self {
        let tick = world
            .get_resource::<TickContext>()
            .map_or(0, |context| context.tick);

        let mut actors: Vec<Entity> = world
            .iter_entities()
            .filter(|e| e.contains::<Actor>())
            .map(|e| e.id())
            .collect();
        actors.sort();

        Self {
            tick,
            actors: actors
                .into_iter()
                .map(|actor| capture_actor(world, actor))
                .collect(),
        }
    }

    pub fn actor(&self, name: &str) -> Option<&ActorSnapshot> {
        self.actors.iter().find(|a| a.name == name)
    }
}

fn capture_actor(world: &World, actor: Entity) -> ActorSnapshot {
    let skills = world
        .get::<OwnedSkills>(actor)
        .map(|owned| {
            owned
                .0
                .iter()
                .filter_map(|skill| {
                    let key = world.get::<Skill>(*skill)?.key.clone();
                    let state = world.get::<SkillState>(*skill)?;
                    Some(SkillSnapshot {
                        key,
                        ammo: state.ammo,
                        max_ammo: state.max_ammo,
                        cooldown: state.cooldown,
                        recharge: state.recharge,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let effects = world
        .get::<ActiveEffects>(actor)
        .map(|active| {
            active
                .stacks
                .iter()
                .map(|(effect, stacks)| {
                    let mut sources = BTreeMap::new();
                    for record in &stacks.records {
                        *sources
                            .entry(store::entity_name(world, record.source))
                            .or_insert(0) += 1;
                    }
                    EffectSnapshot {
                        effect: *effect,
                        stacks: stacks.records.len(),
                        buffered_damage: stacks.buffered_damage,
                        sources,
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let mut unique_effects = BTreeMap::new();
    if let Some(held) = world.get::<OwnedUniqueEffects>(actor) {
        for unique_effect in held.0.iter().filter_map(|e| world.get::<UniqueEffect>(*e)) {
            *unique_effects.entry(unique_effect.key.clone()).or_insert(0) += 1;
        }
    }

    ActorSnapshot {
        name: store::entity_name(world, actor),
        team: world.get::<Team>(actor).map_or(0, |t| t.0),
        effective_attributes: world
            .get::<EffectiveAttributes>(actor)
            .filter(|e| e.computed_at.is_some())
            .map(|e| e.values.clone()),
        incoming_damage: world
            .get::<EffectiveIncomingDamage>(actor)
            .cloned()
            .unwrap_or_default(),
        skills,
        effects,
        unique_effects,
    }
}
