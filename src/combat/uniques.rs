//! Unique effects
//!
//! A unique effect is an entity held by an actor. Every instance may carry its own
//! attribute rules and skill triggers, all gated on the holder still having an
//! effect with the same key. Holders never exceed `max_stored_stacks` instances;
//! anything past the cap is simply not created.

use bevy::prelude::*;

use super::components::{AttributeRules, Owner, OwnedUniqueEffects};
use super::conditions::Condition;
use super::config::SkillCatalog;
use super::effects::duration_ticks;
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::skills::{SkillTrigger, SkillTriggers};
use super::store;
use super::tick::{Tick, TickContext};

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct UniqueEffect {
    pub key: String,
}

/// Tick on which a timed unique effect is removed.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueEffectExpiry(pub Tick);

/// Give `holder` a new instance of the unique effect `key`.
///
/// Returns `Ok(None)` when the holder is already at the cap. An unknown key is a
/// configuration error.
pub fn add_unique_effect(
    world: &mut World,
    holder: Entity,
    key: &str,
    now: Tick,
) -> Result<Option<Entity>> {
    let config = world
        .resource::<SkillCatalog>()
        .unique_effect(key)
        .cloned()
        .ok_or_else(|| SimulationError::UnknownUniqueEffect {
            actor: store::entity_name(world, holder),
            unique_effect: key.to_string(),
        })?;

    let held = store::unique_effect_count(world, holder, key);
    if held >= config.max_stored_stacks as usize {
        let message = format!(
            "{} already holds {} of {} '{}'",
            store::entity_name(world, holder),
            held,
            config.max_stored_stacks,
            key
        );
        debug!("{}", message);
        world
            .resource_mut::<CombatLog>()
            .log(CombatLogEventType::UniqueEffectRejected, message);
        return Ok(None);
    }

    let gate = Condition::UniqueEffectPresent(key.to_string());
    let rules = AttributeRules::gated(&config.modifiers, &config.conversions, &gate);
    let triggers = SkillTriggers(
        config
            .triggers
            .iter()
            .map(|trigger| {
                SkillTrigger::new(gate.clone().and(trigger.condition.clone()), &trigger.skills)
            })
            .collect(),
    );
    let name = Name::new(format!("{}::{}", store::entity_name(world, holder), key));
    let expiry = config.duration_ms.map(|duration_ms| {
        let tick_rate_ms = world.resource::<TickContext>().tick_rate_ms;
        UniqueEffectExpiry(now + duration_ticks(duration_ms as f64, tick_rate_ms).max(1))
    });

    let mut entity = world.spawn((
        UniqueEffect {
            key: key.to_string(),
        },
        Owner(holder),
        rules,
        triggers,
        name,
    ));
    if let Some(expiry) = expiry {
        entity.insert(expiry);
    }
    let unique_effect = entity.id();

    match world.get_mut::<OwnedUniqueEffects>(holder) {
        Some(mut held) => held.0.push(unique_effect),
        None => {
            world.despawn(unique_effect);
            return Err(SimulationError::MissingComponent {
                entity: holder,
                component: "OwnedUniqueEffects",
            });
        }
    }

    let message = format!(
        "{} gains '{}' ({}/{})",
        store::entity_name(world, holder),
        key,
        held + 1,
        config.max_stored_stacks
    );
    world
        .resource_mut::<CombatLog>()
        .log(CombatLogEventType::UniqueEffectAdded, message);
    Ok(Some(unique_effect))
}

/// Remove timed unique effects whose lifetime ended on this tick.
pub fn expire_unique_effects(world: &mut World) {
    let tick = world.resource::<TickContext>().tick;
    let mut query = world.query::<(Entity, &UniqueEffectExpiry, &Owner)>();
    let mut expired: Vec<(Entity, Entity)> = query
        .iter(world)
        .filter(|(_, expiry, _)| expiry.0 <= tick)
        .map(|(entity, _, owner)| (entity, owner.0))
        .collect();
    expired.sort();

    for (unique_effect, holder) in expired {
        let label = store::entity_name(world, unique_effect);
        if let Some(mut held) = world.get_mut::<OwnedUniqueEffects>(holder) {
            held.0.retain(|e| *e != unique_effect);
        }
        world.despawn(unique_effect);
        world
            .resource_mut::<CombatLog>()
            .log(CombatLogEventType::UniqueEffectExpired, format!("{label} expired"));
    }
}
