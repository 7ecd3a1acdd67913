//! Actor construction
//!
//! Seeds are validated as a batch before anything is spawned, so a configuration
//! problem never leaves a half-built actor in the world. Skills and unique effects
//! become their own entities owned by the actor; their attribute rules are gated on
//! the owning skill being off cooldown or the unique effect being held.

use bevy::prelude::*;
use std::collections::BTreeSet;

use super::attributes::derive_effective_attributes;
use super::components::*;
use super::conditions::Condition;
use super::config::{ActorSeed, SkillCatalog};
use super::effects::apply_effect;
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::skills::{Skill, SkillState};
use super::store;
use super::tick::{Tick, TickContext};
use super::uniques::add_unique_effect;

/// Attach a new skill entity with `key` to `actor`.
pub fn attach_skill(world: &mut World, actor: Entity, key: &str) -> Result<Entity> {
    let config = world
        .resource::<SkillCatalog>()
        .skill(key)
        .cloned()
        .ok_or_else(|| SimulationError::UnknownSkill {
            actor: store::entity_name(world, actor),
            skill: key.to_string(),
        })?;
    let tick_rate_ms = world.resource::<TickContext>().tick_rate_ms;

    let rules = AttributeRules::gated(
        &config.modifiers,
        &config.conversions,
        &Condition::SkillOffCooldown(key.to_string()),
    );
    let skill = world
        .spawn((
            Skill {
                key: key.to_string(),
            },
            SkillState::from_config(&config, tick_rate_ms),
            Owner(actor),
            rules,
        ))
        .id();

    match world.get_mut::<OwnedSkills>(actor) {
        Some(mut skills) => skills.0.push(skill),
        None => {
            world.despawn(skill);
            return Err(SimulationError::MissingComponent {
                entity: actor,
                component: "OwnedSkills",
            });
        }
    }
    Ok(skill)
}

/// Spawn a child actor casting `skills` once, starting at `tick`.
///
/// The child is owned by the root of `parent`'s spawn chain, copies the parent's team
/// and target, and is destroyed once its rotation is exhausted.
pub fn spawn_child_actor(
    world: &mut World,
    parent: Entity,
    skills: &[String],
    tick: Tick,
) -> Result<Entity> {
    let root = store::root_owner(world, parent);
    let team = world.get::<Team>(parent).copied().unwrap_or_default();
    let targeting = world.get::<Targeting>(parent).copied();
    let name = format!("{}::{}", store::entity_name(world, parent), skills.join("+"));

    let child = world
        .spawn((
            Actor,
            ChildActor,
            DestroyAfterRotation,
            Owner(root),
            SpawnedBy(parent),
            team,
            Name::new(name.clone()),
        ))
        .id();
    if let Some(targeting) = targeting {
        world.entity_mut(child).insert(targeting);
    }

    for key in skills {
        if let Err(err) = attach_skill(world, child, key) {
            store::despawn_actor(world, child);
            return Err(err);
        }
    }
    world.entity_mut(child).insert(Rotation::new(
        skills
            .iter()
            .map(|skill| RotationEntry {
                skill: skill.clone(),
                at: tick,
            })
            .collect(),
    ));

    info!("Tick {}: spawned {}", tick, name);
    world
        .resource_mut::<CombatLog>()
        .log(CombatLogEventType::ChildSpawned, format!("{name} spawned"));
    Ok(child)
}

/// Check a batch of seeds against the catalog and the actors already in the world.
pub fn validate_seeds(world: &World, seeds: &[ActorSeed]) -> Result<()> {
    let catalog = world.resource::<SkillCatalog>();
    catalog.validate()?;

    let mut names: BTreeSet<&str> = BTreeSet::new();
    for seed in seeds {
        if seed.name.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "actor name must not be empty".to_string(),
            ));
        }
        if !names.insert(seed.name.as_str()) || store::find_actor(world, &seed.name).is_some() {
            return Err(SimulationError::DuplicateActor(seed.name.clone()));
        }
    }
    let known = |name: &str| names.contains(name) || store::find_actor(world, name).is_some();

    for seed in seeds {
        for skill in &seed.skills {
            if catalog.skill(skill).is_none() {
                return Err(SimulationError::UnknownSkill {
                    actor: seed.name.clone(),
                    skill: skill.clone(),
                });
            }
        }
        for unique_effect in &seed.unique_effects {
            if catalog.unique_effect(unique_effect).is_none() {
                return Err(SimulationError::UnknownUniqueEffect {
                    actor: seed.name.clone(),
                    unique_effect: unique_effect.clone(),
                });
            }
        }
        for entry in &seed.rotation {
            if !seed.skills.contains(&entry.skill) {
                return Err(SimulationError::RotationSkillNotOwned {
                    actor: seed.name.clone(),
                    skill: entry.skill.clone(),
                });
            }
        }
        if let Some(target) = &seed.target {
            if !known(target) {
                return Err(SimulationError::UnknownActor {
                    actor: seed.name.clone(),
                    referenced: target.clone(),
                });
            }
        }
        for initial in &seed.initial_effects {
            if !known(&initial.source) {
                return Err(SimulationError::UnknownActor {
                    actor: seed.name.clone(),
                    referenced: initial.source.clone(),
                });
            }
        }
        if seed.target.is_none() {
            let reachable = catalog.reachable_skills(&seed.skills, &seed.unique_effects);
            for skill in reachable {
                if catalog.skill(skill).is_some_and(|c| c.targets_enemy()) {
                    return Err(SimulationError::MissingTarget {
                        actor: seed.name.clone(),
                        skill: skill.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Validate and spawn a batch of actors. Returns the actor entities in seed order.
pub fn spawn_actors(world: &mut World, seeds: &[ActorSeed]) -> Result<Vec<Entity>> {
    validate_seeds(world, seeds)?;
    let context = *world.resource::<TickContext>();

    let actors: Vec<Entity> = seeds
        .iter()
        .map(|seed| {
            let mut actor = world.spawn((
                Actor,
                Name::new(seed.name.clone()),
                Team(seed.team),
                seed.base_class,
                StaticAttributes(seed.attributes.clone()),
                seed.dynamic.clone(),
                Loadout {
                    traits: seed.traits.iter().cloned().collect(),
                    rune: seed.rune.clone(),
                    weapon_sets: seed.weapon_sets.clone(),
                    active_weapon_set: 0,
                    bundle: seed.bundle.clone(),
                },
                AttributeRules {
                    modifiers: seed.modifiers.clone(),
                    conversions: seed.conversions.clone(),
                },
            ));
            if !seed.rotation.is_empty() {
                actor.insert(Rotation::new(seed.rotation.clone()));
            }
            actor.id()
        })
        .collect();

    for (seed, actor) in seeds.iter().zip(&actors) {
        for skill in &seed.skills {
            attach_skill(world, *actor, skill)?;
        }
        for unique_effect in &seed.unique_effects {
            add_unique_effect(world, *actor, unique_effect, context.tick)?;
        }
        if let Some(target) = &seed.target {
            let target = store::find_actor(world, target).ok_or_else(|| {
                SimulationError::UnknownActor {
                    actor: seed.name.clone(),
                    referenced: target.clone(),
                }
            })?;
            world.entity_mut(*actor).insert(Targeting(target));
        }
    }

    for (seed, actor) in seeds.iter().zip(&actors) {
        for initial in &seed.initial_effects {
            let source = store::find_actor(world, &initial.source)
                .and_then(|source| store::attribute_source(world, source))
                .ok_or_else(|| SimulationError::UnknownActor {
                    actor: seed.name.clone(),
                    referenced: initial.source.clone(),
                })?;
            let application = initial.to_application(source, context.tick_rate_ms);
            apply_effect(world, *actor, &application, context.tick);
        }
    }

    for (seed, actor) in seeds.iter().zip(&actors) {
        let attributes = derive_effective_attributes(world, *actor)?;
        info!(
            "Spawned {} (team {}, {:?}): {} skills, {} unique effects, power {:.0}",
            seed.name,
            seed.team,
            seed.base_class,
            seed.skills.len(),
            seed.unique_effects.len(),
            attributes.power
        );
    }
    world.resource_mut::<CombatLog>().log(
        CombatLogEventType::SimulationEvent,
        format!("{} actor(s) added", actors.len()),
    );
    Ok(actors)
}
