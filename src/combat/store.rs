//! Entity/Component Store helpers
//!
//! The store itself is the ECS `World`. These functions resolve the plain `Entity`
//! relations the simulation keeps (owners, spawn chains, stack sources) and give
//! systems a deterministic iteration order.

use bevy::prelude::*;

use super::components::{Actor, Owner, OwnedSkills, OwnedUniqueEffects, StaticAttributes};
use super::effects::ActiveEffects;
use super::skills::Skill;
use super::uniques::UniqueEffect;

/// Owner chains are never deeper than this; anything longer is a cycle.
const MAX_OWNER_DEPTH: usize = 64;

/// Every entity carrying `T`, in ascending entity order.
pub fn sorted_entities_with<T: Component>(world: &mut World) -> Vec<Entity> {
    let mut query = world.query_filtered::<Entity, With<T>>();
    let mut entities: Vec<Entity> = query.iter(world).collect();
    entities.sort();
    entities
}

/// Follow `Owner` links to the root of the chain.
pub fn root_owner(world: &World, entity: Entity) -> Entity {
    let mut current = entity;
    for _ in 0..MAX_OWNER_DEPTH {
        match world.get::<Owner>(current) {
            Some(owner) if owner.0 != current => current = owner.0,
            _ => break,
        }
    }
    current
}

/// Nearest entity in the owner chain that carries its own attributes.
///
/// Casts and stack records are credited to this entity.
pub fn attribute_source(world: &World, entity: Entity) -> Option<Entity> {
    let mut current = entity;
    for _ in 0..MAX_OWNER_DEPTH {
        if world.get::<StaticAttributes>(current).is_some() {
            return Some(current);
        }
        current = world.get::<Owner>(current)?.0;
    }
    None
}

pub fn entity_name(world: &World, entity: Entity) -> String {
    world
        .get::<Name>(entity)
        .map_or_else(|| format!("{entity:?}"), |name| name.as_str().to_string())
}

/// Lowest actor entity with the given name.
pub fn find_actor(world: &World, name: &str) -> Option<Entity> {
    world
        .iter_entities()
        .filter(|e| e.contains::<Actor>())
        .filter(|e| e.get::<Name>().is_some_and(|n| n.as_str() == name))
        .map(|e| e.id())
        .min()
}

/// Skill entity with `key` owned by `actor`.
pub fn owned_skill(world: &World, actor: Entity, key: &str) -> Option<Entity> {
    world.get::<OwnedSkills>(actor)?.0.iter().copied().find(|skill| {
        world
            .get::<Skill>(*skill)
            .is_some_and(|s| s.key == key)
    })
}

/// Number of unique effects with `key` held by `actor`.
pub fn unique_effect_count(world: &World, actor: Entity, key: &str) -> usize {
    world.get::<OwnedUniqueEffects>(actor).map_or(0, |held| {
        held.0
            .iter()
            .filter(|e| world.get::<UniqueEffect>(**e).is_some_and(|u| u.key == key))
            .count()
    })
}

/// Whether any live stack record anywhere names `entity` as its source.
pub fn is_referenced_as_source(world: &World, entity: Entity) -> bool {
    world
        .iter_entities()
        .filter_map(|e| e.get::<ActiveEffects>())
        .any(|effects| effects.sources().any(|source| source == entity))
}

/// Destroy an actor together with the skills and unique effects it owns.
pub fn despawn_actor(world: &mut World, actor: Entity) {
    let mut owned: Vec<Entity> = Vec::new();
    if let Some(skills) = world.get::<OwnedSkills>(actor) {
        owned.extend(skills.0.iter().copied());
    }
    if let Some(unique_effects) = world.get::<OwnedUniqueEffects>(actor) {
        owned.extend(unique_effects.0.iter().copied());
    }
    for entity in owned {
        world.despawn(entity);
    }
    world.despawn(actor);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_owner_follows_chain() {
        let mut world = World::new();
        let root = world.spawn_empty().id();
        let middle = world.spawn(Owner(root)).id();
        let leaf = world.spawn(Owner(middle)).id();

        assert_eq!(root_owner(&world, leaf), root);
        assert_eq!(root_owner(&world, root), root);
    }

    #[test]
    fn test_attribute_source_skips_entities_without_attributes() {
        let mut world = World::new();
        let actor = world.spawn(StaticAttributes::default()).id();
        let skill = world.spawn(Owner(actor)).id();
        let orphan = world.spawn_empty().id();

        assert_eq!(attribute_source(&world, skill), Some(actor));
        assert_eq!(attribute_source(&world, actor), Some(actor));
        assert_eq!(attribute_source(&world, orphan), None);
    }

    #[test]
    fn test_find_actor_by_name() {
        let mut world = World::new();
        let golem = world.spawn((Actor, Name::new("golem"))).id();
        world.spawn(Name::new("not an actor"));

        assert_eq!(find_actor(&world, "golem"), Some(golem));
        assert_eq!(find_actor(&world, "not an actor"), None);
        assert_eq!(entity_name(&world, golem), "golem");
    }

    #[test]
    fn test_despawn_actor_removes_owned_entities() {
        let mut world = World::new();
        let skill = world.spawn(Skill { key: "a".into() }).id();
        let actor = world.spawn((Actor, OwnedSkills(vec![skill]))).id();

        despawn_actor(&mut world, actor);
        assert!(!world.entities().contains(actor));
        assert!(!world.entities().contains(skill));
    }
}
