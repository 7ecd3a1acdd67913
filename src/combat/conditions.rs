//! Composable predicates for modifiers, conversions and triggers.
//!
//! Every predicate is evaluated for one actor by the same resolver, against the
//! world as it is at the moment of evaluation. Nothing is cached between calls.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::components::{Loadout, OwnedSkills, OwnedUniqueEffects, Weapon};
use super::effects::{ActiveEffects, EffectType};
use super::skills::{Skill, SkillState};
use super::uniques::UniqueEffect;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    #[default]
    Always,
    /// A skill with this key owned by the actor has no running timer.
    SkillOffCooldown(String),
    /// The actor holds at least one unique effect with this key.
    UniqueEffectPresent(String),
    /// The actor carries at least one stack of the effect.
    EffectPresent(EffectType),
    WeaponEquipped(Weapon),
    OneHandedMainHand,
    BundleEquipped,
    HasTrait(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// Conjunction that keeps `Always` out of the tree.
    pub fn and(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::Always, condition) | (condition, Condition::Always) => condition,
            (Condition::All(mut conditions), other) => {
                conditions.push(other);
                Condition::All(conditions)
            }
            (first, second) => Condition::All(vec![first, second]),
        }
    }

    pub fn evaluate(&self, context: &ConditionContext) -> bool {
        match self {
            Condition::Always => true,
            Condition::SkillOffCooldown(key) => context.skill_off_cooldown(key),
            Condition::UniqueEffectPresent(key) => context.unique_effect_count(key) > 0,
            Condition::EffectPresent(effect) => context
                .world
                .get::<ActiveEffects>(context.actor)
                .is_some_and(|effects| effects.has(*effect)),
            Condition::WeaponEquipped(weapon) => {
                context.loadout().is_some_and(|l| l.has_weapon(*weapon))
            }
            Condition::OneHandedMainHand => {
                context.loadout().is_some_and(Loadout::one_handed_main_hand)
            }
            Condition::BundleEquipped => context.loadout().is_some_and(|l| l.bundle.is_some()),
            Condition::HasTrait(name) => context.loadout().is_some_and(|l| l.traits.contains(name)),
            Condition::Not(inner) => !inner.evaluate(context),
            Condition::All(conditions) => conditions.iter().all(|c| c.evaluate(context)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.evaluate(context)),
        }
    }
}

/// The actor a predicate is evaluated for, plus read access to the world.
pub struct ConditionContext<'w> {
    pub world: &'w World,
    pub actor: Entity,
}

impl<'w> ConditionContext<'w> {
    pub fn new(world: &'w World, actor: Entity) -> Self {
        Self { world, actor }
    }

    fn loadout(&self) -> Option<&'w Loadout> {
        self.world.get::<Loadout>(self.actor)
    }

    fn skill_off_cooldown(&self, key: &str) -> bool {
        let Some(skills) = self.world.get::<OwnedSkills>(self.actor) else {
            return false;
        };
        skills.0.iter().any(|entity| {
            let is_match = self.world.get::<Skill>(*entity).is_some_and(|s| s.key == key);
            is_match
                && self
                    .world
                    .get::<SkillState>(*entity)
                    .is_some_and(SkillState::is_off_cooldown)
        })
    }

    fn unique_effect_count(&self, key: &str) -> usize {
        self.world
            .get::<OwnedUniqueEffects>(self.actor)
            .map(|held| {
                held.0
                    .iter()
                    .filter(|e| self.world.get::<UniqueEffect>(**e).is_some_and(|u| u.key == key))
                    .count()
            })
            .unwrap_or(0)
    }
}
