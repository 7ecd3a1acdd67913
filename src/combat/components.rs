//! Actor components
//!
//! Actors, skills, unique effects and child actors are all plain entities. What an
//! entity *is* follows only from the components attached to it:
//!
//! - `Actor` + `StaticAttributes`: a seeded participant with its own attributes
//! - `Actor` + `ChildActor`: a transient participant spawned by a cast or trigger
//! - `Skill` + `SkillState` + `Owner`: one castable ability of an actor
//! - `UniqueEffect` + `Owner`: a capped buff held by an actor
//!
//! Relations between entities are stored as plain `Entity` fields and resolved
//! through the world on every read.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::attributes::{AttributeConversion, AttributeModifier, Attributes};
use super::effects::ActiveEffects;
use super::tick::Tick;

// ============================================================================
// Markers and Relations
// ============================================================================

/// Marker for every simulation participant.
#[derive(Component, Debug, Default, Clone, Copy)]
#[require(ActiveEffects, OwnedSkills, OwnedUniqueEffects, Team)]
pub struct Actor;

/// Marker for actors spawned by a skill cast or trigger.
#[derive(Component, Debug, Clone, Copy)]
pub struct ChildActor;

/// Destroy this actor once its rotation has been exhausted.
#[derive(Component, Debug, Clone, Copy)]
pub struct DestroyAfterRotation;

/// Back-reference to the owning actor.
///
/// Skills and unique effects point at the actor holding them; child actors point at
/// the root of their spawn chain.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Entity);

/// The actor whose cast or trigger created this child.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedBy(pub Entity);

/// The actor that `Target` effect applications land on.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targeting(pub Entity);

/// Team affiliation (copied to child actors).
#[derive(
    Component, Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Team(pub u8);

#[derive(Component, Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseClass {
    #[default]
    Universal,
    Guardian,
    Ranger,
}

// ============================================================================
// Attributes
// ============================================================================

/// Immutable base attributes set once at actor creation.
#[derive(Component, Debug, Default, Clone, PartialEq)]
#[require(DynamicAttributes, EffectiveAttributes)]
pub struct StaticAttributes(pub Attributes);

/// Slow-changing baselines overlaid on top of the static attributes.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAttributes {
    #[serde(default = "default_max_endurance")]
    pub max_endurance: f64,
    #[serde(default)]
    pub endurance_gain_pct: f64,
}

fn default_max_endurance() -> f64 {
    100.0
}

impl Default for DynamicAttributes {
    fn default() -> Self {
        Self {
            max_endurance: default_max_endurance(),
            endurance_gain_pct: 0.0,
        }
    }
}

/// Attributes derived for the current tick.
///
/// `computed_at` is `None` until the first resolution; readers outside the tick
/// pipeline go through `Simulation::effective_attributes`, which fills it lazily.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct EffectiveAttributes {
    pub values: Attributes,
    pub computed_at: Option<Tick>,
}

/// Modifiers and conversions attached to an actor, skill or unique effect.
///
/// Predicates attached through skills and unique effects already include their
/// implicit gate (skill off cooldown, unique effect present).
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct AttributeRules {
    pub modifiers: Vec<AttributeModifier>,
    pub conversions: Vec<AttributeConversion>,
}

// ============================================================================
// Loadout
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Weapon {
    Axe,
    Dagger,
    Mace,
    Pistol,
    Scepter,
    Sword,
    Focus,
    Shield,
    Torch,
    Warhorn,
    Greatsword,
    Hammer,
    Longbow,
    Rifle,
    Shortbow,
    Staff,
}

impl Weapon {
    pub fn is_two_handed(self) -> bool {
        matches!(
            self,
            Weapon::Greatsword
                | Weapon::Hammer
                | Weapon::Longbow
                | Weapon::Rifle
                | Weapon::Shortbow
                | Weapon::Staff
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponSet {
    #[serde(default)]
    pub main_hand: Option<Weapon>,
    #[serde(default)]
    pub off_hand: Option<Weapon>,
}

/// Equipment and trait flags consulted by conditional modifiers.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct Loadout {
    pub traits: BTreeSet<String>,
    pub rune: Option<String>,
    pub weapon_sets: Vec<WeaponSet>,
    pub active_weapon_set: usize,
    pub bundle: Option<String>,
}

impl Loadout {
    pub fn active_weapons(&self) -> Option<&WeaponSet> {
        self.weapon_sets.get(self.active_weapon_set)
    }

    pub fn has_weapon(&self, weapon: Weapon) -> bool {
        self.active_weapons()
            .is_some_and(|set| set.main_hand == Some(weapon) || set.off_hand == Some(weapon))
    }

    pub fn one_handed_main_hand(&self) -> bool {
        self.active_weapons()
            .and_then(|set| set.main_hand)
            .is_some_and(|weapon| !weapon.is_two_handed())
    }
}

// ============================================================================
// Ownership Lists
// ============================================================================

/// Skill entities owned by an actor, in attachment order.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct OwnedSkills(pub Vec<Entity>);

/// Unique effect entities held by an actor, in attachment order.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct OwnedUniqueEffects(pub Vec<Entity>);

// ============================================================================
// Rotation
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationEntry {
    pub skill: String,
    /// First tick on which the cast may happen.
    pub at: Tick,
}

/// Scripted cast order of an actor.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct Rotation {
    pub entries: Vec<RotationEntry>,
    pub cursor: usize,
}

impl Rotation {
    pub fn new(mut entries: Vec<RotationEntry>) -> Self {
        // Stable: entries scheduled on the same tick keep their listed order.
        entries.sort_by_key(|entry| entry.at);
        Self { entries, cursor: 0 }
    }

    /// The pending entry if it is due at `tick`.
    pub fn next_due(&self, tick: Tick) -> Option<&RotationEntry> {
        self.entries.get(self.cursor).filter(|entry| entry.at <= tick)
    }

    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.entries.len());
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(skill: &str, at: Tick) -> RotationEntry {
        RotationEntry {
            skill: skill.to_string(),
            at,
        }
    }

    #[test]
    fn test_rotation_orders_entries_by_tick() {
        let rotation = Rotation::new(vec![entry("b", 5), entry("a", 1), entry("c", 5)]);
        let order: Vec<&str> = rotation.entries.iter().map(|e| e.skill.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rotation_next_due_waits_for_schedule() {
        let mut rotation = Rotation::new(vec![entry("a", 3)]);
        assert!(rotation.next_due(2).is_none());
        assert_eq!(rotation.next_due(3).map(|e| e.skill.as_str()), Some("a"));

        rotation.advance();
        assert!(rotation.is_exhausted());
        assert!(rotation.next_due(100).is_none());
    }

    #[test]
    fn test_empty_rotation_is_exhausted() {
        assert!(Rotation::default().is_exhausted());
    }

    #[test]
    fn test_loadout_weapon_checks() {
        let loadout = Loadout {
            weapon_sets: vec![
                WeaponSet {
                    main_hand: Some(Weapon::Sword),
                    off_hand: Some(Weapon::Torch),
                },
                WeaponSet {
                    main_hand: Some(Weapon::Greatsword),
                    off_hand: None,
                },
            ],
            ..default()
        };

        assert!(loadout.has_weapon(Weapon::Torch));
        assert!(!loadout.has_weapon(Weapon::Greatsword));
        assert!(loadout.one_handed_main_hand());

        let swapped = Loadout {
            active_weapon_set: 1,
            ..loadout
        };
        assert!(swapped.has_weapon(Weapon::Greatsword));
        assert!(!swapped.one_handed_main_hand());
    }
}
