//! Simulation input data
//!
//! Skills and unique effects are data-driven: their definitions live in a RON
//! catalog (`assets/config/skills.ron`) keyed by name, and actors reference them by
//! key. Actor seeds carry everything an actor starts with.
//!
//! ## Catalog format
//! ```ron
//! (
//!     skills: {
//!         "Signet of Fire": (
//!             ammo: 1,
//!             cooldown_ms: 20000,
//!             applies: [(effect: Burning, target: Target, stacks: 1, duration_ms: 4000)],
//!             modifiers: [(attribute: Precision, addend: 180.0)],
//!         ),
//!     },
//!     unique_effects: {},
//! )
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::attributes::{AttributeConversion, AttributeModifier, Attributes};
use super::components::{BaseClass, DynamicAttributes, RotationEntry, WeaponSet};
use super::conditions::Condition;
use super::constants::{DEFAULT_CONDITION_TICK_INTERVAL_MS, DEFAULT_TICK_RATE_MS};
use super::effects::{EffectApplication, EffectType};
use super::error::{Result, SimulationError};
use super::tick::Tick;

fn default_one() -> u32 {
    1
}

fn default_unbounded() -> u32 {
    u32::MAX
}

// ============================================================================
// Scheduler
// ============================================================================

fn default_tick_rate_ms() -> u64 {
    DEFAULT_TICK_RATE_MS
}

fn default_condition_tick_interval_ms() -> u64 {
    DEFAULT_CONDITION_TICK_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Real time covered by one tick.
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
    /// Real time between condition damage commits. Must be a multiple of the tick rate.
    #[serde(default = "default_condition_tick_interval_ms")]
    pub condition_tick_interval_ms: u64,
    /// Stop after this tick even if rotations are still running.
    #[serde(default)]
    pub max_ticks: Option<Tick>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
            condition_tick_interval_ms: DEFAULT_CONDITION_TICK_INTERVAL_MS,
            max_ticks: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_rate_ms == 0 {
            return Err(SimulationError::InvalidConfig(
                "tick_rate_ms must be positive".to_string(),
            ));
        }
        if self.condition_tick_interval_ms == 0
            || self.condition_tick_interval_ms % self.tick_rate_ms != 0
        {
            return Err(SimulationError::InvalidConfig(format!(
                "condition_tick_interval_ms ({}) must be a positive multiple of tick_rate_ms ({})",
                self.condition_tick_interval_ms, self.tick_rate_ms
            )));
        }
        if self.max_ticks == Some(0) {
            return Err(SimulationError::InvalidConfig(
                "max_ticks must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Ticks between two open damage gates.
    pub fn gate_interval_ticks(&self) -> Tick {
        self.condition_tick_interval_ms / self.tick_rate_ms.max(1)
    }
}

// ============================================================================
// Skills and Unique Effects
// ============================================================================

/// Who receives an on-cast effect application.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectTarget {
    /// The attribute-bearing actor behind the caster.
    Caster,
    /// The caster's current target.
    #[default]
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectApplicationConfig {
    pub effect: EffectType,
    #[serde(default)]
    pub target: EffectTarget,
    #[serde(default = "default_one")]
    pub stacks: u32,
    /// Base duration before the caster's duration bonuses.
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Maximum stored charges.
    #[serde(default = "default_one")]
    pub ammo: u32,
    /// Recharge time of one charge. Zero means charges are never consumed.
    #[serde(default)]
    pub cooldown_ms: u64,
    /// Minimum time between two casts of this skill.
    #[serde(default)]
    pub ammo_cooldown_ms: u64,
    #[serde(default)]
    pub applies: Vec<EffectApplicationConfig>,
    /// Unique effects granted to the caster.
    #[serde(default)]
    pub grants_unique_effects: Vec<String>,
    /// Skills cast by a child actor spawned on cast.
    #[serde(default)]
    pub child_skills: Vec<String>,
    /// Only active while this skill is off cooldown.
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
    #[serde(default)]
    pub conversions: Vec<AttributeConversion>,
}

impl Default for SkillConfig {
    fn default() -> Self {
        Self {
            ammo: 1,
            cooldown_ms: 0,
            ammo_cooldown_ms: 0,
            applies: Vec::new(),
            grants_unique_effects: Vec::new(),
            child_skills: Vec::new(),
            modifiers: Vec::new(),
            conversions: Vec::new(),
        }
    }
}

impl SkillConfig {
    pub fn targets_enemy(&self) -> bool {
        self.applies
            .iter()
            .any(|application| application.target == EffectTarget::Target)
    }
}

/// Fires once each time `condition` turns true for the holder of the unique effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub condition: Condition,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueEffectConfig {
    /// New instances are rejected once the holder has this many.
    #[serde(default = "default_unbounded")]
    pub max_stored_stacks: u32,
    /// Lifetime of one instance. `None` lasts for the rest of the run.
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
    #[serde(default)]
    pub conversions: Vec<AttributeConversion>,
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl Default for UniqueEffectConfig {
    fn default() -> Self {
        Self {
            max_stored_stacks: u32::MAX,
            duration_ms: None,
            modifiers: Vec::new(),
            conversions: Vec::new(),
            triggers: Vec::new(),
        }
    }
}

/// Every skill and unique effect the simulation knows about.
#[derive(Resource, Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillCatalog {
    #[serde(default)]
    pub skills: BTreeMap<String, SkillConfig>,
    #[serde(default)]
    pub unique_effects: BTreeMap<String, UniqueEffectConfig>,
}

impl SkillCatalog {
    pub fn from_ron_str(contents: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::from_str(contents)
    }

    pub fn skill(&self, key: &str) -> Option<&SkillConfig> {
        self.skills.get(key)
    }

    pub fn unique_effect(&self, key: &str) -> Option<&UniqueEffectConfig> {
        self.unique_effects.get(key)
    }

    pub fn with_skill(mut self, key: &str, config: SkillConfig) -> Self {
        self.skills.insert(key.to_string(), config);
        self
    }

    pub fn with_unique_effect(mut self, key: &str, config: UniqueEffectConfig) -> Self {
        self.unique_effects.insert(key.to_string(), config);
        self
    }

    /// Check that every key referenced inside the catalog is defined.
    pub fn validate(&self) -> Result<()> {
        for (key, skill) in &self.skills {
            if skill.ammo == 0 {
                return Err(SimulationError::InvalidConfig(format!(
                    "skill '{key}' has no charges and can never be cast"
                )));
            }
            for child in &skill.child_skills {
                if !self.skills.contains_key(child) {
                    return Err(SimulationError::UnknownSkill {
                        actor: format!("skill '{key}'"),
                        skill: child.clone(),
                    });
                }
            }
            for granted in &skill.grants_unique_effects {
                if !self.unique_effects.contains_key(granted) {
                    return Err(SimulationError::UnknownUniqueEffect {
                        actor: format!("skill '{key}'"),
                        unique_effect: granted.clone(),
                    });
                }
            }
        }
        for (key, unique_effect) in &self.unique_effects {
            for trigger in &unique_effect.triggers {
                if trigger.skills.is_empty() {
                    return Err(SimulationError::InvalidConfig(format!(
                        "trigger on unique effect '{key}' casts no skills"
                    )));
                }
                for skill in &trigger.skills {
                    if !self.skills.contains_key(skill) {
                        return Err(SimulationError::UnknownSkill {
                            actor: format!("unique effect '{key}'"),
                            skill: skill.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Every skill an actor starting with `skills` and `unique_effects` could end up casting,
    /// through child skills, granted unique effects and triggers.
    pub fn reachable_skills<'a>(
        &'a self,
        skills: impl IntoIterator<Item = &'a String>,
        unique_effects: impl IntoIterator<Item = &'a String>,
    ) -> BTreeSet<&'a str> {
        let mut found: BTreeSet<&str> = BTreeSet::new();
        let mut seen_unique: BTreeSet<&str> = BTreeSet::new();
        let mut pending_skills: Vec<&str> = skills.into_iter().map(String::as_str).collect();
        let mut pending_unique: Vec<&str> = unique_effects.into_iter().map(String::as_str).collect();

        while !pending_skills.is_empty() || !pending_unique.is_empty() {
            while let Some(key) = pending_unique.pop() {
                if !seen_unique.insert(key) {
                    continue;
                }
                if let Some(config) = self.unique_effects.get(key) {
                    for trigger in &config.triggers {
                        pending_skills.extend(trigger.skills.iter().map(String::as_str));
                    }
                }
            }
            while let Some(key) = pending_skills.pop() {
                if !found.insert(key) {
                    continue;
                }
                if let Some(config) = self.skills.get(key) {
                    pending_skills.extend(config.child_skills.iter().map(String::as_str));
                    pending_unique.extend(config.grants_unique_effects.iter().map(String::as_str));
                }
            }
        }
        found
    }

    /// Load a catalog from a RON file.
    pub fn load_from_file(path: &Path) -> std::result::Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let catalog = Self::from_ron_str(&contents)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        catalog
            .validate()
            .map_err(|e| format!("Invalid catalog {}: {}", path.display(), e))?;

        info!(
            "Loaded {} skills and {} unique effects from {}",
            catalog.skills.len(),
            catalog.unique_effects.len(),
            path.display()
        );
        Ok(catalog)
    }
}

// ============================================================================
// Actor Seeds
// ============================================================================

/// An effect present on an actor before the first tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialEffect {
    pub effect: EffectType,
    /// Name of the actor credited with the stacks.
    pub source: String,
    #[serde(default = "default_one")]
    pub stacks: u32,
    pub duration_ms: u64,
}

impl InitialEffect {
    pub fn to_application(&self, source: Entity, tick_rate_ms: u64) -> EffectApplication {
        EffectApplication {
            effect: self.effect,
            source,
            stacks: self.stacks,
            duration_ticks: super::effects::duration_ticks(self.duration_ms as f64, tick_rate_ms),
        }
    }
}

/// Everything an actor starts with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorSeed {
    pub name: String,
    #[serde(default)]
    pub team: u8,
    #[serde(default)]
    pub base_class: BaseClass,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub dynamic: DynamicAttributes,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub rune: Option<String>,
    #[serde(default)]
    pub weapon_sets: Vec<WeaponSet>,
    #[serde(default)]
    pub bundle: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub unique_effects: Vec<String>,
    /// Actor-level modifiers from traits and gear.
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
    #[serde(default)]
    pub conversions: Vec<AttributeConversion>,
    #[serde(default)]
    pub initial_effects: Vec<InitialEffect>,
    /// Name of the actor that `Target` applications land on.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub rotation: Vec<RotationEntry>,
}

impl ActorSeed {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_gates_every_thousand_ticks() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gate_interval_ticks(), 1000);
    }

    #[test]
    fn test_interval_must_divide_by_tick_rate() {
        let config = SimulationConfig {
            tick_rate_ms: 300,
            condition_tick_interval_ms: 1000,
            max_ticks: None,
        };
        assert!(matches!(
            config.validate(),
            Err(SimulationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_catalog_parses_from_ron() {
        let catalog = SkillCatalog::from_ron_str(
            r#"(
                skills: {
                    "Signet of Fire": (
                        cooldown_ms: 20000,
                        applies: [(effect: Burning, stacks: 2, duration_ms: 4000)],
                        modifiers: [(attribute: Precision, addend: 180.0)],
                    ),
                    "Spawn": (child_skills: ["Signet of Fire"]),
                },
                unique_effects: {
                    "Ember": (
                        max_stored_stacks: 5,
                        triggers: [(condition: EffectPresent(Quickness), skills: ["Spawn"])],
                    ),
                },
            )"#,
        )
        .unwrap();

        let signet = catalog.skill("Signet of Fire").unwrap();
        assert_eq!(signet.ammo, 1);
        assert_eq!(signet.applies[0].target, EffectTarget::Target);
        assert_eq!(signet.applies[0].stacks, 2);
        assert_eq!(signet.modifiers[0].multiplier, 1.0);
        assert_eq!(catalog.unique_effect("Ember").unwrap().max_stored_stacks, 5);
        assert!(catalog.validate().is_ok());
    }

    #[test]
    fn test_catalog_rejects_unknown_child_skill() {
        let catalog = SkillCatalog::default().with_skill(
            "Spawn",
            SkillConfig {
                child_skills: vec!["Missing".to_string()],
                ..default()
            },
        );
        assert_eq!(
            catalog.validate(),
            Err(SimulationError::UnknownSkill {
                actor: "skill 'Spawn'".to_string(),
                skill: "Missing".to_string(),
            })
        );
    }

    #[test]
    fn test_catalog_rejects_skill_without_charges() {
        let catalog = SkillCatalog::default().with_skill(
            "Dud",
            SkillConfig {
                ammo: 0,
                ..default()
            },
        );
        assert!(matches!(
            catalog.validate(),
            Err(SimulationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_reachable_skills_follow_grants_and_triggers() {
        let catalog = SkillCatalog::default()
            .with_skill(
                "Opener",
                SkillConfig {
                    grants_unique_effects: vec!["Ember".to_string()],
                    ..default()
                },
            )
            .with_skill(
                "Burst",
                SkillConfig {
                    child_skills: vec!["Echo".to_string()],
                    ..default()
                },
            )
            .with_skill("Echo", SkillConfig::default())
            .with_skill("Unused", SkillConfig::default())
            .with_unique_effect(
                "Ember",
                UniqueEffectConfig {
                    triggers: vec![TriggerConfig {
                        condition: Condition::Always,
                        skills: vec!["Burst".to_string()],
                    }],
                    ..default()
                },
            );

        let opener = ["Opener".to_string()];
        let reachable = catalog.reachable_skills(opener.iter(), []);
        let names: Vec<&str> = reachable.into_iter().collect();
        assert_eq!(names, vec!["Burst", "Echo", "Opener"]);
    }
}
