//! Attribute Resolution Pipeline
//!
//! Effective attributes are derived from scratch on every tick:
//!
//! 1. static attributes, with the dynamic baselines overlaid
//! 2. intensity bonuses (each stack of Might)
//! 3. presence bonuses (Fury)
//! 4. satisfied modifiers: actor-level first, then owned skills, then owned unique
//!    effects, each list in insertion order
//! 5. satisfied conversions, all reading the post-modifier snapshot
//!
//! The order is fixed so floating point accumulation is reproducible.
//! `derive_effective_attributes` only reads the world; writing the result is the job
//! of `resolve_effective_attributes`, which runs first in every tick.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::components::{
    AttributeRules, DynamicAttributes, EffectiveAttributes, OwnedSkills, OwnedUniqueEffects,
    StaticAttributes,
};
use super::conditions::{Condition, ConditionContext};
use super::constants::{
    FURY_CRITICAL_CHANCE_PCT, MIGHT_CONDITION_DAMAGE_PER_STACK, MIGHT_POWER_PER_STACK,
};
use super::effects::{ActiveEffects, EffectType};
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::store;
use super::tick::{SimulationFault, TickContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Attribute {
    Power,
    Precision,
    Toughness,
    Vitality,
    Concentration,
    ConditionDamage,
    Expertise,
    Ferocity,
    HealingPower,
    Armor,
    BoonDurationPct,
    CriticalChancePct,
    CriticalDamagePct,
    ConditionDurationPct,
    BurningDurationPct,
    BleedingDurationPct,
    ConfusionDurationPct,
    PoisonDurationPct,
    TormentDurationPct,
    MaxHealth,
    Endurance,
    EnduranceGainPct,
}

/// One full attribute set. Used for static, effective and snapshot values alike.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    pub power: f64,
    pub precision: f64,
    pub toughness: f64,
    pub vitality: f64,
    pub concentration: f64,
    pub condition_damage: f64,
    pub expertise: f64,
    pub ferocity: f64,
    pub healing_power: f64,
    pub armor: f64,
    pub boon_duration_pct: f64,
    pub critical_chance_pct: f64,
    pub critical_damage_pct: f64,
    pub condition_duration_pct: f64,
    pub burning_duration_pct: f64,
    pub bleeding_duration_pct: f64,
    pub confusion_duration_pct: f64,
    pub poison_duration_pct: f64,
    pub torment_duration_pct: f64,
    pub max_health: f64,
    pub endurance: f64,
    pub endurance_gain_pct: f64,
}

impl Attributes {
    pub fn get(&self, attribute: Attribute) -> f64 {
        match attribute {
            Attribute::Power => self.power,
            Attribute::Precision => self.precision,
            Attribute::Toughness => self.toughness,
            Attribute::Vitality => self.vitality,
            Attribute::Concentration => self.concentration,
            Attribute::ConditionDamage => self.condition_damage,
            Attribute::Expertise => self.expertise,
            Attribute::Ferocity => self.ferocity,
            Attribute::HealingPower => self.healing_power,
            Attribute::Armor => self.armor,
            Attribute::BoonDurationPct => self.boon_duration_pct,
            Attribute::CriticalChancePct => self.critical_chance_pct,
            Attribute::CriticalDamagePct => self.critical_damage_pct,
            Attribute::ConditionDurationPct => self.condition_duration_pct,
            Attribute::BurningDurationPct => self.burning_duration_pct,
            Attribute::BleedingDurationPct => self.bleeding_duration_pct,
            Attribute::ConfusionDurationPct => self.confusion_duration_pct,
            Attribute::PoisonDurationPct => self.poison_duration_pct,
            Attribute::TormentDurationPct => self.torment_duration_pct,
            Attribute::MaxHealth => self.max_health,
            Attribute::Endurance => self.endurance,
            Attribute::EnduranceGainPct => self.endurance_gain_pct,
        }
    }

    pub fn get_mut(&mut self, attribute: Attribute) -> &mut f64 {
        match attribute {
            Attribute::Power => &mut self.power,
            Attribute::Precision => &mut self.precision,
            Attribute::Toughness => &mut self.toughness,
            Attribute::Vitality => &mut self.vitality,
            Attribute::Concentration => &mut self.concentration,
            Attribute::ConditionDamage => &mut self.condition_damage,
            Attribute::Expertise => &mut self.expertise,
            Attribute::Ferocity => &mut self.ferocity,
            Attribute::HealingPower => &mut self.healing_power,
            Attribute::Armor => &mut self.armor,
            Attribute::BoonDurationPct => &mut self.boon_duration_pct,
            Attribute::CriticalChancePct => &mut self.critical_chance_pct,
            Attribute::CriticalDamagePct => &mut self.critical_damage_pct,
            Attribute::ConditionDurationPct => &mut self.condition_duration_pct,
            Attribute::BurningDurationPct => &mut self.burning_duration_pct,
            Attribute::BleedingDurationPct => &mut self.bleeding_duration_pct,
            Attribute::ConfusionDurationPct => &mut self.confusion_duration_pct,
            Attribute::PoisonDurationPct => &mut self.poison_duration_pct,
            Attribute::TormentDurationPct => &mut self.torment_duration_pct,
            Attribute::MaxHealth => &mut self.max_health,
            Attribute::Endurance => &mut self.endurance,
            Attribute::EnduranceGainPct => &mut self.endurance_gain_pct,
        }
    }

    /// Outgoing duration bonus for `effect`, before the +100% cap.
    pub fn duration_bonus_pct(&self, effect: EffectType) -> f64 {
        if effect.is_boon() {
            return self.boon_duration_pct;
        }
        let specific = match effect {
            EffectType::Burning => self.burning_duration_pct,
            EffectType::Bleeding => self.bleeding_duration_pct,
            EffectType::Poison => self.poison_duration_pct,
            EffectType::Torment => self.torment_duration_pct,
            _ => 0.0,
        };
        self.condition_duration_pct + specific
    }
}

fn default_multiplier() -> f64 {
    1.0
}

/// `value = value * multiplier + addend` while `condition` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub attribute: Attribute,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub addend: f64,
    #[serde(default)]
    pub condition: Condition,
}

impl AttributeModifier {
    pub fn flat(attribute: Attribute, addend: f64) -> Self {
        Self {
            attribute,
            multiplier: 1.0,
            addend,
            condition: Condition::Always,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn apply(&self, values: &mut Attributes) {
        let value = values.get_mut(self.attribute);
        *value = *value * self.multiplier + self.addend;
    }
}

/// Adds `from * multiplier` to `to` while `condition` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeConversion {
    pub from: Attribute,
    pub to: Attribute,
    pub multiplier: f64,
    #[serde(default)]
    pub condition: Condition,
}

impl AttributeRules {
    /// Rules whose predicates all additionally require `gate`.
    pub fn gated(
        modifiers: &[AttributeModifier],
        conversions: &[AttributeConversion],
        gate: &Condition,
    ) -> Self {
        Self {
            modifiers: modifiers
                .iter()
                .map(|modifier| AttributeModifier {
                    condition: gate.clone().and(modifier.condition.clone()),
                    ..modifier.clone()
                })
                .collect(),
            conversions: conversions
                .iter()
                .map(|conversion| AttributeConversion {
                    condition: gate.clone().and(conversion.condition.clone()),
                    ..conversion.clone()
                })
                .collect(),
        }
    }
}

/// Rule holders of `actor` in resolution order: the actor, its skills, its unique effects.
fn rule_holders(world: &World, actor: Entity) -> Vec<Entity> {
    let mut holders = vec![actor];
    if let Some(skills) = world.get::<OwnedSkills>(actor) {
        holders.extend(skills.0.iter().copied());
    }
    if let Some(unique_effects) = world.get::<OwnedUniqueEffects>(actor) {
        holders.extend(unique_effects.0.iter().copied());
    }
    holders
}

/// Derive the effective attributes of `actor` from the current world state.
///
/// Reads only; calling it twice without an intervening mutation yields identical values.
pub fn derive_effective_attributes(world: &World, actor: Entity) -> Result<Attributes> {
    let base = world
        .get::<StaticAttributes>(actor)
        .ok_or(SimulationError::MissingComponent {
            entity: actor,
            component: "StaticAttributes",
        })?;
    let mut values = base.0.clone();

    if let Some(dynamic) = world.get::<DynamicAttributes>(actor) {
        values.endurance = dynamic.max_endurance;
        values.endurance_gain_pct = dynamic.endurance_gain_pct;
    }

    if let Some(effects) = world.get::<ActiveEffects>(actor) {
        let might = effects.stack_count(EffectType::Might) as f64;
        values.power += might * MIGHT_POWER_PER_STACK;
        values.condition_damage += might * MIGHT_CONDITION_DAMAGE_PER_STACK;

        if effects.has(EffectType::Fury) {
            values.critical_chance_pct += FURY_CRITICAL_CHANCE_PCT;
        }
    }

    let context = ConditionContext::new(world, actor);
    let holders = rule_holders(world, actor);
    let rules: Vec<&AttributeRules> = holders
        .iter()
        .filter_map(|holder| world.get::<AttributeRules>(*holder))
        .collect();

    for modifier in rules.iter().flat_map(|r| r.modifiers.iter()) {
        if modifier.condition.evaluate(&context) {
            modifier.apply(&mut values);
        }
    }

    let snapshot = values.clone();
    for conversion in rules.iter().flat_map(|r| r.conversions.iter()) {
        if conversion.condition.evaluate(&context) {
            *values.get_mut(conversion.to) += snapshot.get(conversion.from) * conversion.multiplier;
        }
    }

    Ok(values)
}

/// First phase of every tick: recompute effective attributes of every attribute-bearing actor.
pub fn resolve_effective_attributes(world: &mut World) {
    let tick = world.resource::<TickContext>().tick;
    let actors = store::sorted_entities_with::<StaticAttributes>(world);

    let mut resolved = Vec::with_capacity(actors.len());
    for actor in actors {
        match derive_effective_attributes(world, actor) {
            Ok(values) => resolved.push((actor, values)),
            Err(err) => {
                world.resource_mut::<SimulationFault>().raise(err);
                return;
            }
        }
    }

    for (actor, values) in resolved {
        if let Some(mut effective) = world.get_mut::<EffectiveAttributes>(actor) {
            effective.values = values;
            effective.computed_at = Some(tick);
        }
    }
}

/// Log the attributes of every actor once, after the first resolution.
pub fn log_initial_attributes(world: &mut World) {
    let tick = world.resource::<TickContext>().tick;
    if tick != 1 {
        return;
    }
    let actors = store::sorted_entities_with::<StaticAttributes>(world);
    let lines: Vec<String> = actors
        .iter()
        .filter_map(|actor| {
            let effective = world.get::<EffectiveAttributes>(*actor)?;
            Some(format!(
                "{}: power {:.0}, condition damage {:.0}, critical chance {:.1}%",
                store::entity_name(world, *actor),
                effective.values.power,
                effective.values.condition_damage,
                effective.values.critical_chance_pct
            ))
        })
        .collect();

    let mut combat_log = world.resource_mut::<CombatLog>();
    for line in lines {
        debug!("{}", line);
        combat_log.log(CombatLogEventType::AttributesResolved, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_multiplies_before_adding() {
        let mut values = Attributes {
            power: 1000.0,
            ..default()
        };
        let modifier = AttributeModifier {
            attribute: Attribute::Power,
            multiplier: 1.1,
            addend: 50.0,
            condition: Condition::Always,
        };
        modifier.apply(&mut values);
        assert!((values.power - 1150.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_bonus_for_conditions_adds_specific_bonus() {
        let values = Attributes {
            boon_duration_pct: 40.0,
            condition_duration_pct: 20.0,
            burning_duration_pct: 15.0,
            ..default()
        };
        assert_eq!(values.duration_bonus_pct(EffectType::Might), 40.0);
        assert_eq!(values.duration_bonus_pct(EffectType::Burning), 35.0);
        assert_eq!(values.duration_bonus_pct(EffectType::Vulnerability), 20.0);
    }

    #[test]
    fn test_gated_rules_prepend_gate() {
        let gate = Condition::SkillOffCooldown("signet".to_string());
        let rules = AttributeRules::gated(
            &[AttributeModifier::flat(Attribute::Power, 180.0)],
            &[],
            &gate,
        );
        assert_eq!(rules.modifiers[0].condition, gate);

        let gated_twice = AttributeRules::gated(
            &[AttributeModifier::flat(Attribute::Power, 180.0).when(Condition::BundleEquipped)],
            &[],
            &gate,
        );
        assert_eq!(
            gated_twice.modifiers[0].condition,
            Condition::All(vec![gate, Condition::BundleEquipped])
        );
    }

    #[test]
    fn test_missing_static_attributes_is_reported() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        let err = derive_effective_attributes(&world, entity).unwrap_err();
        assert_eq!(
            err,
            SimulationError::MissingComponent {
                entity,
                component: "StaticAttributes"
            }
        );
    }

    #[test]
    fn test_conversion_reads_post_modifier_snapshot() {
        let mut world = World::new();
        let actor = world
            .spawn((
                StaticAttributes(Attributes {
                    power: 1000.0,
                    precision: 1000.0,
                    ..default()
                }),
                AttributeRules {
                    modifiers: vec![AttributeModifier::flat(Attribute::Precision, 200.0)],
                    conversions: vec![
                        AttributeConversion {
                            from: Attribute::Precision,
                            to: Attribute::Power,
                            multiplier: 0.1,
                            condition: Condition::Always,
                        },
                        AttributeConversion {
                            from: Attribute::Power,
                            to: Attribute::Ferocity,
                            multiplier: 0.5,
                            condition: Condition::Always,
                        },
                    ],
                },
            ))
            .id();

        let values = derive_effective_attributes(&world, actor).unwrap();
        // Power gains 10% of the modified precision (1200).
        assert!((values.power - 1120.0).abs() < 1e-9);
        // Ferocity reads power before the first conversion touched it.
        assert!((values.ferocity - 500.0).abs() < 1e-9);
        assert_eq!(values.endurance, 100.0);
    }
}
