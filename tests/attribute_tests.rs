//! Integration tests for the attribute resolution pipeline
//!
//! These tests verify that:
//! - Boon bonuses are applied per stack and respect caps
//! - Modifiers apply in insertion order, conversions read the post-modifier values
//! - Skill-gated modifiers follow the skill's cooldown
//! - Lazy reads and tick resolution agree

use combatsim::combat::attributes::derive_effective_attributes;
use combatsim::combat::components::RotationEntry;
use combatsim::{
    ActorSeed, Attribute, AttributeConversion, AttributeModifier, Attributes, Condition,
    EffectType, InitialEffect, Simulation, SimulationConfig, SkillCatalog, SkillConfig,
};

fn config(max_ticks: u64) -> SimulationConfig {
    SimulationConfig {
        max_ticks: Some(max_ticks),
        ..Default::default()
    }
}

fn warrior() -> ActorSeed {
    ActorSeed {
        attributes: Attributes {
            power: 1000.0,
            precision: 1000.0,
            condition_damage: 500.0,
            ..Default::default()
        },
        ..ActorSeed::new("warrior")
    }
}

fn self_applied(effect: EffectType, stacks: u32) -> InitialEffect {
    InitialEffect {
        effect,
        source: "warrior".to_string(),
        stacks,
        duration_ms: 10_000,
    }
}

// =============================================================================
// Boon Bonuses
// =============================================================================

#[test]
fn test_full_might_adds_750_power() {
    let mut sim = Simulation::new(config(100), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        initial_effects: vec![self_applied(EffectType::Might, 25)],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];

    // Read before the first tick goes through the lazy path
    let lazy = sim.effective_attributes(actor).unwrap();
    assert_eq!(lazy.power, 1750.0);
    assert_eq!(lazy.condition_damage, 1250.0);

    sim.step().unwrap();
    let resolved = sim.effective_attributes(actor).unwrap();
    assert_eq!(resolved, lazy, "Tick resolution must match the lazy read");
}

#[test]
fn test_might_beyond_cap_is_dropped() {
    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        initial_effects: vec![self_applied(EffectType::Might, 40)],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];
    sim.step().unwrap();

    assert_eq!(sim.effective_attributes(actor).unwrap().power, 1750.0);
}

#[test]
fn test_fury_adds_critical_chance_once() {
    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        initial_effects: vec![self_applied(EffectType::Fury, 1), self_applied(EffectType::Fury, 1)],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];
    sim.step().unwrap();

    assert_eq!(sim.effective_attributes(actor).unwrap().critical_chance_pct, 25.0);
}

#[test]
fn test_boon_bonus_disappears_after_expiry() {
    let mut sim = Simulation::new(config(20), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        initial_effects: vec![InitialEffect {
            duration_ms: 5,
            ..self_applied(EffectType::Might, 10)
        }],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];

    // Applied before tick 1 for 5 ticks: visible on ticks 1 through 5
    for _ in 0..5 {
        sim.step().unwrap();
        assert_eq!(sim.effective_attributes(actor).unwrap().power, 1300.0);
    }
    sim.step().unwrap();
    assert_eq!(sim.effective_attributes(actor).unwrap().power, 1000.0);
}

// =============================================================================
// Modifiers and Conversions
// =============================================================================

#[test]
fn test_modifiers_apply_in_insertion_order() {
    let double = AttributeModifier {
        multiplier: 2.0,
        ..AttributeModifier::flat(Attribute::Power, 0.0)
    };
    let plus_hundred = AttributeModifier::flat(Attribute::Power, 100.0);

    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let actors = sim
        .add_actors(&[
            ActorSeed {
                modifiers: vec![double.clone(), plus_hundred.clone()],
                ..warrior()
            },
            ActorSeed {
                name: "reversed".to_string(),
                modifiers: vec![plus_hundred, double],
                ..warrior()
            },
        ])
        .unwrap();
    sim.step().unwrap();

    assert_eq!(sim.effective_attributes(actors[0]).unwrap().power, 2100.0);
    assert_eq!(sim.effective_attributes(actors[1]).unwrap().power, 2200.0);
}

#[test]
fn test_conversions_read_post_modifier_snapshot() {
    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        modifiers: vec![AttributeModifier::flat(Attribute::Precision, 200.0)],
        conversions: vec![
            AttributeConversion {
                from: Attribute::Precision,
                to: Attribute::ConditionDamage,
                multiplier: 0.5,
                condition: Condition::Always,
            },
            // Reads the snapshot, not the value the first conversion just raised
            AttributeConversion {
                from: Attribute::ConditionDamage,
                to: Attribute::Power,
                multiplier: 0.1,
                condition: Condition::Always,
            },
        ],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];
    sim.step().unwrap();

    let attributes = sim.effective_attributes(actor).unwrap();
    assert_eq!(attributes.precision, 1200.0);
    assert_eq!(attributes.condition_damage, 1100.0);
    assert_eq!(attributes.power, 1050.0);
}

#[test]
fn test_unsatisfied_condition_skips_modifier() {
    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        traits: vec!["Zealous Blade".to_string()],
        modifiers: vec![
            AttributeModifier::flat(Attribute::Power, 120.0)
                .when(Condition::HasTrait("Zealous Blade".to_string())),
            AttributeModifier::flat(Attribute::Power, 999.0)
                .when(Condition::EffectPresent(EffectType::Quickness)),
        ],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];
    sim.step().unwrap();

    assert_eq!(sim.effective_attributes(actor).unwrap().power, 1120.0);
}

#[test]
fn test_skill_modifier_follows_cooldown() {
    let catalog = SkillCatalog::default().with_skill(
        "Signet of Fire",
        SkillConfig {
            cooldown_ms: 20,
            modifiers: vec![AttributeModifier::flat(Attribute::Precision, 180.0)],
            ..Default::default()
        },
    );
    let mut sim = Simulation::new(config(100), catalog).unwrap();
    let seed = ActorSeed {
        skills: vec!["Signet of Fire".to_string()],
        rotation: vec![
            RotationEntry {
                skill: "Signet of Fire".to_string(),
                at: 1,
            },
            RotationEntry {
                skill: "Signet of Fire".to_string(),
                at: 90,
            },
        ],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];

    // Resolved before the cast on tick 1
    sim.step().unwrap();
    assert_eq!(sim.effective_attributes(actor).unwrap().precision, 1180.0);

    // Recharging from tick 2 through tick 21
    for _ in 2..=21 {
        sim.step().unwrap();
        assert_eq!(sim.effective_attributes(actor).unwrap().precision, 1000.0);
    }

    sim.step().unwrap();
    assert_eq!(sim.effective_attributes(actor).unwrap().precision, 1180.0);
}

#[test]
fn test_derivation_is_pure() {
    let mut sim = Simulation::new(config(10), SkillCatalog::default()).unwrap();
    let seed = ActorSeed {
        initial_effects: vec![self_applied(EffectType::Might, 7)],
        modifiers: vec![AttributeModifier::flat(Attribute::Ferocity, 150.0)],
        ..warrior()
    };
    let actor = sim.add_actors(&[seed]).unwrap()[0];
    sim.step().unwrap();

    let first = derive_effective_attributes(sim.world(), actor).unwrap();
    let second = derive_effective_attributes(sim.world(), actor).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, sim.effective_attributes(actor).unwrap());
}
