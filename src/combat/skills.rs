//! Skill & Trigger System
//!
//! Runs last in every tick, in this order:
//!
//! 1. `advance_skill_timers`: cast intervals and charge recharges count down
//! 2. `fire_skill_triggers`: triggers whose predicate turned true spawn a child actor
//! 3. `cast_rotation_skills`: every actor casts the rotation entries that are due
//! 4. `destroy_finished_children`: child actors with an exhausted rotation are removed
//!
//! The system never decides *when* to cast. Rotations do; a due entry whose skill is
//! not castable simply waits for a later tick.

use bevy::prelude::*;
use smallvec::SmallVec;

use super::actors::spawn_child_actor;
use super::components::{DestroyAfterRotation, EffectiveAttributes, Owner, Rotation, Targeting};
use super::conditions::{Condition, ConditionContext};
use super::config::{EffectTarget, SkillConfig, SkillCatalog};
use super::constants::MAX_DURATION_BONUS_PCT;
use super::effects::{apply_effect, duration_ticks, ApplyOutcome, EffectApplication};
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::store;
use super::tick::{SimulationFault, Tick, TickContext};
use super::uniques::add_unique_effect;

/// One castable ability bound to its `Owner`.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct Skill {
    pub key: String,
}

/// Ammo and timers of a skill, all in ticks.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillState {
    pub ammo: u32,
    pub max_ammo: u32,
    /// Remaining time before the skill may be cast again.
    pub cooldown: Tick,
    /// Remaining time before one charge comes back.
    pub recharge: Tick,
    pub cast_interval: Tick,
    pub recharge_interval: Tick,
}

impl SkillState {
    pub fn from_config(config: &SkillConfig, tick_rate_ms: u64) -> Self {
        Self {
            ammo: config.ammo,
            max_ammo: config.ammo,
            cooldown: 0,
            recharge: 0,
            cast_interval: duration_ticks(config.ammo_cooldown_ms as f64, tick_rate_ms),
            recharge_interval: duration_ticks(config.cooldown_ms as f64, tick_rate_ms),
        }
    }

    pub fn is_castable(&self) -> bool {
        self.ammo > 0 && self.cooldown == 0
    }

    pub fn is_off_cooldown(&self) -> bool {
        self.cooldown == 0 && self.recharge == 0
    }

    /// Spend one charge. Returns false (and changes nothing) if the skill is not castable.
    pub fn consume(&mut self) -> bool {
        if !self.is_castable() {
            return false;
        }
        self.ammo -= 1;
        if self.recharge_interval == 0 {
            self.ammo = self.max_ammo;
        } else if self.recharge == 0 {
            self.recharge = self.recharge_interval;
        }
        self.cooldown = self.cast_interval;
        true
    }

    /// Count one tick down.
    pub fn advance(&mut self) {
        self.cooldown = self.cooldown.saturating_sub(1);
        if self.recharge == 0 {
            return;
        }
        self.recharge -= 1;
        if self.recharge == 0 {
            self.ammo = (self.ammo + 1).min(self.max_ammo);
            if self.ammo < self.max_ammo {
                self.recharge = self.recharge_interval;
            }
        }
    }
}

/// Edge-triggered rule: spawns a child casting `skills` when `condition` turns true.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillTrigger {
    pub condition: Condition,
    pub skills: Vec<String>,
    /// Result of the previous evaluation.
    pub was_satisfied: bool,
}

impl SkillTrigger {
    pub fn new(condition: Condition, skills: &[String]) -> Self {
        Self {
            condition,
            skills: skills.to_vec(),
            was_satisfied: false,
        }
    }

    /// Record the current evaluation; true only on a false to true transition.
    pub fn update(&mut self, satisfied: bool) -> bool {
        let fired = satisfied && !self.was_satisfied;
        self.was_satisfied = satisfied;
        fired
    }
}

/// Triggers carried by a unique effect, evaluated for its `Owner`.
#[derive(Component, Debug, Default, Clone, PartialEq)]
pub struct SkillTriggers(pub Vec<SkillTrigger>);

// ============================================================================
// Systems
// ============================================================================

pub fn advance_skill_timers(mut skills: Query<&mut SkillState>) {
    for mut state in skills.iter_mut() {
        state.advance();
    }
}

pub fn fire_skill_triggers(world: &mut World) {
    let tick = world.resource::<TickContext>().tick;
    let holders = store::sorted_entities_with::<SkillTriggers>(world);

    for holder in holders {
        let Some(owner) = world.get::<Owner>(holder).map(|o| o.0) else {
            continue;
        };
        let evaluations: SmallVec<[bool; 4]> = match world.get::<SkillTriggers>(holder) {
            Some(triggers) => {
                let context = ConditionContext::new(world, owner);
                triggers.0.iter().map(|t| t.condition.evaluate(&context)).collect()
            }
            None => continue,
        };

        let mut fired: SmallVec<[Vec<String>; 2]> = SmallVec::new();
        if let Some(mut triggers) = world.get_mut::<SkillTriggers>(holder) {
            for (trigger, satisfied) in triggers.0.iter_mut().zip(evaluations) {
                if trigger.update(satisfied) {
                    fired.push(trigger.skills.clone());
                }
            }
        }

        for skills in fired {
            let message = format!(
                "{} triggers {}",
                store::entity_name(world, holder),
                skills.join(", ")
            );
            info!("Tick {}: {}", tick, message);
            world
                .resource_mut::<CombatLog>()
                .log(CombatLogEventType::TriggerFired, message);

            if let Err(err) = spawn_child_actor(world, owner, &skills, tick) {
                world.resource_mut::<SimulationFault>().raise(err);
                return;
            }
        }
    }
}

pub fn cast_rotation_skills(world: &mut World) {
    let tick = world.resource::<TickContext>().tick;
    let actors = store::sorted_entities_with::<Rotation>(world);

    for actor in actors {
        if let Err(err) = drive_rotation(world, actor, tick) {
            world.resource_mut::<SimulationFault>().raise(err);
            return;
        }
    }
}

/// Cast every due entry of `actor`'s rotation, stopping at the first one that has to wait.
fn drive_rotation(world: &mut World, actor: Entity, tick: Tick) -> Result<()> {
    loop {
        let Some(key) = world
            .get::<Rotation>(actor)
            .and_then(|rotation| rotation.next_due(tick))
            .map(|entry| entry.skill.clone())
        else {
            return Ok(());
        };

        let skill = store::owned_skill(world, actor, &key).ok_or_else(|| {
            SimulationError::RotationSkillNotOwned {
                actor: store::entity_name(world, actor),
                skill: key.clone(),
            }
        })?;
        if !cast_skill(world, actor, skill, tick)? {
            return Ok(());
        }
        if let Some(mut rotation) = world.get_mut::<Rotation>(actor) {
            rotation.advance();
        }
    }
}

/// Cast `skill` for `caster`.
///
/// Returns `Ok(false)` when the skill is on cooldown or out of ammo; nothing happens then.
pub fn cast_skill(world: &mut World, caster: Entity, skill: Entity, tick: Tick) -> Result<bool> {
    let key = world
        .get::<Skill>(skill)
        .map(|s| s.key.clone())
        .ok_or(SimulationError::MissingComponent {
            entity: skill,
            component: "Skill",
        })?;
    let config = world
        .resource::<SkillCatalog>()
        .skill(&key)
        .cloned()
        .ok_or_else(|| SimulationError::UnknownSkill {
            actor: store::entity_name(world, caster),
            skill: key.clone(),
        })?;

    let consumed = world
        .get_mut::<SkillState>(skill)
        .map(|mut state| state.consume())
        .ok_or(SimulationError::MissingComponent {
            entity: skill,
            component: "SkillState",
        })?;
    if !consumed {
        return Ok(false);
    }

    let source = store::attribute_source(world, caster).ok_or(SimulationError::MissingComponent {
        entity: caster,
        component: "StaticAttributes",
    })?;
    let source_attributes = world
        .get::<EffectiveAttributes>(source)
        .map(|e| e.values.clone())
        .ok_or(SimulationError::MissingComponent {
            entity: source,
            component: "EffectiveAttributes",
        })?;
    let tick_rate_ms = world.resource::<TickContext>().tick_rate_ms;

    let message = format!("{} casts {}", store::entity_name(world, caster), key);
    debug!("Tick {}: {}", tick, message);
    world
        .resource_mut::<CombatLog>()
        .log(CombatLogEventType::SkillCast, message);

    let target = world.get::<Targeting>(caster).map(|t| t.0);
    for application in &config.applies {
        let bonus = source_attributes
            .duration_bonus_pct(application.effect)
            .clamp(0.0, MAX_DURATION_BONUS_PCT);
        let request = EffectApplication {
            effect: application.effect,
            source,
            stacks: application.stacks,
            duration_ticks: duration_ticks(
                application.duration_ms as f64 * (1.0 + bonus / 100.0),
                tick_rate_ms,
            ),
        };
        let receiver = match application.target {
            EffectTarget::Caster => Some(source),
            EffectTarget::Target => target,
        };
        if let Some(receiver) = receiver {
            if let ApplyOutcome::Rejected(reason) = apply_effect(world, receiver, &request, tick) {
                debug!("{:?} from {} rejected: {:?}", request.effect, key, reason);
            }
        }
    }

    for granted in &config.grants_unique_effects {
        add_unique_effect(world, source, granted, tick)?;
    }

    if !config.child_skills.is_empty() {
        spawn_child_actor(world, caster, &config.child_skills, tick)?;
    }
    Ok(true)
}

/// Remove child actors whose rotation is exhausted.
///
/// A child still named as the source of a live stack record is kept until no record
/// references it.
pub fn destroy_finished_children(world: &mut World) {
    let candidates: Vec<Entity> = store::sorted_entities_with::<DestroyAfterRotation>(world)
        .into_iter()
        .filter(|child| {
            world
                .get::<Rotation>(*child)
                .map_or(true, Rotation::is_exhausted)
        })
        .collect();

    for child in candidates {
        if store::is_referenced_as_source(world, child) {
            debug!(
                "Keeping {} alive: still referenced by a stack record",
                store::entity_name(world, child)
            );
            continue;
        }
        let name = store::entity_name(world, child);
        store::despawn_actor(world, child);
        world
            .resource_mut::<CombatLog>()
            .log(CombatLogEventType::ChildDestroyed, format!("{name} finished its rotation"));
    }
}
