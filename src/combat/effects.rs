//! Effect Stack Engine
//!
//! Boons and conditions live on their target as an `ActiveEffects` component: one
//! ordered list of stack records per effect type, plus a buffer of fractional
//! condition damage that has accrued but has not been committed yet.
//!
//! ## Stacking
//!
//! - **Intensity** effects append one record per stack, up to a per-type cap.
//! - **Duration** effects keep a single record whose expiry is extended, kept at the
//!   longest, or replaced by the most recent application depending on the type.
//!
//! ## Per-tick maintenance (in order)
//!
//! 1. `accrue_condition_damage` adds each damaging condition's contribution to its
//!    buffer. The contribution reads each record's *source* effective condition damage.
//! 2. `commit_buffered_damage` moves rounded buffers into `EffectiveIncomingDamage`
//!    when the tick's damage gate is open.
//! 3. `expire_effect_stacks` drops records whose lifetime has elapsed.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use super::constants::*;
use super::components::EffectiveAttributes;
use super::error::{Result, SimulationError};
use super::log::{CombatLog, CombatLogEventType};
use super::store;
use super::tick::{SimulationFault, Tick, TickContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffectType {
    // Boons
    Aegis,
    Alacrity,
    Fury,
    Might,
    Protection,
    Quickness,
    Resolution,
    Vigor,
    // Conditions
    Bleeding,
    Burning,
    Poison,
    Torment,
    Vulnerability,
}

/// How repeated applications of the same duration-stacking effect merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationRule {
    /// Remaining duration grows by the new duration.
    Extend,
    /// Keep whichever application ends later.
    Longest,
    /// The newest application replaces the current one.
    MostRecent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackingPolicy {
    Intensity { max_stacks: usize },
    Duration(DurationRule),
}

impl EffectType {
    pub fn is_boon(self) -> bool {
        self < EffectType::Bleeding
    }

    pub fn stacking_policy(self) -> StackingPolicy {
        match self {
            EffectType::Might => StackingPolicy::Intensity {
                max_stacks: MAX_MIGHT_STACKS,
            },
            EffectType::Vulnerability => StackingPolicy::Intensity {
                max_stacks: MAX_VULNERABILITY_STACKS,
            },
            EffectType::Bleeding | EffectType::Burning | EffectType::Poison | EffectType::Torment => {
                StackingPolicy::Intensity {
                    max_stacks: MAX_CONDITION_STACKS,
                }
            }
            EffectType::Aegis => StackingPolicy::Duration(DurationRule::Longest),
            EffectType::Vigor => StackingPolicy::Duration(DurationRule::MostRecent),
            EffectType::Alacrity
            | EffectType::Fury
            | EffectType::Protection
            | EffectType::Quickness
            | EffectType::Resolution => StackingPolicy::Duration(DurationRule::Extend),
        }
    }

    /// `(base per stack, coefficient on source condition damage)` in damage per second.
    pub fn damage_coefficients(self) -> Option<(f64, f64)> {
        match self {
            EffectType::Burning => Some((BURNING_BASE, BURNING_COEFFICIENT)),
            EffectType::Bleeding => Some((BLEEDING_BASE, BLEEDING_COEFFICIENT)),
            EffectType::Poison => Some((POISON_BASE, POISON_COEFFICIENT)),
            EffectType::Torment => Some((TORMENT_BASE, TORMENT_COEFFICIENT)),
            _ => None,
        }
    }
}

/// One application event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackRecord {
    /// Attribute-bearing actor credited with the stack.
    pub source: Entity,
    pub applied_at: Tick,
    /// First tick on which the record is gone.
    pub expires_at: Tick,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct EffectStacks {
    pub records: Vec<StackRecord>,
    /// Damage accrued since the last commit. Never negative.
    pub buffered_damage: f64,
}

/// A request to add stacks of `effect` to some target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectApplication {
    pub effect: EffectType,
    pub source: Entity,
    /// Ignored by duration-stacking effects.
    pub stacks: u32,
    pub duration_ticks: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NoTarget,
    AtCap,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// This many new records were appended.
    Applied(u32),
    /// An existing duration record absorbed the application.
    Refreshed,
    Rejected(RejectReason),
}

/// Committed condition damage taken by an actor.
#[derive(Component, Debug, Default, Clone, PartialEq, Serialize)]
pub struct EffectiveIncomingDamage {
    pub total: i64,
    pub by_effect: BTreeMap<EffectType, i64>,
}

#[derive(Component, Debug, Default, Clone, PartialEq)]
#[require(EffectiveIncomingDamage)]
pub struct ActiveEffects {
    pub stacks: BTreeMap<EffectType, EffectStacks>,
}

impl ActiveEffects {
    pub fn stack_count(&self, effect: EffectType) -> usize {
        self.stacks.get(&effect).map_or(0, |s| s.records.len())
    }

    pub fn has(&self, effect: EffectType) -> bool {
        self.stack_count(effect) > 0
    }

    pub fn buffered_damage(&self, effect: EffectType) -> f64 {
        self.stacks.get(&effect).map_or(0.0, |s| s.buffered_damage)
    }

    /// Every source referenced by a live record.
    pub fn sources(&self) -> impl Iterator<Item = Entity> + '_ {
        self.stacks
            .values()
            .flat_map(|s| s.records.iter().map(|r| r.source))
    }

    pub fn apply(&mut self, application: &EffectApplication, now: Tick) -> ApplyOutcome {
        if application.duration_ticks == 0 {
            return ApplyOutcome::Rejected(RejectReason::Empty);
        }
        let record = StackRecord {
            source: application.source,
            applied_at: now,
            expires_at: now + application.duration_ticks,
        };

        match application.effect.stacking_policy() {
            StackingPolicy::Intensity { max_stacks } => {
                if application.stacks == 0 {
                    return ApplyOutcome::Rejected(RejectReason::Empty);
                }
                let entry = self.stacks.entry(application.effect).or_default();
                let room = max_stacks.saturating_sub(entry.records.len());
                let added = room.min(application.stacks as usize);
                if added == 0 {
                    return ApplyOutcome::Rejected(RejectReason::AtCap);
                }
                entry.records.extend(std::iter::repeat(record).take(added));
                ApplyOutcome::Applied(added as u32)
            }
            StackingPolicy::Duration(rule) => {
                let entry = self.stacks.entry(application.effect).or_default();
                let Some(current) = entry.records.first_mut() else {
                    entry.records.push(record);
                    return ApplyOutcome::Applied(1);
                };
                match rule {
                    DurationRule::Extend => {
                        current.expires_at += application.duration_ticks;
                    }
                    DurationRule::Longest => {
                        if record.expires_at > current.expires_at {
                            *current = record;
                        }
                    }
                    DurationRule::MostRecent => {
                        *current = record;
                    }
                }
                ApplyOutcome::Refreshed
            }
        }
    }

    /// Drop records whose lifetime has elapsed at `now`.
    ///
    /// An effect with no records keeps its entry while damage is still buffered.
    /// Returns the number of records removed per effect type.
    pub fn expire(&mut self, now: Tick) -> SmallVec<[(EffectType, usize); 4]> {
        let mut expired = SmallVec::new();
        for (effect, stacks) in self.stacks.iter_mut() {
            let before = stacks.records.len();
            stacks.records.retain(|r| r.expires_at > now);
            let removed = before - stacks.records.len();
            if removed > 0 {
                expired.push((*effect, removed));
            }
        }
        self.stacks
            .retain(|_, s| !s.records.is_empty() || s.buffered_damage > 0.0);
        expired
    }

    /// Move every buffer into `incoming`, rounding half away from zero.
    ///
    /// Returns the committed amount per effect. A second call in the same tick finds
    /// empty buffers and commits nothing.
    pub fn commit(
        &mut self,
        incoming: &mut EffectiveIncomingDamage,
    ) -> SmallVec<[(EffectType, i64); 4]> {
        let mut committed = SmallVec::new();
        for (effect, stacks) in self.stacks.iter_mut() {
            if stacks.buffered_damage <= 0.0 {
                continue;
            }
            let amount = stacks.buffered_damage.round() as i64;
            stacks.buffered_damage = 0.0;
            incoming.total += amount;
            *incoming.by_effect.entry(*effect).or_insert(0) += amount;
            committed.push((*effect, amount));
        }
        self.stacks
            .retain(|_, s| !s.records.is_empty() || s.buffered_damage > 0.0);
        committed
    }
}

/// Convert a duration in milliseconds into whole ticks, rounding up.
pub fn duration_ticks(duration_ms: f64, tick_rate_ms: u64) -> Tick {
    if duration_ms <= 0.0 || tick_rate_ms == 0 {
        return 0;
    }
    (duration_ms / tick_rate_ms as f64).ceil() as Tick
}

/// Apply `application` to `target` through the world.
///
/// A target that no longer exists, or cannot carry effects, is a silent rejection.
pub fn apply_effect(
    world: &mut World,
    target: Entity,
    application: &EffectApplication,
    now: Tick,
) -> ApplyOutcome {
    let outcome = match world.get_mut::<ActiveEffects>(target) {
        Some(mut effects) => effects.apply(application, now),
        None => ApplyOutcome::Rejected(RejectReason::NoTarget),
    };

    let message = format!(
        "{:?} from {} on {}: {:?}",
        application.effect,
        store::entity_name(world, application.source),
        store::entity_name(world, target),
        outcome
    );
    let event_type = match outcome {
        ApplyOutcome::Rejected(_) => CombatLogEventType::EffectRejected,
        _ => CombatLogEventType::EffectApplied,
    };
    if let Some(mut combat_log) = world.get_resource_mut::<CombatLog>() {
        combat_log.log(event_type, message);
    }
    outcome
}

/// Damage one tick of `effect` adds to the buffer of `target`.
///
/// Returns zero for non-damaging effects. A record whose source entity no longer exists
/// is a fatal inconsistency.
pub fn tick_damage(
    world: &World,
    target: Entity,
    effect: EffectType,
    effects: &ActiveEffects,
    context: &TickContext,
) -> Result<f64> {
    let Some((base, coefficient)) = effect.damage_coefficients() else {
        return Ok(0.0);
    };
    let Some(stacks) = effects.stacks.get(&effect) else {
        return Ok(0.0);
    };
    if stacks.records.is_empty() {
        return Ok(0.0);
    }

    let mut condition_damage = 0.0;
    for record in &stacks.records {
        if !world.entities().contains(record.source) {
            return Err(SimulationError::DanglingSource {
                tick: context.tick,
                target,
                source_entity: record.source,
                effect,
            });
        }
        let attributes = world.get::<EffectiveAttributes>(record.source).ok_or(
            SimulationError::MissingComponent {
                entity: record.source,
                component: "EffectiveAttributes",
            },
        )?;
        condition_damage += attributes.values.condition_damage;
    }

    let per_second = base * stacks.records.len() as f64 + coefficient * condition_damage;
    let mut damage = per_second * (context.tick_rate_ms as f64 / REFERENCE_RATE_MS);

    let vulnerability = effects.stack_count(EffectType::Vulnerability);
    if vulnerability > 0 {
        damage *= 1.0 + VULNERABILITY_DAMAGE_PER_STACK * vulnerability as f64;
    }
    Ok(damage)
}

/// Add this tick's condition damage to every buffer.
pub fn accrue_condition_damage(world: &mut World) {
    let context = *world.resource::<TickContext>();
    let targets = store::sorted_entities_with::<ActiveEffects>(world);

    for target in targets {
        let increments: Result<SmallVec<[(EffectType, f64); 4]>> = {
            let Some(effects) = world.get::<ActiveEffects>(target) else {
                continue;
            };
            effects
                .stacks
                .keys()
                .filter(|effect| effect.damage_coefficients().is_some())
                .map(|effect| {
                    tick_damage(world, target, *effect, effects, &context).map(|d| (*effect, d))
                })
                .collect()
        };

        let increments = match increments {
            Ok(increments) => increments,
            Err(err) => {
                error!("{}", err);
                world.resource_mut::<SimulationFault>().raise(err);
                return;
            }
        };

        if let Some(mut effects) = world.get_mut::<ActiveEffects>(target) {
            for (effect, damage) in increments {
                if let Some(stacks) = effects.stacks.get_mut(&effect) {
                    stacks.buffered_damage += damage;
                }
            }
        }
    }
}

/// Commit buffered damage when the gate is open.
pub fn commit_buffered_damage(
    context: Res<TickContext>,
    mut combat_log: ResMut<CombatLog>,
    mut targets: Query<(Entity, Option<&Name>, &mut ActiveEffects, &mut EffectiveIncomingDamage)>,
) {
    if !context.apply_condition_damage {
        return;
    }
    let mut commits: Vec<(Entity, String, EffectType, i64, i64)> = Vec::new();
    for (entity, name, mut effects, mut incoming) in targets.iter_mut() {
        for (effect, amount) in effects.commit(&mut incoming) {
            let label = name.map_or_else(|| format!("{entity:?}"), |n| n.as_str().to_string());
            commits.push((entity, label, effect, amount, incoming.total));
        }
    }

    commits.sort_by_key(|c| (c.0, c.2));
    for (_, label, effect, amount, total) in commits {
        debug!("Tick {}: {} takes {} {:?} damage", context.tick, label, amount, effect);
        combat_log.log(
            CombatLogEventType::DamageCommitted,
            format!("{label} takes {amount} {effect:?} damage (total {total})"),
        );
    }
}

/// Remove records whose lifetime ended on this tick.
pub fn expire_effect_stacks(
    context: Res<TickContext>,
    mut combat_log: ResMut<CombatLog>,
    mut targets: Query<(Entity, Option<&Name>, &mut ActiveEffects)>,
) {
    let mut expirations: Vec<(Entity, String, EffectType, usize)> = Vec::new();
    for (entity, name, mut effects) in targets.iter_mut() {
        for (effect, removed) in effects.expire(context.tick) {
            let label = name.map_or_else(|| format!("{entity:?}"), |n| n.as_str().to_string());
            expirations.push((entity, label, effect, removed));
        }
    }

    expirations.sort_by_key(|e| (e.0, e.2));
    for (_, label, effect, removed) in expirations {
        combat_log.log(
            CombatLogEventType::EffectExpired,
            format!("{removed} stack(s) of {effect:?} expired on {label}"),
        );
    }
}
