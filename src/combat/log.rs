//! Combat logging
//!
//! Records simulation events, stamped with the tick they happened on, for reports
//! and post-run analysis.

use bevy::prelude::*;
use serde::Serialize;

use super::tick::Tick;

/// A single entry in the combat log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatLogEntry {
    /// Tick the event happened on (0 while actors are being set up)
    pub tick: Tick,
    /// The type of event
    pub event_type: CombatLogEventType,
    /// Human-readable description of the event
    pub message: String,
}

/// Types of combat log events for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CombatLogEventType {
    /// Effective attributes logged after the first resolution
    AttributesResolved,
    /// Boon or condition stacks added or refreshed
    EffectApplied,
    /// Application blocked by a cap or missing target
    EffectRejected,
    /// Stack records reached the end of their lifetime
    EffectExpired,
    /// Buffered condition damage committed at an open gate
    DamageCommitted,
    /// Skill cast from a rotation
    SkillCast,
    UniqueEffectAdded,
    UniqueEffectRejected,
    UniqueEffectExpired,
    /// Trigger predicate turned true
    TriggerFired,
    ChildSpawned,
    ChildDestroyed,
    /// Run lifecycle (start, stop, termination)
    SimulationEvent,
    /// Fatal error that ended the run
    Fault,
}

/// The combat log resource storing all events
#[derive(Resource, Debug, Default, Clone)]
pub struct CombatLog {
    /// All log entries in chronological order
    pub entries: Vec<CombatLogEntry>,
    /// Tick stamped on new entries; only the scheduler moves it
    pub tick: Tick,
}

impl CombatLog {
    /// Add a new entry to the log
    pub fn log(&mut self, event_type: CombatLogEventType, message: String) {
        self.entries.push(CombatLogEntry {
            tick: self.tick,
            event_type,
            message,
        });
    }

    /// Get entries filtered by event type
    pub fn filter_by_type(&self, event_type: CombatLogEventType) -> Vec<&CombatLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    /// Get all entries recorded on one tick
    pub fn at_tick(&self, tick: Tick) -> Vec<&CombatLogEntry> {
        self.entries.iter().filter(|e| e.tick == tick).collect()
    }

    /// Count entries of one type
    pub fn count(&self, event_type: CombatLogEventType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Get the last N entries
    pub fn recent(&self, count: usize) -> Vec<&CombatLogEntry> {
        self.entries.iter().rev().take(count).rev().collect()
    }
}
