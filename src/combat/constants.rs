//! Simulation Constants
//!
//! Numeric tables shared by the attribute pipeline and the effect stack engine.
//! Every value here is expressed per stack or per second of real time.

// ============================================================================
// Time
// ============================================================================

/// Milliseconds of real time one "per second" damage figure refers to.
pub const REFERENCE_RATE_MS: f64 = 1000.0;

/// Default length of one tick in milliseconds.
pub const DEFAULT_TICK_RATE_MS: u64 = 1;

/// Default spacing of condition damage commits in milliseconds.
pub const DEFAULT_CONDITION_TICK_INTERVAL_MS: u64 = 1000;

// ============================================================================
// Intensity Bonuses
// ============================================================================

/// Flat power granted by each stack of Might.
pub const MIGHT_POWER_PER_STACK: f64 = 30.0;

/// Flat condition damage granted by each stack of Might.
pub const MIGHT_CONDITION_DAMAGE_PER_STACK: f64 = 30.0;

/// Incoming damage increase per stack of Vulnerability (1%).
pub const VULNERABILITY_DAMAGE_PER_STACK: f64 = 0.01;

// ============================================================================
// Presence Bonuses
// ============================================================================

/// Critical chance granted while Fury is present. Does not stack.
pub const FURY_CRITICAL_CHANCE_PCT: f64 = 25.0;

// ============================================================================
// Stack Caps
// ============================================================================

pub const MAX_MIGHT_STACKS: usize = 25;
pub const MAX_VULNERABILITY_STACKS: usize = 25;

/// Shared cap for damaging conditions.
pub const MAX_CONDITION_STACKS: usize = 1500;

/// Outgoing duration bonuses never exceed +100%.
pub const MAX_DURATION_BONUS_PCT: f64 = 100.0;

// ============================================================================
// Condition Damage (base per stack, coefficient on source condition damage)
// ============================================================================

pub const BURNING_BASE: f64 = 131.0;
pub const BURNING_COEFFICIENT: f64 = 0.155;

pub const BLEEDING_BASE: f64 = 22.0;
pub const BLEEDING_COEFFICIENT: f64 = 0.06;

pub const POISON_BASE: f64 = 33.5;
pub const POISON_COEFFICIENT: f64 = 0.06;

pub const TORMENT_BASE: f64 = 31.8;
pub const TORMENT_COEFFICIENT: f64 = 0.09;
