//! Headless scenario execution
//!
//! Builds a `Simulation` from a scenario, runs it to completion and collects the
//! results into a serializable report.

use bevy::prelude::*;
use serde::Serialize;
use std::path::Path;

use crate::combat::config::SkillCatalog;
use crate::combat::log::CombatLogEntry;
use crate::combat::snapshot::TickSnapshot;
use crate::combat::tick::{Simulation, StopHandle, TerminationReason, Tick};

use super::config::HeadlessScenario;
use super::HeadlessError;

/// Result of a completed headless run
///
/// This struct provides programmatic access to run results for testing and analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Last tick that was executed
    pub ticks_elapsed: Tick,
    /// Why the run ended
    pub termination: TerminationReason,
    /// State of every actor after the last tick
    pub final_snapshot: TickSnapshot,
    /// Every combat log entry in chronological order
    pub log: Vec<CombatLogEntry>,
}

impl ScenarioReport {
    /// Total committed condition damage taken by the named actor
    pub fn damage_taken(&self, actor: &str) -> Option<i64> {
        self.final_snapshot
            .actor(actor)
            .map(|a| a.incoming_damage.total)
    }

    /// Write the report as pretty-printed JSON
    pub fn write_to_file(&self, path: &Path) -> Result<(), HeadlessError> {
        let json = serde_json::to_string_pretty(self).map_err(HeadlessError::Serialize)?;
        std::fs::write(path, json).map_err(|cause| HeadlessError::Write {
            path: path.display().to_string(),
            cause,
        })?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Run `scenario` on top of `app` until it terminates.
///
/// `stop` can end the run early from another thread; the stop is honoured between ticks.
pub fn run_scenario(
    app: App,
    scenario: &HeadlessScenario,
    catalog: SkillCatalog,
    stop: Option<StopHandle>,
) -> Result<ScenarioReport, HeadlessError> {
    let mut simulation = Simulation::with_app(app, scenario.simulation.clone(), catalog)?;
    simulation.add_actors(&scenario.actors)?;

    if let Some(stop) = stop {
        simulation.set_stop_handle(stop);
    }

    info!(
        "Running scenario with {} actor(s), tick rate {} ms",
        scenario.actors.len(),
        scenario.simulation.tick_rate_ms
    );
    let termination = simulation.run()?;

    Ok(ScenarioReport {
        ticks_elapsed: simulation.tick(),
        termination,
        final_snapshot: simulation.snapshot(),
        log: simulation.combat_log().entries.clone(),
    })
}
