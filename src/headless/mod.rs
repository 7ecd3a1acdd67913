//! Headless scenario runner
//!
//! Runs a complete simulation from a JSON scenario and a RON skill catalog, and
//! produces a JSON report. No rendering is involved at any point.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --scenario scenarios/burning_golem.json --output report.json
//! ```
//!
//! ## JSON Scenario
//!
//! ```json
//! {
//!   "simulation": { "tick_rate_ms": 100, "condition_tick_interval_ms": 1000, "max_ticks": 300 },
//!   "catalog": "assets/config/skills.ron",
//!   "actors": [
//!     { "name": "golem", "team": 2, "attributes": { "max_health": 4000000 } },
//!     { "name": "firebrand", "team": 1, "target": "golem",
//!       "skills": ["Signet of Fire"],
//!       "rotation": [{ "skill": "Signet of Fire", "at": 1 }] }
//!   ]
//! }
//! ```

pub mod config;
pub mod runner;

use thiserror::Error;

pub use config::HeadlessScenario;
pub use runner::{run_scenario, ScenarioReport};

use crate::combat::error::SimulationError;

#[derive(Debug, Error)]
pub enum HeadlessError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("failed to parse scenario")]
    Parse(#[from] serde_json::Error),

    #[error("failed to serialize report")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("invalid skill catalog: {0}")]
    Catalog(String),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}
