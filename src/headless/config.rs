//! JSON scenario parsing for headless mode
//!
//! A scenario names the simulation settings, the skill catalog to load, and the
//! actors to seed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::combat::config::{ActorSeed, SimulationConfig, SkillCatalog};

use super::HeadlessError;

fn default_catalog() -> PathBuf {
    PathBuf::from("assets/config/skills.ron")
}

/// Headless scenario loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessScenario {
    /// Tick rate, damage gate spacing and tick limit
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Skill catalog path, relative to the working directory
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
    /// Actors present from the first tick
    pub actors: Vec<ActorSeed>,
    /// Custom output path for the report (optional)
    #[serde(default)]
    pub output_path: Option<String>,
}

impl HeadlessScenario {
    /// Load a scenario from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, HeadlessError> {
        let contents = std::fs::read_to_string(path).map_err(|cause| HeadlessError::Read {
            path: path.display().to_string(),
            cause,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, HeadlessError> {
        let scenario: HeadlessScenario = serde_json::from_str(contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load the skill catalog this scenario points at
    pub fn load_catalog(&self) -> Result<SkillCatalog, HeadlessError> {
        SkillCatalog::load_from_file(&self.catalog).map_err(HeadlessError::Catalog)
    }

    /// Validate the parts of the scenario that do not need the catalog
    fn validate(&self) -> Result<(), HeadlessError> {
        if self.actors.is_empty() {
            return Err(HeadlessError::InvalidScenario(
                "scenario must define at least one actor".to_string(),
            ));
        }

        let mut names = BTreeSet::new();
        for actor in &self.actors {
            if !names.insert(actor.name.as_str()) {
                return Err(HeadlessError::InvalidScenario(format!(
                    "actor name '{}' is used more than once",
                    actor.name
                )));
            }
        }

        // Without a tick limit the run only ends when every rotation is exhausted.
        if self.simulation.max_ticks.is_none() && self.actors.iter().all(|a| a.rotation.is_empty()) {
            return Err(HeadlessError::InvalidScenario(
                "max_ticks is required when no actor has a rotation".to_string(),
            ));
        }

        self.simulation.validate()?;
        Ok(())
    }
}
