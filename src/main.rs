//! combatsim - Tick-driven combat simulator
//!
//! Loads a scenario and a skill catalog, runs the simulation headless and prints a
//! short summary.

use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::path::PathBuf;
use std::process::ExitCode;

use combatsim::cli::{self, Args};
use combatsim::headless::{run_scenario, HeadlessError, HeadlessScenario};

fn run(args: &Args) -> Result<(), HeadlessError> {
    let mut scenario = HeadlessScenario::load_from_file(&args.scenario)?;
    if let Some(catalog) = &args.catalog {
        scenario.catalog = catalog.clone();
    }
    if let Some(max_ticks) = args.max_ticks {
        scenario.simulation.max_ticks = Some(max_ticks);
    }
    let catalog = scenario.load_catalog()?;

    let mut app = App::new();
    app.add_plugins(LogPlugin {
        level: args.log_level.into(),
        ..default()
    });

    let report = run_scenario(app, &scenario, catalog, None)?;
    info!(
        "Finished after {} tick(s): {:?}",
        report.ticks_elapsed, report.termination
    );
    for actor in &report.final_snapshot.actors {
        if actor.incoming_damage.total > 0 {
            info!("{} took {} condition damage", actor.name, actor.incoming_damage.total);
        }
    }

    let output = args
        .output
        .clone()
        .or_else(|| scenario.output_path.as_ref().map(PathBuf::from));
    if let Some(path) = output {
        report.write_to_file(&path)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::parse_args();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("combatsim: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
