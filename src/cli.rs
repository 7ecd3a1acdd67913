//! Command-line interface for combatsim
//!
//! Runs a headless scenario and optionally writes the report to disk.

use bevy::log::Level;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Verbosity of the process log
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Tick-driven combat simulator
#[derive(Parser, Debug)]
#[command(name = "combatsim")]
#[command(about = "Tick-driven combat simulator")]
#[command(version)]
pub struct Args {
    /// JSON scenario to run
    #[arg(long, value_name = "SCENARIO_FILE")]
    pub scenario: PathBuf,

    /// Skill catalog to use instead of the one named in the scenario
    #[arg(long, value_name = "CATALOG_FILE")]
    pub catalog: Option<PathBuf>,

    /// Output path for the JSON report
    #[arg(long, value_name = "OUTPUT_PATH")]
    pub output: Option<PathBuf>,

    /// Override the scenario's tick limit
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Process log verbosity
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

pub fn parse_args() -> Args {
    Args::parse()
}
