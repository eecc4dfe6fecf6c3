//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::calibrate::CalibrateArgs;
use super::commands::config::ConfigArgs;
use super::commands::equilibrate::EquilibrateArgs;

#[derive(Parser, Debug)]
#[command(name = "coupler")]
#[command(about = "Equilibrate and calibrate coupled simulation graphs", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to coupler.yaml + coupler.local.yaml)
    #[arg(short, long, global = true, env = "COUPLER_CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve the configured network to a self-consistent state
    Equilibrate(EquilibrateArgs),

    /// Calibrate the configured parameters against the quadratic objective
    Calibrate(CalibrateArgs),

    /// Print the effective configuration
    Config(ConfigArgs),
}
