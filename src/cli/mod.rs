//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

use anyhow::Result;

pub use types::{Cli, Commands};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

/// Load the configuration the CLI was pointed at.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Run the parsed command against `config`.
pub fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Equilibrate(args) => commands::equilibrate::execute(args, config, cli.json),
        Commands::Calibrate(args) => commands::calibrate::execute(args, config, cli.json),
        Commands::Config(args) => commands::config::execute(args, config, cli.json),
    }
}

/// Print an error chain and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
