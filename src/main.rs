//! Coupler CLI entry point.

use clap::Parser;

use coupler::cli::{self, Cli};
use coupler::infrastructure::logging::LoggerImpl;

fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let config = match cli::load_config(&cli) {
        Ok(config) => config,
        Err(err) => cli::handle_error(&err, json_mode),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(&err, json_mode),
    };

    if let Err(err) = cli::dispatch(cli, config) {
        cli::handle_error(&err, json_mode);
    }
}
