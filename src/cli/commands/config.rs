//! Implementation of the `coupler config` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Print a single section (logging, equilibrator, evolver, network, calibration)
    #[arg(long)]
    pub section: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    value: serde_json::Value,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.value).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        self.value.clone()
    }
}

fn select(config: &Config, section: Option<&str>) -> Result<serde_json::Value> {
    let value = serde_json::to_value(config).context("Failed to serialize configuration")?;
    match section {
        None => Ok(value),
        Some(name) => value
            .get(name)
            .cloned()
            .with_context(|| format!("Unknown configuration section: {name}")),
    }
}

pub fn execute(args: ConfigArgs, config: Config, json_mode: bool) -> Result<()> {
    let value = select(&config, args.section.as_deref())?;
    output(&ConfigOutput { value }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_section() {
        let config = Config::default();
        let evolver = select(&config, Some("evolver")).unwrap();
        assert_eq!(evolver["population_size"], 20);
        assert_eq!(evolver["parameters"][0], "P0,-100,100,0");
        assert!(select(&config, Some("database")).is_err());
    }

    #[test]
    fn test_human_output_is_yaml() {
        let value = select(&Config::default(), Some("equilibrator")).unwrap();
        let human = ConfigOutput { value }.to_human();
        assert!(human.contains("relaxation: 0.25"));
    }
}
