//! Implementation of the `coupler calibrate` command.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::CalibrationRig;

#[derive(Args, Debug, Default)]
pub struct CalibrateArgs {
    /// RNG seed (overrides evolver.seed)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Evaluation budget (overrides evolver.max_evaluations)
    #[arg(long)]
    pub max_evaluations: Option<usize>,

    /// Population size (overrides evolver.population_size)
    #[arg(long)]
    pub population_size: Option<usize>,
}

impl CalibrateArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.evolver.seed = Some(seed);
        }
        if let Some(max_evaluations) = self.max_evaluations {
            config.evolver.max_evaluations = max_evaluations;
        }
        if let Some(population_size) = self.population_size {
            config.evolver.population_size = population_size;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ParameterRow {
    pub id: String,
    pub value: f64,
    pub target: Option<f64>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct CalibrateOutput {
    pub run_id: Uuid,
    pub seed: Option<u64>,
    pub cost: f64,
    pub evaluations: usize,
    pub generations: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    pub parameters: Vec<ParameterRow>,
}

impl CommandOutput for CalibrateOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["parameter", "value", "target", "bounds"]);
        for row in &self.parameters {
            table.add_row(vec![
                row.id.clone(),
                format!("{:.6}", row.value),
                row.target.map_or_else(|| "-".to_string(), |t| format!("{t}")),
                format!("[{}, {}]", row.min, row.max),
            ]);
        }
        let seed = self
            .seed
            .map_or_else(|| "entropy".to_string(), |s| s.to_string());
        format!(
            "Best cost {:.6e} after {} evaluations ({} generations, seed {seed})\nStarted {} ({:.2} ms)\n\n{table}",
            self.cost,
            self.evaluations,
            self.generations,
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.elapsed_ms
        )
    }
}

pub fn execute(args: CalibrateArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid calibrate options")?;

    let rig = CalibrationRig::build(&config).context("Failed to wire calibration")?;
    let report = rig.run().context("Calibration failed")?;

    let parameters = config
        .evolver
        .parameters
        .iter()
        .zip(report.best.values())
        .map(|(parameter, &value)| ParameterRow {
            id: parameter.id.to_string(),
            value,
            target: config.calibration.targets.get(&parameter.id).copied(),
            min: parameter.min,
            max: parameter.max,
        })
        .collect();

    let output_data = CalibrateOutput {
        run_id: report.run_id,
        seed: config.evolver.seed,
        cost: report.best.cost(),
        evaluations: report.evaluations,
        generations: report.generations,
        started_at: report.started_at,
        elapsed_ms: report.elapsed.as_secs_f64() * 1e3,
        parameters,
    };
    output(&output_data, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply() {
        let args = CalibrateArgs {
            seed: Some(9),
            max_evaluations: Some(500),
            ..CalibrateArgs::default()
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.evolver.seed, Some(9));
        assert_eq!(config.evolver.max_evaluations, 500);
        assert_eq!(config.evolver.population_size, 20);
    }

    #[test]
    fn test_budget_below_population_rejected() {
        let args = CalibrateArgs {
            max_evaluations: Some(5),
            ..CalibrateArgs::default()
        };
        assert!(execute(args, Config::default(), true).is_err());
    }
}
