//! Implementation of the `coupler equilibrate` command.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use crate::cli::output::{format_values, list_table, output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{NetworkRig, NodeValue};

#[derive(Args, Debug, Default)]
pub struct EquilibrateArgs {
    /// Query time (overrides network.time)
    #[arg(long)]
    pub time: Option<f64>,

    /// Relaxation factor in (0, 1) (overrides equilibrator.relaxation)
    #[arg(long)]
    pub relaxation: Option<f64>,

    /// Iteration cap (overrides equilibrator.max_iterations)
    #[arg(long)]
    pub max_iterations: Option<u32>,

    /// Convergence threshold (overrides equilibrator.tolerance)
    #[arg(long)]
    pub tolerance: Option<f64>,
}

impl EquilibrateArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(time) = self.time {
            config.network.time = time;
        }
        if let Some(relaxation) = self.relaxation {
            config.equilibrator.relaxation = relaxation;
        }
        if let Some(max_iterations) = self.max_iterations {
            config.equilibrator.max_iterations = max_iterations;
        }
        if let Some(tolerance) = self.tolerance {
            config.equilibrator.tolerance = tolerance;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EquilibrateOutput {
    pub run_id: Uuid,
    pub time: f64,
    pub converged: bool,
    pub iterations: u32,
    pub residual: f64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
    pub values: Vec<NodeValue>,
}

impl CommandOutput for EquilibrateOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["node", "value"]);
        for value in &self.values {
            table.add_row(vec![value.node.to_string(), format_values(&value.values)]);
        }
        let status = if self.converged {
            format!("Converged after {} iteration(s)", self.iterations)
        } else {
            format!(
                "Did not converge within {} iteration(s); showing last values",
                self.iterations
            )
        };
        format!(
            "{status} (residual {:.3e}, t = {})\nStarted {} ({:.2} ms)\n\n{table}",
            self.residual,
            self.time,
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.elapsed_ms
        )
    }
}

pub fn execute(args: EquilibrateArgs, mut config: Config, json_mode: bool) -> Result<()> {
    args.apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid equilibrate options")?;

    let rig = NetworkRig::build(&config).context("Failed to wire network")?;
    let outcome = rig.solve().context("Equilibration failed")?;
    let report = outcome.report;

    let output_data = EquilibrateOutput {
        run_id: report.run_id,
        time: report.time.value(),
        converged: report.converged,
        iterations: report.iterations,
        residual: report.residual,
        started_at: report.started_at,
        elapsed_ms: report.elapsed.as_secs_f64() * 1e3,
        values: outcome.values,
    };
    output(&output_data, json_mode);
    Ok(())
}
