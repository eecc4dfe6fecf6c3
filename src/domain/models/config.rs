use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::ids::{ExchangeId, NodeId};
use super::parameter::ParameterDescriptor;
use crate::domain::errors::{CouplingError, CouplingResult};

/// Main configuration structure for coupler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Damped fixed-point iteration settings
    #[serde(default)]
    pub equilibrator: EquilibratorConfig,

    /// Steady-state genetic search settings
    #[serde(default)]
    pub evolver: EvolverConfig,

    /// Reference network driven by `coupler equilibrate`
    #[serde(default)]
    pub network: NetworkConfig,

    /// Reference objective driven by `coupler calibrate`
    #[serde(default)]
    pub calibration: CalibrationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Damped fixed-point iteration configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EquilibratorConfig {
    /// Weight on the previous iterate, in (0, 1)
    #[serde(default = "default_relaxation")]
    pub relaxation: f64,

    /// Iteration cap per solve
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Convergence threshold on the raw sum of squared differences.
    ///
    /// The sum runs over every element of every incoming link, so the
    /// threshold scales with the number of elements exchanged.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

const fn default_relaxation() -> f64 {
    0.25
}

const fn default_max_iterations() -> u32 {
    25
}

const fn default_tolerance() -> f64 {
    1e-6
}

impl Default for EquilibratorConfig {
    fn default() -> Self {
        Self {
            relaxation: default_relaxation(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

impl EquilibratorConfig {
    pub fn validate(&self) -> CouplingResult<()> {
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(CouplingError::InvalidConfig(format!(
                "relaxation must lie in (0, 1), got {}",
                self.relaxation
            )));
        }
        if self.max_iterations == 0 {
            return Err(CouplingError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(CouplingError::InvalidConfig(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Steady-state genetic search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvolverConfig {
    /// Number of individuals kept alive
    #[serde(default = "default_population_size")]
    pub population_size: usize,

    /// Individuals drawn per generation, without replacement
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,

    /// Cost evaluations per run, including the initial population
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,

    /// Evaluations between progress reports
    #[serde(default = "default_report_interval")]
    pub report_interval: usize,

    /// RNG seed; runs are reproducible when set
    #[serde(default)]
    pub seed: Option<u64>,

    /// Restore upstream nodes to the run's checkpoint before every evaluation
    #[serde(default = "default_true")]
    pub restore_between_evaluations: bool,

    /// Free parameters as `"id,min,max,initial"`
    #[serde(default = "default_parameters")]
    pub parameters: Vec<ParameterDescriptor>,
}

const fn default_population_size() -> usize {
    20
}

const fn default_tournament_size() -> usize {
    4
}

const fn default_max_evaluations() -> usize {
    10_000
}

const fn default_report_interval() -> usize {
    1_000
}

const fn default_true() -> bool {
    true
}

fn default_parameters() -> Vec<ParameterDescriptor> {
    vec![ParameterDescriptor {
        id: ExchangeId::from("P0"),
        min: -100.0,
        max: 100.0,
        initial: 0.0,
    }]
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            tournament_size: default_tournament_size(),
            max_evaluations: default_max_evaluations(),
            report_interval: default_report_interval(),
            seed: None,
            restore_between_evaluations: default_true(),
            parameters: default_parameters(),
        }
    }
}

impl EvolverConfig {
    /// Individuals replaced per generation.
    pub const REPLACEMENTS: usize = 2;

    pub fn validate(&self) -> CouplingResult<()> {
        // Two parents survive and two losers are replaced.
        if self.tournament_size < 2 * Self::REPLACEMENTS {
            return Err(CouplingError::InvalidConfig(format!(
                "tournament_size must be at least {}, got {}",
                2 * Self::REPLACEMENTS,
                self.tournament_size
            )));
        }
        if self.population_size < self.tournament_size {
            return Err(CouplingError::InvalidConfig(format!(
                "population_size ({}) must be at least tournament_size ({})",
                self.population_size, self.tournament_size
            )));
        }
        if self.max_evaluations < self.population_size {
            return Err(CouplingError::InvalidConfig(format!(
                "max_evaluations ({}) must cover the initial population ({})",
                self.max_evaluations, self.population_size
            )));
        }
        if self.report_interval == 0 {
            return Err(CouplingError::InvalidConfig(
                "report_interval must be at least 1".to_string(),
            ));
        }
        if self.parameters.is_empty() {
            return Err(CouplingError::InvalidConfig(
                "at least one parameter is required".to_string(),
            ));
        }
        for parameter in &self.parameters {
            parameter.validate()?;
        }
        Ok(())
    }
}

/// Affine reference network: `node = offset + Σ gain · upstream`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NetworkConfig {
    /// Query time for the solve
    #[serde(default)]
    pub time: f64,

    /// Nodes in registration order
    #[serde(default = "default_network_nodes")]
    pub nodes: Vec<AffineNodeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AffineNodeConfig {
    pub id: NodeId,

    #[serde(default)]
    pub offset: f64,

    /// Gain per upstream node
    #[serde(default)]
    pub inputs: BTreeMap<NodeId, f64>,

    /// Input value used until the controller has one to offer
    #[serde(default)]
    pub fallback: f64,
}

fn default_network_nodes() -> Vec<AffineNodeConfig> {
    vec![
        AffineNodeConfig {
            id: NodeId::from("a"),
            offset: 1.0,
            inputs: BTreeMap::from([(NodeId::from("b"), 0.5)]),
            fallback: 0.0,
        },
        AffineNodeConfig {
            id: NodeId::from("b"),
            offset: 0.0,
            inputs: BTreeMap::from([(NodeId::from("a"), 0.5)]),
            fallback: 0.0,
        },
    ]
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            time: 0.0,
            nodes: default_network_nodes(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> CouplingResult<()> {
        if self.nodes.is_empty() {
            return Err(CouplingError::InvalidConfig(
                "network needs at least one node".to_string(),
            ));
        }
        let ids: Vec<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();
        for (i, node) in self.nodes.iter().enumerate() {
            if ids[..i].contains(&&node.id) {
                return Err(CouplingError::InvalidConfig(format!(
                    "network node {} is declared more than once",
                    node.id
                )));
            }
            if let Some(missing) = node.inputs.keys().find(|input| !ids.contains(input)) {
                return Err(CouplingError::InvalidConfig(format!(
                    "network node {} reads unknown node {missing}",
                    node.id
                )));
            }
        }
        Ok(())
    }
}

/// Quadratic reference objective: `cost = Σ (parameter - target)²`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CalibrationConfig {
    /// Query time for the run
    #[serde(default)]
    pub time: f64,

    /// Target value per parameter id
    #[serde(default = "default_targets")]
    pub targets: BTreeMap<ExchangeId, f64>,
}

fn default_targets() -> BTreeMap<ExchangeId, f64> {
    BTreeMap::from([(ExchangeId::from("P0"), 0.5)])
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            time: 0.0,
            targets: default_targets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.equilibrator.validate().unwrap();
        config.evolver.validate().unwrap();
        config.network.validate().unwrap();
        assert!((config.equilibrator.relaxation - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.equilibrator.max_iterations, 25);
        assert_eq!(config.evolver.population_size, 20);
        assert_eq!(config.evolver.tournament_size, 4);
        assert_eq!(config.evolver.max_evaluations, 10_000);
    }

    #[test]
    fn test_relaxation_bounds() {
        for bad in [0.0, 1.0, -0.5, f64::NAN] {
            let config = EquilibratorConfig {
                relaxation: bad,
                ..EquilibratorConfig::default()
            };
            assert!(config.validate().is_err(), "relaxation {bad} accepted");
        }
    }

    #[test]
    fn test_small_tournament_rejected() {
        let config = EvolverConfig {
            tournament_size: 3,
            ..EvolverConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_network_rejects_unknown_input() {
        let mut network = NetworkConfig::default();
        network.nodes[0].inputs.insert(NodeId::from("ghost"), 1.0);
        let err = network.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_yaml_parameters_parse_from_strings() {
        let yaml = r#"
population_size: 10
parameters:
  - "k,0,2,1"
  - "c,-5,5,0"
"#;
        let config: EvolverConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.parameters.len(), 2);
        assert_eq!(config.parameters[1].id.as_str(), "c");
        assert_eq!(config.tournament_size, 4);
    }
}
