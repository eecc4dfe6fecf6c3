//! Builds runnable graphs from the `network` and `calibration` config sections.
//!
//! Naming in the built graphs:
//! - network: controller `equilibrator`, links `{node}.out` into the
//!   controller and `{source}->{node}` back out of it; buffer key = node id.
//! - calibration: controller `evolver`, cost node `objective`, links
//!   `{parameter}->objective` and `objective.cost`.

use std::rc::Rc;

use serde::Serialize;
use tracing::info;

use crate::adapters::nodes::{AffineNode, QuadraticCostNode};
use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{Config, ExchangeId, Link, NodeId, SimTime};
use crate::domain::ports::SimulationNode;
use crate::services::composition::Composition;
use crate::services::equilibrator::{Equilibrator, SolveReport};
use crate::services::evolver::{EvolutionReport, Evolver};

pub const EQUILIBRATOR_ID: &str = "equilibrator";
pub const EVOLVER_ID: &str = "evolver";
pub const OBJECTIVE_ID: &str = "objective";

/// Settled value of one network node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeValue {
    pub node: NodeId,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkOutcome {
    pub report: SolveReport,
    pub values: Vec<NodeValue>,
}

/// Affine network closed through an equilibrator.
#[derive(Debug)]
pub struct NetworkRig {
    composition: Composition,
    controller: Rc<Equilibrator>,
    nodes: Vec<Rc<AffineNode>>,
    time: SimTime,
}

impl NetworkRig {
    pub fn build(config: &Config) -> CouplingResult<Self> {
        let network = &config.network;
        network.validate()?;

        let mut composition = Composition::new();
        let controller = composition.add(Equilibrator::new(EQUILIBRATOR_ID, config.equilibrator)?)?;
        let mut nodes = Vec::with_capacity(network.nodes.len());
        for entry in &network.nodes {
            nodes.push(composition.add(AffineNode::new(entry.id.clone(), entry.offset, entry.fallback))?);
        }

        for entry in &network.nodes {
            let link = Link::new(
                format!("{}.out", entry.id),
                entry.id.clone(),
                AffineNode::OUTPUT,
                EQUILIBRATOR_ID,
                entry.id.as_str(),
            );
            controller.connect_input(composition.bind(link)?)?;
        }
        for (entry, node) in network.nodes.iter().zip(&nodes) {
            for (source, gain) in &entry.inputs {
                let link = Link::new(
                    format!("{source}->{}", entry.id),
                    EQUILIBRATOR_ID,
                    source.as_str(),
                    entry.id.clone(),
                    source.as_str(),
                );
                controller.connect_output(link.clone())?;
                node.connect_input(composition.bind(link)?, *gain)?;
            }
        }
        controller.validate()?;
        info!(nodes = nodes.len(), "network wired");

        Ok(Self {
            composition,
            controller,
            nodes,
            time: SimTime(network.time),
        })
    }

    pub fn solve(&self) -> CouplingResult<NetworkOutcome> {
        let report = self.controller.solve(self.time)?;
        let buffer = self.controller.buffered();
        let values = self
            .nodes
            .iter()
            .map(|node| {
                let id = node.id();
                let values = buffer
                    .get(&ExchangeId::from(id.as_str()))
                    .map(<[f64]>::to_vec)
                    .unwrap_or_default();
                NodeValue {
                    node: id.clone(),
                    values,
                }
            })
            .collect();
        Ok(NetworkOutcome { report, values })
    }

    pub const fn controller(&self) -> &Rc<Equilibrator> {
        &self.controller
    }

    pub const fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn nodes(&self) -> &[Rc<AffineNode>] {
        &self.nodes
    }
}

/// Parameters fed to a quadratic objective through an evolver.
#[derive(Debug)]
pub struct CalibrationRig {
    composition: Composition,
    controller: Rc<Evolver>,
    objective: Rc<QuadraticCostNode>,
    time: SimTime,
}

impl CalibrationRig {
    pub fn build(config: &Config) -> CouplingResult<Self> {
        let calibration = &config.calibration;
        let mut composition = Composition::new();
        let controller = composition.add(Evolver::new(EVOLVER_ID, config.evolver.clone())?)?;

        if let Some(unknown) = calibration
            .targets
            .keys()
            .find(|id| !controller.bounds().ids().contains(id))
        {
            return Err(CouplingError::InvalidConfig(format!(
                "calibration target {unknown} is not an evolver parameter"
            )));
        }
        let objective = composition.add(QuadraticCostNode::new(
            OBJECTIVE_ID,
            calibration.targets.clone(),
        ))?;

        for id in calibration.targets.keys() {
            let link = Link::new(
                format!("{id}->{OBJECTIVE_ID}"),
                EVOLVER_ID,
                id.clone(),
                OBJECTIVE_ID,
                id.clone(),
            );
            controller.connect_output(link.clone())?;
            objective.connect_input(composition.bind(link)?)?;
        }
        let cost = Link::new(
            format!("{OBJECTIVE_ID}.cost"),
            OBJECTIVE_ID,
            QuadraticCostNode::OUTPUT,
            EVOLVER_ID,
            "cost",
        );
        controller.connect_input(composition.bind(cost)?)?;
        controller.validate()?;
        info!(parameters = controller.bounds().len(), "calibration wired");

        Ok(Self {
            composition,
            controller,
            objective,
            time: SimTime(calibration.time),
        })
    }

    pub fn run(&self) -> CouplingResult<EvolutionReport> {
        self.controller.run(self.time)
    }

    pub const fn controller(&self) -> &Rc<Evolver> {
        &self.controller
    }

    pub const fn objective(&self) -> &Rc<QuadraticCostNode> {
        &self.objective
    }

    pub const fn composition(&self) -> &Composition {
        &self.composition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EvolverConfig;

    #[test]
    fn test_default_network_reaches_fixed_point() {
        let rig = NetworkRig::build(&Config::default()).unwrap();
        let outcome = rig.solve().unwrap();
        assert!(outcome.report.converged);
        let ids: Vec<&str> = outcome.values.iter().map(|v| v.node.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        let a = outcome.values[0].values[0];
        let b = outcome.values[1].values[0];
        assert!((a - 4.0 / 3.0).abs() < 1e-2);
        assert!((b - 2.0 / 3.0).abs() < 1e-2);
        assert_eq!(rig.composition().len(), 3);
    }

    #[test]
    fn test_calibration_rejects_unknown_target() {
        let mut config = Config::default();
        config
            .calibration
            .targets
            .insert(ExchangeId::from("ghost"), 1.0);
        let err = CalibrationRig::build(&config).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_calibration_counts_objective_evaluations() {
        let config = Config {
            evolver: EvolverConfig {
                max_evaluations: 200,
                seed: Some(2),
                ..EvolverConfig::default()
            },
            ..Config::default()
        };
        let rig = CalibrationRig::build(&config).unwrap();
        let report = rig.run().unwrap();
        assert_eq!(report.evaluations, 200);
        assert_eq!(rig.objective().evaluations(), 200);
    }
}
