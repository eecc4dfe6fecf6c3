//! Quadratic objective: `cost = Σ (p − target)²`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{ExchangeId, NodeId, SimTime, UpstreamLink};
use crate::domain::ports::{SimulationNode, StateToken};

/// Stateless cost node. Each input is matched to its target by the link's
/// target input id.
#[derive(Debug)]
pub struct QuadraticCostNode {
    id: NodeId,
    targets: BTreeMap<ExchangeId, f64>,
    inputs: RefCell<Vec<UpstreamLink>>,
    evaluations: Cell<u64>,
}

impl QuadraticCostNode {
    pub const OUTPUT: &'static str = "cost";

    pub fn new(id: impl Into<NodeId>, targets: BTreeMap<ExchangeId, f64>) -> Self {
        Self {
            id: id.into(),
            targets,
            inputs: RefCell::new(Vec::new()),
            evaluations: Cell::new(0),
        }
    }

    pub fn connect_input(&self, upstream: UpstreamLink) -> CouplingResult<()> {
        let input = upstream.link().target_input();
        if !self.targets.contains_key(input) {
            return Err(CouplingError::InvalidConfig(format!(
                "{} has no target for input {input}",
                self.id
            )));
        }
        self.inputs.borrow_mut().push(upstream);
        Ok(())
    }

    pub const fn targets(&self) -> &BTreeMap<ExchangeId, f64> {
        &self.targets
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.get()
    }
}

impl SimulationNode for QuadraticCostNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn get_value(&self, time: SimTime, output: &ExchangeId) -> CouplingResult<Vec<f64>> {
        if output.as_str() != Self::OUTPUT {
            return Err(CouplingError::UnknownOutput {
                node: self.id.clone(),
                output: output.clone(),
            });
        }
        let inputs = self.inputs.borrow().clone();
        let mut cost = 0.0;
        for upstream in &inputs {
            let target = self
                .targets
                .get(upstream.link().target_input())
                .copied()
                .unwrap_or_default();
            for value in upstream.pull(time)? {
                cost += (value - target).powi(2);
            }
        }
        self.evaluations.set(self.evaluations.get() + 1);
        Ok(vec![cost])
    }

    fn keep_state(&self) -> CouplingResult<StateToken> {
        Ok(StateToken(0))
    }

    fn restore_state(&self, _token: &StateToken) -> CouplingResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nodes::AffineNode;
    use crate::domain::models::Link;
    use std::rc::Rc;

    #[test]
    fn test_cost_sums_squared_distances() {
        let p = Rc::new(AffineNode::new("p", 3.0, 0.0));
        let q = Rc::new(AffineNode::new("q", -1.0, 0.0));
        let objective = QuadraticCostNode::new(
            "objective",
            BTreeMap::from([(ExchangeId::from("p"), 1.0), (ExchangeId::from("q"), 0.0)]),
        );
        objective
            .connect_input(UpstreamLink::from_node(Link::new("p->o", "p", "out", "objective", "p"), &p).unwrap())
            .unwrap();
        objective
            .connect_input(UpstreamLink::from_node(Link::new("q->o", "q", "out", "objective", "q"), &q).unwrap())
            .unwrap();
        let cost = objective
            .get_value(SimTime(0.0), &ExchangeId::from("cost"))
            .unwrap();
        assert_eq!(cost, vec![5.0]);
        assert_eq!(objective.evaluations(), 1);
    }

    #[test]
    fn test_input_without_target_rejected() {
        let p = Rc::new(AffineNode::new("p", 3.0, 0.0));
        let objective = QuadraticCostNode::new("objective", BTreeMap::new());
        let link = Link::new("p->o", "p", "out", "objective", "p");
        assert!(objective
            .connect_input(UpstreamLink::from_node(link, &p).unwrap())
            .is_err());
    }
}
