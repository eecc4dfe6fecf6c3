//! Affine reference node: `out = offset + Σ gain · input`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use tracing::trace;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{ExchangeId, NodeId, SimTime, UpstreamLink};
use crate::domain::ports::{SimulationNode, StateToken};

/// Scalar node whose output is an affine combination of its inputs.
///
/// An input whose source cannot answer yet (a controller mid-solve that has
/// not written the key) contributes `fallback` instead. The node remembers
/// its last output, which is its checkpointed state, and counts every pull
/// over its lifetime; restoring a checkpoint leaves the count alone.
#[derive(Debug)]
pub struct AffineNode {
    id: NodeId,
    offset: f64,
    fallback: f64,
    inputs: RefCell<Vec<(UpstreamLink, f64)>>,
    last: Cell<Option<f64>>,
    pulls: Cell<u64>,
    snapshots: RefCell<HashMap<u64, Option<f64>>>,
    next_token: Cell<u64>,
}

impl AffineNode {
    pub const OUTPUT: &'static str = "out";

    pub fn new(id: impl Into<NodeId>, offset: f64, fallback: f64) -> Self {
        Self {
            id: id.into(),
            offset,
            fallback,
            inputs: RefCell::new(Vec::new()),
            last: Cell::new(None),
            pulls: Cell::new(0),
            snapshots: RefCell::new(HashMap::new()),
            next_token: Cell::new(0),
        }
    }

    pub fn connect_input(&self, upstream: UpstreamLink, gain: f64) -> CouplingResult<()> {
        if upstream.link().target() != &self.id {
            return Err(CouplingError::InvalidConfig(format!(
                "link {} targets {} but was connected to {}",
                upstream.link().id(),
                upstream.link().target(),
                self.id
            )));
        }
        self.inputs.borrow_mut().push((upstream, gain));
        Ok(())
    }

    pub fn last(&self) -> Option<f64> {
        self.last.get()
    }

    pub fn pulls(&self) -> u64 {
        self.pulls.get()
    }

    fn input(&self, time: SimTime, upstream: &UpstreamLink) -> CouplingResult<f64> {
        match upstream.pull(time) {
            Ok(values) => values.first().copied().ok_or_else(|| CouplingError::Node {
                node: self.id.clone(),
                message: format!("input {} delivered no values", upstream.link().id()),
            }),
            Err(err) if err.is_recoverable() => {
                trace!(node = %self.id, link = %upstream.link().id(), fallback = self.fallback, "input not ready");
                Ok(self.fallback)
            }
            Err(err) => Err(err),
        }
    }
}

impl SimulationNode for AffineNode {
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
        self.pulls.set(self.pulls.get() + 1);

        let inputs = self.inputs.borrow().clone();
        let mut value = self.offset;
        for (upstream, gain) in &inputs {
            value += gain * self.input(time, upstream)?;
        }
        self.last.set(Some(value));
        Ok(vec![value])
    }

    fn keep_state(&self) -> CouplingResult<StateToken> {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        self.snapshots.borrow_mut().insert(token, self.last.get());
        Ok(StateToken(token))
    }

    fn restore_state(&self, token: &StateToken) -> CouplingResult<()> {
        let last = self
            .snapshots
            .borrow()
            .get(&token.0)
            .copied()
            .ok_or_else(|| CouplingError::UnknownStateToken {
                node: self.id.clone(),
                token: token.0,
            })?;
        self.last.set(last);
        Ok(())
    }

    fn clear_state(&self, token: StateToken) -> CouplingResult<()> {
        self.snapshots.borrow_mut().remove(&token.0);
        Ok(())
    }
}
