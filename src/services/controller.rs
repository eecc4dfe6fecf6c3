//! Link and buffer plumbing shared by the equilibrator and the evolver.
//!
//! A controller sits in the graph like any other node. It pulls from its
//! upstream links into a [`ValueBuffer`] and answers downstream queries from
//! that buffer. Borrows of the buffer and link lists are never held across a
//! pull, so an upstream node may query the controller while it is solving.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{
    Demand, ExchangeId, Link, LinkId, NodeId, SimTime, SolveState, UpstreamLink, ValueBuffer,
};
use crate::domain::ports::{SimulationNode, StateToken};

/// Buffer, links and solve state of one controller.
#[derive(Debug)]
pub struct ControllerCore {
    id: NodeId,
    inputs: RefCell<Vec<UpstreamLink>>,
    outputs: RefCell<Vec<Link>>,
    buffer: RefCell<ValueBuffer>,
    state: Cell<SolveState>,
    snapshots: RefCell<HashMap<u64, (ValueBuffer, SolveState)>>,
    next_token: Cell<u64>,
}

impl ControllerCore {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            inputs: RefCell::new(Vec::new()),
            outputs: RefCell::new(Vec::new()),
            buffer: RefCell::new(ValueBuffer::new()),
            state: Cell::new(SolveState::Idle),
            snapshots: RefCell::new(HashMap::new()),
            next_token: Cell::new(0),
        }
    }

    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// Register a link pulled during every solve.
    pub fn connect_input(&self, upstream: UpstreamLink) -> CouplingResult<()> {
        self.ensure_rewirable()?;
        let link = upstream.link();
        if link.target() != &self.id {
            return Err(CouplingError::InvalidConfig(format!(
                "link {} targets {} but was connected to {}",
                link.id(),
                link.target(),
                self.id
            )));
        }
        self.ensure_unique(link.id())?;
        debug!(controller = %self.id, link = %link.id(), source = %link.source(), "input connected");
        self.inputs.borrow_mut().push(upstream);
        Ok(())
    }

    /// Register a link served from the buffer.
    pub fn connect_output(&self, link: Link) -> CouplingResult<()> {
        self.ensure_rewirable()?;
        if link.source() != &self.id {
            return Err(CouplingError::InvalidConfig(format!(
                "link {} originates at {} but was connected to {}",
                link.id(),
                link.source(),
                self.id
            )));
        }
        self.ensure_unique(link.id())?;
        debug!(controller = %self.id, link = %link.id(), target = %link.target(), "output connected");
        self.outputs.borrow_mut().push(link);
        Ok(())
    }

    fn ensure_rewirable(&self) -> CouplingResult<()> {
        if self.state.get().is_solving() {
            return Err(CouplingError::TopologyLocked(self.id.clone()));
        }
        Ok(())
    }

    fn ensure_unique(&self, id: &LinkId) -> CouplingResult<()> {
        let taken = self.inputs.borrow().iter().any(|u| u.link().id() == id)
            || self.outputs.borrow().iter().any(|l| l.id() == id);
        if taken {
            return Err(CouplingError::DuplicateLink(id.clone()));
        }
        Ok(())
    }

    /// Snapshot of the incoming links in registration order.
    pub fn inputs(&self) -> Vec<UpstreamLink> {
        self.inputs.borrow().clone()
    }

    pub fn outputs(&self) -> Vec<Link> {
        self.outputs.borrow().clone()
    }

    /// Distinct source nodes of the incoming links, in first-seen order.
    pub fn upstream_nodes(&self) -> CouplingResult<Vec<Rc<dyn SimulationNode>>> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for upstream in self.inputs.borrow().iter() {
            if seen.insert(upstream.link().source().clone()) {
                nodes.push(upstream.node()?);
            }
        }
        Ok(nodes)
    }

    /// Every outgoing link must read a key the controller writes.
    pub fn validate_outputs(&self, known: &[ExchangeId]) -> CouplingResult<()> {
        for link in self.outputs.borrow().iter() {
            if !known.contains(link.source_output()) {
                return Err(CouplingError::UnboundOutput {
                    link: link.id().clone(),
                    key: link.source_output().clone(),
                    known: known.to_vec(),
                });
            }
        }
        Ok(())
    }

    /// Buffer key served by an outgoing link.
    pub fn output_key(&self, link: &LinkId) -> CouplingResult<ExchangeId> {
        self.outputs
            .borrow()
            .iter()
            .find(|l| l.id() == link)
            .map(|l| l.source_output().clone())
            .ok_or_else(|| CouplingError::UnknownLink(link.clone()))
    }

    pub fn state(&self) -> SolveState {
        self.state.get()
    }

    pub const fn state_cell(&self) -> &Cell<SolveState> {
        &self.state
    }

    pub fn demand(&self, time: SimTime) -> Demand {
        self.state.get().on_query(time)
    }

    /// Forget the settled epoch so the next query solves again.
    pub fn invalidate(&self) {
        if !self.state.get().is_solving() {
            self.state.set(SolveState::Idle);
        }
    }

    pub fn buffer(&self) -> Ref<'_, ValueBuffer> {
        self.buffer.borrow()
    }

    pub fn buffer_mut(&self) -> RefMut<'_, ValueBuffer> {
        self.buffer.borrow_mut()
    }

    /// Copy a buffered value out, or report a miss.
    pub fn read(&self, key: &ExchangeId) -> CouplingResult<Vec<f64>> {
        self.buffer
            .borrow()
            .require(&self.id, key)
            .map(<[f64]>::to_vec)
    }

    /// Answer a query, running `solve` first if the state machine demands it.
    pub fn serve<F>(&self, time: SimTime, key: &ExchangeId, solve: F) -> CouplingResult<Vec<f64>>
    where
        F: FnOnce(SimTime) -> CouplingResult<()>,
    {
        match self.demand(time) {
            Demand::Solve => solve(time)?,
            Demand::ReadBuffer => {
                debug!(controller = %self.id, key = %key, state = self.state.get().as_str(), "serving buffered value");
            }
        }
        self.read(key)
    }

    pub fn keep_state(&self) -> CouplingResult<StateToken> {
        let token = self.next_token.get();
        self.next_token.set(token + 1);
        let state = match self.state.get() {
            SolveState::Solving => SolveState::Idle,
            other => other,
        };
        self.snapshots
            .borrow_mut()
            .insert(token, (self.buffer.borrow().clone(), state));
        Ok(StateToken(token))
    }

    /// Roll the buffer and state back to `token`.
    ///
    /// A controller that is mid-solve is left untouched: its buffer is what
    /// nested queries read, and its own solve owns it until it settles.
    pub fn restore_state(&self, token: &StateToken) -> CouplingResult<()> {
        if self.state.get().is_solving() {
            debug!(controller = %self.id, token = %token, "restore skipped while solving");
            return Ok(());
        }
        let snapshots = self.snapshots.borrow();
        let (buffer, state) = snapshots
            .get(&token.0)
            .ok_or_else(|| CouplingError::UnknownStateToken {
                node: self.id.clone(),
                token: token.0,
            })?;
        *self.buffer.borrow_mut() = buffer.clone();
        self.state.set(*state);
        Ok(())
    }

    pub fn clear_state(&self, token: StateToken) -> CouplingResult<()> {
        self.snapshots
            .borrow_mut()
            .remove(&token.0)
            .map(|_| ())
            .ok_or_else(|| CouplingError::UnknownStateToken {
                node: self.id.clone(),
                token: token.0,
            })
    }
}

/// States captured from a set of upstream nodes at the start of a solve.
///
/// Dropping the checkpoint releases every captured state, whichever way the
/// solve ended.
pub struct Checkpoint {
    entries: Vec<(Rc<dyn SimulationNode>, StateToken)>,
}

impl Checkpoint {
    pub fn capture(nodes: &[Rc<dyn SimulationNode>]) -> CouplingResult<Self> {
        let mut checkpoint = Self {
            entries: Vec::with_capacity(nodes.len()),
        };
        for node in nodes {
            let token = node.keep_state()?;
            checkpoint.entries.push((Rc::clone(node), token));
        }
        Ok(checkpoint)
    }

    pub fn restore(&self) -> CouplingResult<()> {
        for (node, token) in &self.entries {
            node.restore_state(token)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        for (node, token) in self.entries.drain(..) {
            if let Err(err) = node.clear_state(token) {
                warn!(node = %node.id(), token = %token, error = %err, "failed to release checkpoint");
            }
        }
    }
}

impl std::fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(node, token)| (node.id().clone(), *token)))
            .finish()
    }
}
