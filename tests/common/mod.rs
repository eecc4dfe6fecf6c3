//! Common test utilities for integration tests
//!
//! Provides recording nodes and logging setup shared across the
//! integration test files.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use coupler::domain::models::{ExchangeId, NodeId, SimTime};
use coupler::{CouplingError, CouplingResult, SimulationNode, StateToken};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Shared record of which node answered a pull, in call order.
pub type PullLog = Rc<RefCell<Vec<NodeId>>>;

pub fn pull_log() -> PullLog {
    Rc::new(RefCell::new(Vec::new()))
}

type Respond = Box<dyn Fn(u32) -> CouplingResult<Vec<f64>>>;

/// Node that answers from a closure of its call count and records every
/// pull and state operation.
pub struct RecordingNode {
    id: NodeId,
    respond: Respond,
    log: Option<PullLog>,
    pub calls: Cell<u32>,
    pub kept: Cell<u32>,
    pub restored: Cell<u32>,
    pub cleared: Cell<u32>,
}

impl RecordingNode {
    pub fn new(id: &str, respond: impl Fn(u32) -> CouplingResult<Vec<f64>> + 'static) -> Self {
        Self {
            id: NodeId::from(id),
            respond: Box::new(respond),
            log: None,
            calls: Cell::new(0),
            kept: Cell::new(0),
            restored: Cell::new(0),
            cleared: Cell::new(0),
        }
    }

    /// Node that always returns `values`.
    pub fn constant(id: &str, values: Vec<f64>) -> Self {
        Self::new(id, move |_| Ok(values.clone()))
    }

    /// Node that fails on its first `failures` calls, then returns `values`.
    pub fn flaky(id: &str, failures: u32, values: Vec<f64>) -> Self {
        let node = NodeId::from(id);
        Self::new(id, move |call| {
            if call <= failures {
                Err(CouplingError::Node {
                    node: node.clone(),
                    message: format!("scripted failure {call}"),
                })
            } else {
                Ok(values.clone())
            }
        })
    }

    pub fn with_log(mut self, log: &PullLog) -> Self {
        self.log = Some(Rc::clone(log));
        self
    }
}

impl SimulationNode for RecordingNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn get_value(&self, _time: SimTime, _output: &ExchangeId) -> CouplingResult<Vec<f64>> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.id.clone());
        }
        (self.respond)(call)
    }

    fn keep_state(&self) -> CouplingResult<StateToken> {
        self.kept.set(self.kept.get() + 1);
        Ok(StateToken(u64::from(self.kept.get())))
    }

    fn restore_state(&self, _token: &StateToken) -> CouplingResult<()> {
        self.restored.set(self.restored.get() + 1);
        Ok(())
    }

    fn clear_state(&self, _token: StateToken) -> CouplingResult<()> {
        self.cleared.set(self.cleared.get() + 1);
        Ok(())
    }
}
