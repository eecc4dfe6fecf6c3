//! Damped fixed-point iteration across a controller's incoming links.
//!
//! Every iteration restores the upstream nodes to the state captured at the
//! start of the solve, pulls each incoming link in registration order and
//! relaxes the buffered value towards the pulled one:
//!
//! ```text
//! new[j] = ρ·buf[j] + (1 − ρ)·raw[j]
//! change += (buf[j] − raw[j])²
//! ```
//!
//! The solve stops once `change` drops below the tolerance or the iteration
//! cap is reached. Hitting the cap is not an error; the report says so.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{
    EquilibratorConfig, ExchangeId, Link, LinkId, NodeId, SimTime, SolveGuard, SolveState,
    UpstreamLink, ValueBuffer,
};
use crate::domain::ports::{SimulationNode, StateToken};
use crate::services::controller::{Checkpoint, ControllerCore};

/// Change reported for an iteration in which a key was written for the first time.
pub const FIRST_CONTACT_CHANGE: f64 = 10.0;

/// Outcome of one equilibration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveReport {
    pub run_id: Uuid,
    pub time: SimTime,
    /// Iterations actually run
    pub iterations: u32,
    pub converged: bool,
    /// Sum of squared differences in the last iteration
    pub residual: f64,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Supervisory node that relaxes its inputs to a self-consistent state.
#[derive(Debug)]
pub struct Equilibrator {
    core: ControllerCore,
    config: EquilibratorConfig,
    last_report: RefCell<Option<SolveReport>>,
}

impl Equilibrator {
    pub fn new(id: impl Into<NodeId>, config: EquilibratorConfig) -> CouplingResult<Self> {
        config.validate()?;
        Ok(Self {
            core: ControllerCore::new(id),
            config,
            last_report: RefCell::new(None),
        })
    }

    pub const fn config(&self) -> &EquilibratorConfig {
        &self.config
    }

    pub fn connect_input(&self, upstream: UpstreamLink) -> CouplingResult<()> {
        self.core.connect_input(upstream)
    }

    pub fn connect_output(&self, link: Link) -> CouplingResult<()> {
        self.core.connect_output(link)
    }

    /// Buffer keys this controller writes, in first-seen link order.
    pub fn keys(&self) -> Vec<ExchangeId> {
        let mut keys: Vec<ExchangeId> = Vec::new();
        for upstream in self.core.inputs() {
            let key = upstream.link().target_input();
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Check the wiring before a solve.
    pub fn validate(&self) -> CouplingResult<()> {
        let keys = self.keys();
        if keys.is_empty() {
            return Err(CouplingError::InvalidConfig(format!(
                "equilibrator {} has no incoming links",
                self.core.id()
            )));
        }
        self.core.validate_outputs(&keys)
    }

    /// Run a full solve at `time`, whatever the current state.
    #[instrument(skip_all, fields(controller = %self.core.id(), time = %time))]
    pub fn solve(&self, time: SimTime) -> CouplingResult<SolveReport> {
        let guard = SolveGuard::begin(self.core.state_cell())
            .ok_or_else(|| CouplingError::AlreadySolving(self.core.id().clone()))?;
        self.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let inputs = self.core.inputs();
        let checkpoint = Checkpoint::capture(&self.core.upstream_nodes()?)?;
        debug!(%run_id, links = inputs.len(), upstream = checkpoint.len(), "equilibration started");

        let mut iterations = 0;
        let mut residual = f64::INFINITY;
        let mut converged = false;
        while iterations < self.config.max_iterations {
            checkpoint.restore()?;
            let (change, first_contact) = self.iterate(time, &inputs)?;
            iterations += 1;
            residual = change;
            debug!(iteration = iterations, change, first_contact, "iteration complete");
            if !first_contact && change < self.config.tolerance {
                converged = true;
                break;
            }
        }
        drop(checkpoint);
        guard.settle(time);

        let report = SolveReport {
            run_id,
            time,
            iterations,
            converged,
            residual,
            started_at,
            elapsed: clock.elapsed(),
        };
        if converged {
            info!(%run_id, iterations, residual, "equilibrium reached");
        } else {
            warn!(
                %run_id,
                iterations,
                residual,
                tolerance = self.config.tolerance,
                "iteration cap reached without convergence; keeping last values"
            );
        }
        *self.last_report.borrow_mut() = Some(report.clone());
        Ok(report)
    }

    /// One sweep over the incoming links. Returns the accumulated change and
    /// whether any key was written for the first time.
    fn iterate(&self, time: SimTime, inputs: &[UpstreamLink]) -> CouplingResult<(f64, bool)> {
        let rho = self.config.relaxation;
        let mut change = 0.0;
        let mut first_contact = false;
        for upstream in inputs {
            let raw = upstream.pull(time)?;
            let key = upstream.link().target_input().clone();

            let mut buffer = self.core.buffer_mut();
            match buffer.get_mut(&key) {
                None => {
                    debug!(link = %upstream.link().id(), key = %key, "first contact");
                    buffer.put(key, raw);
                    change = FIRST_CONTACT_CHANGE;
                    first_contact = true;
                }
                Some(current) => {
                    if current.len() != raw.len() {
                        return Err(CouplingError::LengthMismatch {
                            id: key,
                            expected: current.len(),
                            actual: raw.len(),
                        });
                    }
                    for (buffered, pulled) in current.iter_mut().zip(&raw) {
                        let delta = *buffered - pulled;
                        change += delta * delta;
                        *buffered = rho * *buffered + (1.0 - rho) * pulled;
                    }
                }
            }
        }
        Ok((change, first_contact))
    }

    /// Value for an outgoing link, solving first when needed.
    pub fn get_value(&self, time: SimTime, link: &LinkId) -> CouplingResult<Vec<f64>> {
        let key = self.core.output_key(link)?;
        self.serve(time, &key)
    }

    fn serve(&self, time: SimTime, key: &ExchangeId) -> CouplingResult<Vec<f64>> {
        self.core.serve(time, key, |time| self.solve(time).map(|_| ()))
    }

    /// Copy of the current buffer.
    pub fn buffered(&self) -> ValueBuffer {
        self.core.buffer().clone()
    }

    pub fn state(&self) -> SolveState {
        self.core.state()
    }

    pub fn last_report(&self) -> Option<SolveReport> {
        self.last_report.borrow().clone()
    }

    /// Force the next query to solve again.
    pub fn invalidate(&self) {
        self.core.invalidate();
    }
}

impl SimulationNode for Equilibrator {
    fn id(&self) -> &NodeId {
        self.core.id()
    }

    fn get_value(&self, time: SimTime, output: &ExchangeId) -> CouplingResult<Vec<f64>> {
        if !self.keys().contains(output) {
            return Err(CouplingError::UnknownOutput {
                node: self.core.id().clone(),
                output: output.clone(),
            });
        }
        self.serve(time, output)
    }

    fn keep_state(&self) -> CouplingResult<StateToken> {
        self.core.keep_state()
    }

    fn restore_state(&self, token: &StateToken) -> CouplingResult<()> {
        self.core.restore_state(token)
    }

    fn clear_state(&self, token: StateToken) -> CouplingResult<()> {
        self.core.clear_state(token)
    }
}
