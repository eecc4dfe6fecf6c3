//! Calibration controller: steady-state genetic search driven through links.
//!
//! Candidates are written into the buffer keyed by parameter id, where
//! downstream nodes read them through the evolver's outgoing links. The cost
//! is read back through the incoming links. When several cost links are
//! connected they are all pulled in order and the last scalar of the last
//! one is the cost.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{
    EvolverConfig, ExchangeId, Link, LinkId, NodeId, SearchBounds, SimTime, Solution, SolveGuard,
    SolveState, UpstreamLink, ValueBuffer,
};
use crate::domain::ports::{SimulationNode, StateToken};
use crate::services::controller::{Checkpoint, ControllerCore};
use crate::services::genetic::SteadyStateSearch;

/// Outcome of one calibration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvolutionReport {
    pub run_id: Uuid,
    pub time: SimTime,
    /// Lowest-cost solution seen during the run
    pub best: Solution,
    pub evaluations: usize,
    pub generations: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct Evolver {
    core: ControllerCore,
    config: EvolverConfig,
    bounds: SearchBounds,
    last_report: RefCell<Option<EvolutionReport>>,
}

impl Evolver {
    /// Build an evolver whose buffer already holds every parameter's initial value.
    pub fn new(id: impl Into<NodeId>, config: EvolverConfig) -> CouplingResult<Self> {
        config.validate()?;
        let bounds = SearchBounds::from_parameters(&config.parameters)?;
        let core = ControllerCore::new(id);
        {
            let mut buffer = core.buffer_mut();
            for parameter in &config.parameters {
                buffer.put(parameter.id.clone(), vec![parameter.initial]);
            }
        }
        Ok(Self {
            core,
            config,
            bounds,
            last_report: RefCell::new(None),
        })
    }

    pub const fn config(&self) -> &EvolverConfig {
        &self.config
    }

    pub const fn bounds(&self) -> &SearchBounds {
        &self.bounds
    }

    /// Register a cost-producing link.
    pub fn connect_input(&self, upstream: UpstreamLink) -> CouplingResult<()> {
        self.core.connect_input(upstream)
    }

    /// Register a link that reads one parameter.
    pub fn connect_output(&self, link: Link) -> CouplingResult<()> {
        self.core.connect_output(link)
    }

    pub fn validate(&self) -> CouplingResult<()> {
        if self.core.inputs().is_empty() {
            return Err(CouplingError::MissingCostLink(self.core.id().clone()));
        }
        self.core.validate_outputs(self.bounds.ids())
    }

    /// Run a full calibration at `time`, whatever the current state.
    #[instrument(skip_all, fields(controller = %self.core.id(), time = %time))]
    pub fn run(&self, time: SimTime) -> CouplingResult<EvolutionReport> {
        let guard = SolveGuard::begin(self.core.state_cell())
            .ok_or_else(|| CouplingError::AlreadySolving(self.core.id().clone()))?;
        self.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let rng = match self.config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let inputs = self.core.inputs();
        let checkpoint = if self.config.restore_between_evaluations {
            Some(Checkpoint::capture(&self.core.upstream_nodes()?)?)
        } else {
            None
        };
        debug!(
            %run_id,
            parameters = self.bounds.len(),
            cost_links = inputs.len(),
            seed = ?self.config.seed,
            "calibration started"
        );

        let outcome = SteadyStateSearch::new(&self.config, &self.bounds, rng).run(|values| {
            if let Some(checkpoint) = &checkpoint {
                checkpoint.restore()?;
            }
            self.write_parameters(values);
            self.cost(time, &inputs)
        })?;

        self.write_parameters(outcome.best.values());
        drop(checkpoint);
        guard.settle(time);

        let report = EvolutionReport {
            run_id,
            time,
            best: outcome.best,
            evaluations: outcome.evaluations,
            generations: outcome.generations,
            started_at,
            elapsed: clock.elapsed(),
        };
        info!(
            %run_id,
            evaluations = report.evaluations,
            generations = report.generations,
            best_cost = report.best.cost(),
            best = ?report.best.values(),
            "calibration finished"
        );
        *self.last_report.borrow_mut() = Some(report.clone());
        Ok(report)
    }

    fn write_parameters(&self, values: &[f64]) {
        let mut buffer = self.core.buffer_mut();
        for (id, &value) in self.bounds.ids().iter().zip(values) {
            buffer.put(id.clone(), vec![value]);
        }
    }

    fn cost(&self, time: SimTime, inputs: &[UpstreamLink]) -> CouplingResult<f64> {
        let mut cost = f64::NAN;
        for upstream in inputs {
            let raw = upstream.pull(time)?;
            cost = raw
                .last()
                .copied()
                .ok_or_else(|| CouplingError::EmptyCost(upstream.link().id().clone()))?;
        }
        Ok(cost)
    }

    /// Value for an outgoing link, calibrating first when needed.
    pub fn get_value(&self, time: SimTime, link: &LinkId) -> CouplingResult<Vec<f64>> {
        let key = self.core.output_key(link)?;
        self.serve(time, &key)
    }

    fn serve(&self, time: SimTime, key: &ExchangeId) -> CouplingResult<Vec<f64>> {
        self.core.serve(time, key, |time| self.run(time).map(|_| ()))
    }

    /// Copy of the current buffer.
    pub fn buffered(&self) -> ValueBuffer {
        self.core.buffer().clone()
    }

    pub fn state(&self) -> SolveState {
        self.core.state()
    }

    pub fn last_report(&self) -> Option<EvolutionReport> {
        self.last_report.borrow().clone()
    }

    /// Force the next query to calibrate again.
    pub fn invalidate(&self) {
        self.core.invalidate();
    }
}

impl SimulationNode for Evolver {
    fn id(&self) -> &NodeId {
        self.core.id()
    }

    fn get_value(&self, time: SimTime, output: &ExchangeId) -> CouplingResult<Vec<f64>> {
        if !self.bounds.ids().contains(output) {
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
