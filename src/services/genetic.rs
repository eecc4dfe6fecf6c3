//! Steady-state genetic search over a bounded parameter space.
//!
//! Each generation draws a tournament, keeps its two best members as parents,
//! replaces its two worst members with mutated intermediate-recombination
//! children, and evaluates both children. Population size never changes and
//! the evaluation counter advances by exactly two per generation.
//!
//! The engine knows nothing about links: the cost of a candidate comes from a
//! caller-supplied closure.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::errors::{CouplingError, CouplingResult};
use crate::domain::models::{EvolverConfig, Population, SearchBounds, Solution};

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// Lowest-cost solution ever evaluated
    pub best: Solution,
    pub evaluations: usize,
    pub generations: usize,
}

pub struct SteadyStateSearch<'a, R: Rng> {
    config: &'a EvolverConfig,
    bounds: &'a SearchBounds,
    rng: R,
    population: Population,
    evaluations: usize,
    generations: usize,
    best: Option<Solution>,
}

impl<'a, R: Rng> SteadyStateSearch<'a, R> {
    pub fn new(config: &'a EvolverConfig, bounds: &'a SearchBounds, rng: R) -> Self {
        Self {
            config,
            bounds,
            rng,
            population: Population::default(),
            evaluations: 0,
            generations: 0,
            best: None,
        }
    }

    /// Sample and evaluate the initial population.
    pub fn initialize<F>(&mut self, evaluate: &mut F) -> CouplingResult<()>
    where
        F: FnMut(&[f64]) -> CouplingResult<f64>,
    {
        let mut members = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            let candidate = Solution::random(self.bounds, &mut self.rng);
            members.push(self.evaluate(candidate, evaluate)?);
        }
        self.population = Population::new(members);
        debug!(
            size = self.population.len(),
            evaluations = self.evaluations,
            "initial population evaluated"
        );
        Ok(())
    }

    /// Run one generation.
    pub fn step<F>(&mut self, evaluate: &mut F) -> CouplingResult<()>
    where
        F: FnMut(&[f64]) -> CouplingResult<f64>,
    {
        let size = self.config.tournament_size;
        let mut contestants = self.population.tournament(size, &mut self.rng)?;
        self.population.rank(&mut contestants);

        let first = self.population[contestants[0]].clone();
        let second = self.population[contestants[1]].clone();

        let losers = &contestants[size - EvolverConfig::REPLACEMENTS..];
        self.population.remove(losers);

        for _ in 0..EvolverConfig::REPLACEMENTS {
            let mut child = Solution::recombine(self.bounds, &first, &second, &mut self.rng);
            child.mutate(self.bounds, &mut self.rng);
            let child = self.evaluate(child, evaluate)?;
            self.population.insert(child);
        }

        self.generations += 1;
        Ok(())
    }

    /// Initialize, then step until the evaluation budget is spent.
    pub fn run<F>(mut self, mut evaluate: F) -> CouplingResult<SearchOutcome>
    where
        F: FnMut(&[f64]) -> CouplingResult<f64>,
    {
        self.initialize(&mut evaluate)?;
        while self.evaluations < self.config.max_evaluations {
            self.step(&mut evaluate)?;
        }

        let best = self.best.ok_or_else(|| {
            CouplingError::InvalidConfig("search finished with every cost NaN".into())
        })?;
        Ok(SearchOutcome {
            best,
            evaluations: self.evaluations,
            generations: self.generations,
        })
    }

    fn evaluate<F>(&mut self, mut candidate: Solution, evaluate: &mut F) -> CouplingResult<Solution>
    where
        F: FnMut(&[f64]) -> CouplingResult<f64>,
    {
        let cost = evaluate(candidate.values())?;
        candidate.set_cost(cost);
        self.evaluations += 1;

        // NaN never becomes the best, and any number displaces a NaN best.
        let improved = !cost.is_nan()
            && self
                .best
                .as_ref()
                .map_or(true, |best| best.cost().is_nan() || cost < best.cost());
        if improved {
            self.best = Some(candidate.clone());
        }

        if self.evaluations % self.config.report_interval == 0 {
            if let Some(best) = &self.best {
                info!(
                    evaluations = self.evaluations,
                    generations = self.generations,
                    best_cost = best.cost(),
                    best = ?best.values(),
                    "calibration progress"
                );
            }
        }
        Ok(candidate)
    }

    pub const fn population(&self) -> &Population {
        &self.population
    }

    pub const fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub const fn generations(&self) -> usize {
        self.generations
    }

    pub const fn best(&self) -> Option<&Solution> {
        self.best.as_ref()
    }
}
