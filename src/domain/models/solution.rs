//! Individuals of a calibration run and the variation operators on them.
//!
//! Every operator takes the run's [`SearchBounds`] explicitly. Bounds are only
//! enforced when sampling the initial population: recombination may
//! extrapolate past the parents and mutation may step past a bound, and
//! neither result is clamped.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ids::ExchangeId;
use super::parameter::ParameterDescriptor;
use crate::domain::errors::{CouplingError, CouplingResult};

/// Recombination weights are drawn from `[-EXTENSION, 1 + EXTENSION]`.
pub const RECOMBINATION_EXTENSION: f64 = 0.25;

/// Largest mutation step as a fraction of the parameter range.
pub const MUTATION_RANGE_FRACTION: f64 = 0.1;

/// Mutation precision `k`: steps span `range * 0.1 * [2^-k, 1]`.
pub const MUTATION_PRECISION: f64 = 4.0;

/// Immutable per-run search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchBounds {
    ids: Vec<ExchangeId>,
    min: Vec<f64>,
    max: Vec<f64>,
}

impl SearchBounds {
    pub fn from_parameters(parameters: &[ParameterDescriptor]) -> CouplingResult<Self> {
        if parameters.is_empty() {
            return Err(CouplingError::InvalidConfig(
                "at least one free parameter is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for p in parameters {
            p.validate()?;
            if !seen.insert(&p.id) {
                return Err(CouplingError::InvalidConfig(format!(
                    "parameter {} is declared more than once",
                    p.id
                )));
            }
        }

        Ok(Self {
            ids: parameters.iter().map(|p| p.id.clone()).collect(),
            min: parameters.iter().map(|p| p.min).collect(),
            max: parameters.iter().map(|p| p.max).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[ExchangeId] {
        &self.ids
    }

    pub fn min(&self) -> &[f64] {
        &self.min
    }

    pub fn max(&self) -> &[f64] {
        &self.max
    }

    pub fn range(&self, k: usize) -> f64 {
        self.max[k] - self.min[k]
    }

    /// Whether every gene lies inside its closed interval.
    pub fn contains(&self, values: &[f64]) -> bool {
        values.len() == self.len()
            && values
                .iter()
                .zip(self.min.iter().zip(&self.max))
                .all(|(v, (lo, hi))| v >= lo && v <= hi)
    }
}

/// A candidate parameter vector and its cost.
///
/// Unevaluated solutions carry an infinite cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    values: Vec<f64>,
    cost: f64,
}

impl Solution {
    pub fn from_values(bounds: &SearchBounds, values: Vec<f64>) -> CouplingResult<Self> {
        if values.len() != bounds.len() {
            return Err(CouplingError::InvalidConfig(format!(
                "solution has {} genes, search space has {}",
                values.len(),
                bounds.len()
            )));
        }
        Ok(Self {
            values,
            cost: f64::INFINITY,
        })
    }

    /// Sample every gene uniformly within its bounds.
    pub fn random<R: Rng + ?Sized>(bounds: &SearchBounds, rng: &mut R) -> Self {
        let values = bounds
            .min()
            .iter()
            .zip(bounds.max())
            .map(|(&lo, &hi)| rng.gen_range(lo..=hi))
            .collect();
        Self {
            values,
            cost: f64::INFINITY,
        }
    }

    /// Intermediate recombination.
    ///
    /// Per gene `a` is drawn from `[-0.25, 1.25]` and the child gene is
    /// `a * first + (1 - a) * second`.
    pub fn recombine<R: Rng + ?Sized>(
        bounds: &SearchBounds,
        first: &Self,
        second: &Self,
        rng: &mut R,
    ) -> Self {
        debug_assert_eq!(first.values.len(), bounds.len());
        debug_assert_eq!(second.values.len(), bounds.len());

        let values = first
            .values
            .iter()
            .zip(&second.values)
            .map(|(&x, &y)| {
                let a = rng.gen_range(-RECOMBINATION_EXTENSION..=1.0 + RECOMBINATION_EXTENSION);
                a * x + (1.0 - a) * y
            })
            .collect();
        Self {
            values,
            cost: f64::INFINITY,
        }
    }

    /// Breeder-GA mutation.
    ///
    /// Each gene mutates with probability `1 / n`, stepping by
    /// `±0.1 * range * 2^(-4u)` with `u` uniform in `[0, 1)`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, bounds: &SearchBounds, rng: &mut R) {
        let rate = 1.0 / bounds.len() as f64;
        for (k, gene) in self.values.iter_mut().enumerate() {
            if !rng.gen_bool(rate) {
                continue;
            }
            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let radius = MUTATION_RANGE_FRACTION * bounds.range(k);
            let u: f64 = rng.gen();
            *gene += sign * radius * (-MUTATION_PRECISION * u).exp2();
        }
        self.cost = f64::INFINITY;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub const fn cost(&self) -> f64 {
        self.cost
    }

    pub fn set_cost(&mut self, cost: f64) {
        self.cost = cost;
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn bounds() -> SearchBounds {
        SearchBounds::from_parameters(&[
            "a,-1,1,0".parse().unwrap(),
            "b,10,20,15".parse().unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_random_solution_within_bounds() {
        let bounds = bounds();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let s = Solution::random(&bounds, &mut rng);
            assert!(bounds.contains(s.values()));
            assert!(s.cost().is_infinite());
        }
    }

    #[test]
    fn test_recombination_stays_in_extended_hull() {
        let bounds = bounds();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let p1 = Solution::from_values(&bounds, vec![0.0, 10.0]).unwrap();
        let p2 = Solution::from_values(&bounds, vec![1.0, 20.0]).unwrap();
        for _ in 0..500 {
            let child = Solution::recombine(&bounds, &p1, &p2, &mut rng);
            assert!(child.values()[0] >= -0.25 - 1e-12 && child.values()[0] <= 1.25 + 1e-12);
            assert!(child.values()[1] >= 7.5 - 1e-9 && child.values()[1] <= 22.5 + 1e-9);
        }
    }

    #[test]
    fn test_mutation_step_size() {
        let bounds = bounds();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let base = Solution::from_values(&bounds, vec![0.0, 15.0]).unwrap();
        let mut mutated_any = false;
        for _ in 0..500 {
            let mut s = base.clone();
            s.mutate(&bounds, &mut rng);
            for k in 0..2 {
                let step = (s.values()[k] - base.values()[k]).abs();
                if step > 0.0 {
                    mutated_any = true;
                    let radius = 0.1 * bounds.range(k);
                    assert!(step <= radius + 1e-12);
                    assert!(step > radius / 16.0 - 1e-12);
                }
            }
        }
        assert!(mutated_any);
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let result = SearchBounds::from_parameters(&[
            "a,0,1,0".parse().unwrap(),
            "a,0,2,0".parse().unwrap(),
        ]);
        assert!(matches!(result, Err(CouplingError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_parameter_list_rejected() {
        assert!(SearchBounds::from_parameters(&[]).is_err());
    }

    #[test]
    fn test_gene_count_must_match() {
        let result = Solution::from_values(&bounds(), vec![1.0]);
        assert!(result.is_err());
    }
}
