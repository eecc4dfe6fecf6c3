//! Fixed-size pool of solutions for steady-state search.

use std::ops::Index;

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::solution::Solution;
use crate::domain::errors::{CouplingError, CouplingResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    members: Vec<Solution>,
}

impl Population {
    pub const fn new(members: Vec<Solution>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Solution> {
        self.members.iter()
    }

    pub fn insert(&mut self, solution: Solution) {
        self.members.push(solution);
    }

    /// Lowest-cost member. NaN costs rank last.
    pub fn best(&self) -> Option<&Solution> {
        self.members
            .iter()
            .min_by(|a, b| rank_cost(a.cost()).total_cmp(&rank_cost(b.cost())))
    }

    /// Draw `size` distinct member indices uniformly at random.
    pub fn tournament<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> CouplingResult<Vec<usize>> {
        if size > self.members.len() {
            return Err(CouplingError::InvalidConfig(format!(
                "tournament of {size} drawn from a population of {}",
                self.members.len()
            )));
        }
        Ok(index::sample(rng, self.members.len(), size).into_vec())
    }

    /// Order tournament indices by ascending cost of the members they name.
    pub fn rank(&self, indices: &mut [usize]) {
        indices.sort_by(|&a, &b| {
            rank_cost(self.members[a].cost()).total_cmp(&rank_cost(self.members[b].cost()))
        });
    }

    /// Remove the members at `indices` and return them.
    pub fn remove(&mut self, indices: &[usize]) -> Vec<Solution> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        sorted
            .into_iter()
            .map(|i| self.members.swap_remove(i))
            .collect()
    }
}

impl Index<usize> for Population {
    type Output = Solution;

    fn index(&self, index: usize) -> &Solution {
        &self.members[index]
    }
}

fn rank_cost(cost: f64) -> f64 {
    if cost.is_nan() {
        f64::INFINITY
    } else {
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::solution::SearchBounds;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn population(costs: &[f64]) -> Population {
        let bounds = SearchBounds::from_parameters(&["x,0,10,0".parse().unwrap()]).unwrap();
        Population::new(
            costs
                .iter()
                .enumerate()
                .map(|(i, &c)| {
                    Solution::from_values(&bounds, vec![i as f64])
                        .unwrap()
                        .with_cost(c)
                })
                .collect(),
        )
    }

    #[test]
    fn test_tournament_indices_are_distinct() {
        let pop = population(&[5.0, 4.0, 3.0, 2.0, 1.0, 0.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let mut picks = pop.tournament(4, &mut rng).unwrap();
            picks.sort_unstable();
            picks.dedup();
            assert_eq!(picks.len(), 4);
        }
    }

    #[test]
    fn test_tournament_larger_than_population_fails() {
        let pop = population(&[1.0, 2.0]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(pop.tournament(4, &mut rng).is_err());
    }

    #[test]
    fn test_rank_orders_by_cost() {
        let pop = population(&[3.0, f64::NAN, 1.0, 2.0]);
        let mut picks = vec![0, 1, 2, 3];
        pop.rank(&mut picks);
        assert_eq!(picks, vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_remove_handles_any_index_order() {
        let mut pop = population(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let removed = pop.remove(&[1, 3]);
        assert_eq!(pop.len(), 3);
        let mut costs: Vec<f64> = removed.iter().map(Solution::cost).collect();
        costs.sort_by(f64::total_cmp);
        assert_eq!(costs, vec![1.0, 3.0]);
        assert!(pop.iter().all(|s| s.cost() != 1.0 && s.cost() != 3.0));
    }

    #[test]
    fn test_best_skips_nan() {
        let pop = population(&[f64::NAN, 2.0, 0.5, 9.0]);
        assert!((pop.best().unwrap().cost() - 0.5).abs() < f64::EPSILON);
        assert!((pop[1].cost() - 2.0).abs() < f64::EPSILON);
    }
}
