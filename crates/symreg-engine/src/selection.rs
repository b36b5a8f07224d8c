//! Parent selectors (§4.I).
//!
//! A small trait implemented by independent strategies, each taking a
//! population slice plus a comparison callback rather than assuming
//! single-objective fitness, so the same selectors serve both the
//! steady-state and NSGA-II drivers (§4.L).

use std::cmp::Ordering;
use symreg_core::domain::random_provider;

/// How two population members compare, abstracting over plain
/// single-objective fitness and NSGA-II's crowded comparison (rank, then
/// crowding distance) (§4.I, last line).
pub trait Compare: Sync {
    /// `Less` means `a` is preferred over `b`.
    fn compare(&self, a: usize, b: usize) -> Ordering;
}

/// Compares by a single fitness objective at `index`, directed by
/// `lower_is_better`.
pub struct SingleObjectiveCompare<'a> {
    pub fitness: &'a [Vec<f64>],
    pub index: usize,
    pub lower_is_better: bool,
}

impl Compare for SingleObjectiveCompare<'_> {
    fn compare(&self, a: usize, b: usize) -> Ordering {
        let ord = self.fitness[a][self.index]
            .partial_cmp(&self.fitness[b][self.index])
            .unwrap_or(Ordering::Equal);
        if self.lower_is_better { ord } else { ord.reverse() }
    }
}

/// Crowded comparison for NSGA-II: lower Pareto rank wins; ties broken by
/// larger crowding distance (§4.I, §4.K).
pub struct CrowdedCompare<'a> {
    pub rank: &'a [usize],
    pub distance: &'a [f64],
}

impl Compare for CrowdedCompare<'_> {
    fn compare(&self, a: usize, b: usize) -> Ordering {
        match self.rank[a].cmp(&self.rank[b]) {
            Ordering::Equal => self.distance[b].partial_cmp(&self.distance[a]).unwrap_or(Ordering::Equal),
            other => other,
        }
    }
}

/// Picks `count` parents from `0..population_len` according to a strategy
/// (§4.I).
pub trait Selector: Send + Sync {
    fn name(&self) -> &'static str;
    fn select(&self, population_len: usize, compare: &dyn Compare, count: usize) -> Vec<usize>;
}

/// Samples `k` individuals uniformly and returns the best by `compare`,
/// `count` times independently.
pub struct TournamentSelector {
    pub k: usize,
}

impl TournamentSelector {
    pub fn new(k: usize) -> Self {
        TournamentSelector { k: k.max(1) }
    }

    fn run_one(&self, population_len: usize, compare: &dyn Compare) -> usize {
        let contestants = random_provider::sample_indices(0..population_len, self.k.min(population_len));
        *contestants.iter().min_by(|&&a, &&b| compare.compare(a, b)).expect("at least one contestant")
    }
}

impl Selector for TournamentSelector {
    fn name(&self) -> &'static str {
        "tournament"
    }

    fn select(&self, population_len: usize, compare: &dyn Compare, count: usize) -> Vec<usize> {
        (0..count).map(|_| self.run_one(population_len, compare)).collect()
    }
}

/// Sorts the whole population once by `compare` (the prepare phase), then
/// runs tournaments over ranks rather than re-comparing fitness every draw
/// (§4.I: "prepare-phase sorts once by comparison; then tournaments compare
/// ranks rather than fitnesses").
pub struct RankTournamentSelector {
    pub k: usize,
}

impl RankTournamentSelector {
    pub fn new(k: usize) -> Self {
        RankTournamentSelector { k: k.max(1) }
    }
}

impl Selector for RankTournamentSelector {
    fn name(&self) -> &'static str {
        "rank_tournament"
    }

    fn select(&self, population_len: usize, compare: &dyn Compare, count: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..population_len).collect();
        order.sort_by(|&a, &b| compare.compare(a, b));
        // `rank_of[i]` = position of individual `i` in the sorted order; a
        // smaller rank is better by construction.
        let mut rank_of = vec![0usize; population_len];
        for (rank, &individual) in order.iter().enumerate() {
            rank_of[individual] = rank;
        }

        let k = self.k.min(population_len);
        (0..count)
            .map(|_| {
                let contestants = random_provider::sample_indices(0..population_len, k);
                *contestants.iter().min_by_key(|&&i| rank_of[i]).expect("at least one contestant")
            })
            .collect()
    }
}

/// Builds a cumulative "worse-is-zero" distribution once, then samples via
/// binary search on a uniform deviate (§4.I). Requires a strictly-ordered
/// comparison to derive relative fitness weights; uses each individual's
/// rank position (better rank => larger weight) rather than raw fitness so
/// it composes with crowded comparison too.
pub struct ProportionalSelector;

impl ProportionalSelector {
    pub fn new() -> Self {
        ProportionalSelector
    }
}

impl Default for ProportionalSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for ProportionalSelector {
    fn name(&self) -> &'static str {
        "proportional"
    }

    fn select(&self, population_len: usize, compare: &dyn Compare, count: usize) -> Vec<usize> {
        if population_len == 0 {
            return Vec::new();
        }

        let mut order: Vec<usize> = (0..population_len).collect();
        order.sort_by(|&a, &b| compare.compare(a, b));

        // Best individual (order[0]) gets weight `population_len`, worst
        // gets weight `1`; cumulative sums give the sampling distribution.
        let mut cumulative = Vec::with_capacity(population_len);
        let mut running = 0.0;
        for (rank, &individual) in order.iter().enumerate() {
            running += (population_len - rank) as f64;
            cumulative.push((running, individual));
        }
        let total = running;

        (0..count)
            .map(|_| {
                let draw = random_provider::random::<f64>() * total;
                let pos = cumulative.partition_point(|&(c, _)| c < draw);
                cumulative[pos.min(cumulative.len() - 1)].1
            })
            .collect()
    }
}

/// Uniform random selection, ignoring `compare` entirely (§4.I).
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        RandomSelector
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for RandomSelector {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(&self, population_len: usize, _compare: &dyn Compare, count: usize) -> Vec<usize> {
        (0..count).map(|_| random_provider::range(0..population_len)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimize(fitness: &[Vec<f64>]) -> SingleObjectiveCompare<'_> {
        SingleObjectiveCompare { fitness, index: 0, lower_is_better: true }
    }

    #[test]
    fn tournament_never_returns_out_of_range_indices() {
        let fitness = vec![vec![3.0], vec![1.0], vec![2.0], vec![0.5]];
        let compare = minimize(&fitness);
        let selector = TournamentSelector::new(2);
        let picks = selector.select(fitness.len(), &compare, 20);
        assert!(picks.iter().all(|&i| i < fitness.len()));
    }

    #[test]
    fn rank_tournament_with_full_k_always_returns_the_best() {
        let fitness = vec![vec![3.0], vec![1.0], vec![2.0], vec![0.5]];
        let compare = minimize(&fitness);
        let selector = RankTournamentSelector::new(fitness.len());
        let picks = selector.select(fitness.len(), &compare, 5);
        assert!(picks.iter().all(|&i| i == 3));
    }

    #[test]
    fn proportional_selector_stays_in_bounds() {
        let fitness = vec![vec![3.0], vec![1.0], vec![2.0], vec![0.5]];
        let compare = minimize(&fitness);
        let selector = ProportionalSelector::new();
        let picks = selector.select(fitness.len(), &compare, 50);
        assert!(picks.iter().all(|&i| i < fitness.len()));
    }

    #[test]
    fn random_selector_stays_in_bounds() {
        let fitness = vec![vec![3.0], vec![1.0]];
        let compare = minimize(&fitness);
        let selector = RandomSelector::new();
        let picks = selector.select(fitness.len(), &compare, 50);
        assert!(picks.iter().all(|&i| i < fitness.len()));
    }

    #[test]
    fn crowded_compare_prefers_lower_rank_then_larger_distance() {
        let rank = vec![0, 1, 0];
        let distance = vec![1.0, 5.0, 3.0];
        let compare = CrowdedCompare { rank: &rank, distance: &distance };
        assert_eq!(compare.compare(0, 2), Ordering::Greater);
        assert_eq!(compare.compare(2, 0), Ordering::Less);
        assert_eq!(compare.compare(0, 1), Ordering::Less);
    }
}
