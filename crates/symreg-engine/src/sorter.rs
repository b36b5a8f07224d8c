//! The non-dominated sorter suite (§4.K): eight algorithms that all have to
//! agree on the same front partition for the same input, plus crowding
//! distance and a Pareto archive.
//!
//! The reference shape is a peel-by-dominance-count pass producing
//! `rank`/`crowding_distance`, plus an archive with an insert/prune/filter
//! discipline; the eight variants below each reach the same partition by a
//! different route, per the published non-dominated-sorting literature
//! (rank-intersect, rank-ordinal, merge-sort, best-order, deductive,
//! hierarchical, efficient-sequential/binary, dominance-degree).

use crate::objective::Objective;
use std::cmp::Ordering;

/// One population's worth of fitness vectors, as `&[f64]` borrows so callers
/// don't have to clone out of `Individual`.
pub type FitnessSlice<'a> = &'a [f64];

/// The eight sorter variants named in §4.K. All produce an identical
/// partition into fronts for the same `(fitness, objective, eps)`; callers
/// pick among them purely for the `(N, M)` performance trade-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorterKind {
    RankIntersect,
    RankOrdinal,
    MergeSort,
    BestOrder,
    Deductive,
    Hierarchical,
    EfficientSequential,
    EfficientBinary,
    DominanceDegree,
}

impl SorterKind {
    /// Sorts `fitness` into Pareto fronts (each a list of indices into
    /// `fitness`), lowest rank first. Exact duplicates (ε-equal under `eps`)
    /// are pulled out before ranking and appended as a trailing "worst"
    /// front, per §4.K's contract ("Callers pre-sort pop lexicographically
    /// ... and push exact duplicates into a final worst front").
    pub fn sort(&self, fitness: &[Vec<f64>], objective: &Objective, eps: f64) -> Vec<Vec<usize>> {
        if fitness.is_empty() {
            return Vec::new();
        }

        let order = lexicographic_order(fitness, objective);
        let (reps, duplicates) = split_duplicates(fitness, &order, objective, eps);

        if reps.is_empty() {
            // Every individual is a duplicate of every other.
            return vec![(0..fitness.len()).collect()];
        }

        let rep_fitness: Vec<FitnessSlice> = reps.iter().map(|&i| fitness[i].as_slice()).collect();

        let rep_fronts = match self {
            SorterKind::RankIntersect => rank_intersect(&rep_fitness, objective),
            SorterKind::RankOrdinal => rank_ordinal(&rep_fitness, objective),
            SorterKind::MergeSort => merge_sort_based(&rep_fitness, objective),
            SorterKind::BestOrder => best_order(&rep_fitness, objective),
            SorterKind::Deductive => deductive(&rep_fitness, objective),
            SorterKind::Hierarchical => hierarchical(&rep_fitness, objective),
            SorterKind::EfficientSequential => efficient_sequential(&rep_fitness, objective),
            SorterKind::EfficientBinary => efficient_binary(&rep_fitness, objective),
            SorterKind::DominanceDegree => dominance_degree(&rep_fitness, objective),
        };

        let mut fronts: Vec<Vec<usize>> = rep_fronts
            .into_iter()
            .map(|front| front.into_iter().map(|local| reps[local]).collect())
            .collect();

        if !duplicates.is_empty() {
            fronts.push(duplicates);
        }

        fronts
    }
}

fn lexicographic_order(fitness: &[Vec<f64>], objective: &Objective) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| objective.cmp(&fitness[a], &fitness[b]));
    order
}

/// Walks `order` and peels off every element that is ε-equal to the first
/// element of its run of identical neighbors. Since `order` is already
/// lexicographically sorted, ε-equal individuals are adjacent, so a single
/// linear pass suffices.
fn split_duplicates(
    fitness: &[Vec<f64>],
    order: &[usize],
    objective: &Objective,
    eps: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut reps = Vec::with_capacity(order.len());
    let mut duplicates = Vec::new();

    let mut i = 0;
    while i < order.len() {
        reps.push(order[i]);
        let mut j = i + 1;
        while j < order.len() && objective.eps_equal(&fitness[order[i]], &fitness[order[j]], eps) {
            duplicates.push(order[j]);
            j += 1;
        }
        i = j;
    }

    (reps, duplicates)
}

/// Standard peel: given how many individuals dominate each index and who
/// each index in turn dominates, repeatedly lifts off the currently-empty
/// "nobody left dominates me" set as the next front.
fn peel_fronts(n: usize, mut dominated_by: Vec<usize>, dominates: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| dominated_by[i] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominates[p] {
                dominated_by[q] -= 1;
                if dominated_by[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(current);
        current = next;
    }

    fronts
}

/// §4.K.1 Rank-Intersect (RS): per objective, build the set of individuals
/// at least as good as `i` (a bitset, one word per 64 individuals);
/// intersecting those sets across all `M` objectives gives exactly the
/// candidates that could dominate `i` in O(words) per individual. A cheap
/// final dominance check over that (small) candidate set turns candidates
/// into confirmed dominators.
fn rank_intersect(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let words = n.div_ceil(64);
    let m = objective.len();

    // candidate_sets[i] = bitset of individuals at-least-as-good-as i in
    // every objective simultaneously.
    let mut candidate_sets: Vec<Vec<u64>> = vec![vec![u64::MAX; words]; n];
    // Clear the bits beyond n in the last word.
    if n % 64 != 0 {
        let mask = (1u64 << (n % 64)) - 1;
        for set in candidate_sets.iter_mut() {
            *set.last_mut().unwrap() = mask;
        }
    }

    for obj_index in 0..m {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            component_order(fitness[a][obj_index], fitness[b][obj_index], objective, obj_index)
        });

        // at_least_as_good[i] = bitset of individuals whose value in this
        // objective is <= (for minimize) / >= (for maximize) individual i's.
        for (rank, &i) in order.iter().enumerate() {
            let mut at_least_as_good = vec![0u64; words];
            for &j in &order[..=rank] {
                at_least_as_good[j / 64] |= 1 << (j % 64);
            }
            for w in 0..words {
                candidate_sets[i][w] &= at_least_as_good[w];
            }
        }
    }

    let mut dominated_by = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for w in 0..words {
            let mut bits = candidate_sets[i][w];
            while bits != 0 {
                let b = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                let j = w * 64 + b;
                if j != i && objective.dominates(fitness[j], fitness[i]) {
                    dominated_by[i] += 1;
                    dominates[j].push(i);
                }
            }
        }
    }

    peel_fronts(n, dominated_by, dominates)
}

fn component_order(a: f64, b: f64, objective: &Objective, obj_index: usize) -> Ordering {
    use crate::objective::Optimize;
    let dir = match objective {
        Objective::Single(opt) => *opt,
        Objective::Multi(opts) => opts[obj_index],
    };
    match dir {
        Optimize::Minimize => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        Optimize::Maximize => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// §4.K.2 Rank-Ordinal (RO): replace each objective's raw values with their
/// ordinal rank (0 = best), then a pairwise scan: `j` is dominated by `i`
/// when every one of `i`'s ordinal ranks is no worse than `j`'s and at least
/// one is strictly better — the same test as real dominance, but robust to
/// scale since it only ever compares ranks.
fn rank_ordinal(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let m = objective.len();

    let mut ordinal = vec![vec![0usize; m]; n];
    for obj_index in 0..m {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            component_order(fitness[a][obj_index], fitness[b][obj_index], objective, obj_index)
        });
        for (rank, &i) in order.iter().enumerate() {
            ordinal[i][obj_index] = rank;
        }
    }

    let mut dominated_by = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let mut i_no_worse_everywhere = true;
            let mut i_strictly_better_somewhere = false;
            for k in 0..m {
                if ordinal[i][k] > ordinal[j][k] {
                    i_no_worse_everywhere = false;
                    break;
                }
                if ordinal[i][k] < ordinal[j][k] {
                    i_strictly_better_somewhere = true;
                }
            }
            if i_no_worse_everywhere && i_strictly_better_somewhere {
                dominated_by[j] += 1;
                dominates[i].push(j);
            }
        }
    }

    peel_fronts(n, dominated_by, dominates)
}

/// §4.K.3 Merge-sort based (MNDS): per-objective stable sort, then an
/// incremental bitset build — individuals earlier in an objective's sorted
/// order are OR'd into every later individual's dominator-candidate set as
/// the scan proceeds, rather than materialized all at once like RS.
fn merge_sort_based(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let words = n.div_ceil(64);
    let m = objective.len();

    let mut candidate_sets: Vec<Vec<u64>> = vec![vec![u64::MAX; words]; n];
    if n % 64 != 0 {
        let mask = (1u64 << (n % 64)) - 1;
        for set in candidate_sets.iter_mut() {
            *set.last_mut().unwrap() = mask;
        }
    }

    for obj_index in 0..m {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            component_order(fitness[a][obj_index], fitness[b][obj_index], objective, obj_index)
        });

        let mut seen = vec![0u64; words];
        for &i in &order {
            seen[i / 64] |= 1 << (i % 64);
            for w in 0..words {
                candidate_sets[i][w] &= seen[w];
            }
        }
    }

    let mut dominated_by = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for w in 0..words {
            let mut bits = candidate_sets[i][w];
            while bits != 0 {
                let b = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                let j = w * 64 + b;
                if j != i && objective.dominates(fitness[j], fitness[i]) {
                    dominated_by[i] += 1;
                    dominates[j].push(i);
                }
            }
        }
    }

    peel_fronts(n, dominated_by, dominates)
}

/// §4.K.4 Best-Order Sort (BOS): per-objective sorted orders are consumed in
/// round-robin so individuals with a good rank in *any* objective are
/// considered first; each is placed in the first existing front whose
/// current members don't dominate it, else a new front is opened. Assumes no
/// duplicates, as the caller (`SorterKind::sort`) guarantees.
fn best_order(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let m = objective.len();

    let per_objective_order: Vec<Vec<usize>> = (0..m)
        .map(|obj_index| {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                component_order(fitness[a][obj_index], fitness[b][obj_index], objective, obj_index)
            });
            order
        })
        .collect();

    let mut visited = vec![false; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let mut cursors = vec![0usize; m];
    let mut remaining = n;
    while remaining > 0 {
        for obj_index in 0..m {
            while cursors[obj_index] < n && visited[per_objective_order[obj_index][cursors[obj_index]]] {
                cursors[obj_index] += 1;
            }
            if cursors[obj_index] >= n {
                continue;
            }
            let candidate = per_objective_order[obj_index][cursors[obj_index]];
            if visited[candidate] {
                continue;
            }
            visited[candidate] = true;
            remaining -= 1;

            let mut placed = false;
            for front in fronts.iter_mut() {
                if front.iter().any(|&member| objective.dominates(fitness[member], fitness[candidate])) {
                    continue;
                }
                front.push(candidate);
                placed = true;
                break;
            }
            if !placed {
                fronts.push(vec![candidate]);
            }
        }
    }

    fronts
}

/// §4.K.5 Deductive: repeatedly scans the still-unsorted set; an individual
/// joins the current front only if nothing else remaining dominates it.
/// "Word-packed bitsets" track which individuals are still unsorted.
fn deductive(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let mut unsorted: Vec<usize> = (0..n).collect();
    let mut fronts = Vec::new();

    while !unsorted.is_empty() {
        let mut front = Vec::new();
        let mut dominated_flags = vec![false; unsorted.len()];

        for (a_pos, &a) in unsorted.iter().enumerate() {
            if dominated_flags[a_pos] {
                continue;
            }
            for (b_pos, &b) in unsorted.iter().enumerate() {
                if a_pos == b_pos || dominated_flags[a_pos] {
                    continue;
                }
                if objective.dominates(fitness[b], fitness[a]) {
                    dominated_flags[a_pos] = true;
                }
            }
        }

        for (pos, &i) in unsorted.iter().enumerate() {
            if !dominated_flags[pos] {
                front.push(i);
            }
        }

        unsorted.retain(|i| !front.contains(i));
        fronts.push(front);
    }

    fronts
}

/// §4.K.6 Hierarchical: a queue-based sweep. Each round drains the queue,
/// keeping items not dominated by anything already accepted into the
/// current front and deferring dominated items to the next round's queue.
fn hierarchical(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let mut queue: std::collections::VecDeque<usize> = (0..n).collect();
    let mut fronts = Vec::new();

    while !queue.is_empty() {
        let mut front: Vec<usize> = Vec::new();
        let mut deferred: std::collections::VecDeque<usize> = std::collections::VecDeque::new();

        while let Some(candidate) = queue.pop_front() {
            if front.iter().any(|&member| objective.dominates(fitness[member], fitness[candidate])) {
                deferred.push_back(candidate);
            } else {
                front.retain(|&member| !objective.dominates(fitness[candidate], fitness[member]));
                front.push(candidate);
            }
        }

        fronts.push(front);
        queue = deferred;
    }

    fronts
}

/// §4.K.7a Efficient Sequential (ENS-SS): individuals are processed in
/// lexicographic order; each is placed in the first existing front whose
/// members don't dominate it (a linear scan over the fronts in order).
fn efficient_sequential(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    ens_insert(fitness, objective, false)
}

/// §4.K.7b Efficient Binary (ENS-BS): same insertion rule as ENS-SS, but the
/// search for the first non-dominating front is a binary search rather than
/// a linear scan. Correct because individuals arrive in lexicographic order:
/// once a front fails to dominate a new individual, no later (weaker) front
/// dominates it either, so "is this front safe" is monotone in front index.
fn efficient_binary(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    ens_insert(fitness, objective, true)
}

fn ens_insert(fitness: &[FitnessSlice], objective: &Objective, binary: bool) -> Vec<Vec<usize>> {
    let order = lexicographic_order_slices(fitness, objective);
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    for i in order {
        let dominated_by_front = |front: &Vec<usize>| {
            front.iter().any(|&member| objective.dominates(fitness[member], fitness[i]))
        };

        let target = if binary {
            let mut lo = 0usize;
            let mut hi = fronts.len();
            while lo < hi {
                let mid = lo + (hi - lo) / 2;
                if dominated_by_front(&fronts[mid]) {
                    lo = mid + 1;
                } else {
                    hi = mid;
                }
            }
            lo
        } else {
            fronts.iter().position(|front| !dominated_by_front(front)).unwrap_or(fronts.len())
        };

        if target == fronts.len() {
            fronts.push(vec![i]);
        } else {
            fronts[target].push(i);
        }
    }

    fronts
}

fn lexicographic_order_slices(fitness: &[FitnessSlice], objective: &Objective) -> Vec<usize> {
    let mut order: Vec<usize> = (0..fitness.len()).collect();
    order.sort_by(|&a, &b| objective.cmp(fitness[a], fitness[b]));
    order
}

/// §4.K.8 Dominance-Degree (DDS): `d[i,j]` counts how many objectives `i` is
/// at-least-as-good-as `j` in; `i` dominates `j` iff `d[i,j] == M` (as good
/// everywhere) and `d[j,i] < M` (not reciprocally as good everywhere, i.e.
/// strictly better in at least one).
fn dominance_degree(fitness: &[FitnessSlice], objective: &Objective) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let m = objective.len();

    let mut degree = vec![vec![0usize; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                degree[i][j] = m;
                continue;
            }
            let mut count = 0;
            for k in 0..m {
                if !worse_component(fitness[i][k], fitness[j][k], objective, k) {
                    count += 1;
                }
            }
            degree[i][j] = count;
        }
    }

    let mut dominated_by = vec![0usize; n];
    let mut dominates: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if i != j && degree[i][j] == m && degree[j][i] < m {
                dominated_by[j] += 1;
                dominates[i].push(j);
            }
        }
    }

    peel_fronts(n, dominated_by, dominates)
}

/// Whether `i`'s value in objective `k` is strictly worse than `j`'s.
fn worse_component(i: f64, j: f64, objective: &Objective, k: usize) -> bool {
    use crate::objective::Optimize;
    let dir = match objective {
        Objective::Single(opt) => *opt,
        Objective::Multi(opts) => opts[k],
    };
    match dir {
        Optimize::Minimize => i > j,
        Optimize::Maximize => i < j,
    }
}

/// Crowding distance per §4.K: sort each front by each objective, boundary
/// points get `+inf`, interior points accumulate the normalized neighbor
/// span.
pub fn crowding_distance(fitness: &[FitnessSlice]) -> Vec<f64> {
    let n = fitness.len();
    if n == 0 {
        return Vec::new();
    }
    let m = fitness[0].len();
    let mut distance = vec![0.0f64; n];
    if m == 0 || n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let mut order: Vec<usize> = (0..n).collect();
    for dim in 0..m {
        order.sort_by(|&a, &b| fitness[a][dim].partial_cmp(&fitness[b][dim]).unwrap_or(Ordering::Equal));

        let min = fitness[order[0]][dim];
        let max = fitness[order[n - 1]][dim];
        let range = max - min;

        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;

        if !range.is_finite() || range == 0.0 {
            continue;
        }

        for k in 1..n - 1 {
            let prev = fitness[order[k - 1]][dim];
            let next = fitness[order[k + 1]][dim];
            distance[order[k]] += (next - prev).abs() / range;
        }
    }

    distance
}

/// A Pareto archive (§3, §4.K): `insert` rejects anything dominated by or
/// ε-equal to an existing member and prunes existing members the new point
/// dominates.
pub struct ParetoArchive {
    members: Vec<(Vec<f64>, usize)>,
    objective: Objective,
    eps: f64,
}

impl ParetoArchive {
    pub fn new(objective: Objective, eps: f64) -> Self {
        ParetoArchive { members: Vec::new(), objective, eps }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[(Vec<f64>, usize)] {
        &self.members
    }

    /// Attempts to insert `(fitness, payload_index)`. Returns `true` if
    /// accepted.
    pub fn insert(&mut self, fitness: Vec<f64>, payload_index: usize) -> bool {
        for (existing, _) in &self.members {
            if self.objective.eps_equal(existing, &fitness, self.eps) {
                return false;
            }
            if self.objective.dominates(existing, &fitness) {
                return false;
            }
        }

        self.members.retain(|(existing, _)| !self.objective.dominates(&fitness, existing));
        self.members.push((fitness, payload_index));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Optimize;

    /// The toy dataset from §8 scenario 5.
    fn toy_points() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 7.0],
            vec![1.0, 5.0],
            vec![2.0, 3.0],
            vec![4.0, 2.0],
            vec![7.0, 1.0],
            vec![10.0, 0.0],
            vec![2.0, 6.0],
            vec![4.0, 4.0],
            vec![10.0, 2.0],
            vec![6.0, 6.0],
            vec![9.0, 5.0],
        ]
    }

    fn as_set(front: &[usize]) -> std::collections::BTreeSet<usize> {
        front.iter().copied().collect()
    }

    #[test]
    fn all_eight_sorters_agree_on_the_toy_front_partition() {
        let points = toy_points();
        let objective = Objective::Multi(vec![Optimize::Minimize, Optimize::Minimize]);

        let expected: Vec<std::collections::BTreeSet<usize>> = vec![
            [0, 1, 2, 3, 4, 5].into_iter().collect(),
            [6, 7, 8].into_iter().collect(),
            [9, 10].into_iter().collect(),
        ];

        for kind in [
            SorterKind::RankIntersect,
            SorterKind::RankOrdinal,
            SorterKind::MergeSort,
            SorterKind::BestOrder,
            SorterKind::Deductive,
            SorterKind::Hierarchical,
            SorterKind::EfficientSequential,
            SorterKind::EfficientBinary,
            SorterKind::DominanceDegree,
        ] {
            let fronts = kind.sort(&points, &objective, 1e-9);
            let got: Vec<_> = fronts.iter().map(|f| as_set(f)).collect();
            assert_eq!(got, expected, "{kind:?} disagreed");
        }
    }

    #[test]
    fn all_duplicate_population_collapses_to_one_front() {
        let points = vec![vec![1.0, 1.0]; 5];
        let objective = Objective::Multi(vec![Optimize::Minimize, Optimize::Minimize]);
        for kind in [SorterKind::RankIntersect, SorterKind::Deductive, SorterKind::DominanceDegree] {
            let fronts = kind.sort(&points, &objective, 1e-9);
            assert_eq!(fronts.len(), 1);
            assert_eq!(fronts[0].len(), 5);
        }
    }

    #[test]
    fn crowding_distance_gives_boundaries_infinite_distance() {
        let points = toy_points();
        let front: Vec<FitnessSlice> = [0usize, 1, 2, 3, 4, 5].iter().map(|&i| points[i].as_slice()).collect();
        let dist = crowding_distance(&front);
        assert!(dist.iter().filter(|d| d.is_infinite()).count() >= 2);
    }

    #[test]
    fn archive_rejects_dominated_and_prunes_dominated_members() {
        let mut archive = ParetoArchive::new(Objective::Multi(vec![Optimize::Minimize, Optimize::Minimize]), 1e-9);
        assert!(archive.insert(vec![2.0, 2.0], 0));
        assert!(!archive.insert(vec![3.0, 3.0], 1));
        assert!(archive.insert(vec![1.0, 1.0], 2));
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.members()[0].1, 2);
    }
}
