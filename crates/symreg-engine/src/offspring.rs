//! The offspring generator (§4.J): selection + crossover + mutation + local
//! search + transposition cache, combined into one child per call.
//!
//! Follows a "select, alter, evaluate" shape, extended with the
//! local-search/Lamarckian step and the transposition-cache lookup §4.J
//! calls for.

use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use symreg_core::domain::random_provider;
use symreg_core::{DataRange, Dataset, DispatchTable, PrimitiveSet, Tree};
use symreg_error::SymregResult;
use symreg_ops::{MultiMutation, subtree_crossover};
use symreg_optimize::{Solver, optimize_coefficients};

use crate::evaluator::{Evaluator, clamp_non_finite};
use crate::individual::Individual;
use crate::objective::Objective;
use crate::selection::{Compare, Selector};
use crate::transposition::{TranspositionCache, ZobristTable};

/// The immutable, cheaply-`Clone`able (every field is an `Arc` or a `Copy`
/// scalar) environment every offspring-generator variant needs. Built once
/// by the driver before the generational loop starts and captured by value
/// into each worker closure (§5: "no global mutable state escapes a phase").
#[derive(Clone)]
pub struct OffspringEnv {
    pub primitives: Arc<PrimitiveSet>,
    pub dispatch: Arc<DispatchTable>,
    pub dataset: Arc<Dataset>,
    pub range: DataRange,
    pub target: Arc<Vec<f64>>,
    pub mutation: Arc<MultiMutation>,
    pub max_length: usize,
    pub max_depth: u16,
    pub internal_probability: f32,
    pub crossover_probability: f32,
    pub mutation_probability: f32,
    pub local_search_probability: f32,
    pub lamarckian_probability: f32,
    pub local_search_iterations: usize,
    pub transposition: Arc<TranspositionCache>,
    pub zobrist: Arc<ZobristTable>,
    pub use_transposition_cache: bool,
    pub evaluator: Arc<dyn Evaluator>,
    pub objective: Arc<Objective>,
}

/// Step 2-3 of §4.J: crossover with probability `pC` (else clone parent A),
/// then mutate with probability `pM`.
fn crossover_and_mutate(env: &OffspringEnv, parent_a: &Tree, parent_b: &Tree) -> SymregResult<Tree> {
    let mut child = if random_provider::bool(env.crossover_probability) {
        subtree_crossover(parent_a, parent_b, env.internal_probability, env.max_length, env.max_depth)?
    } else {
        parent_a.clone()
    };

    if random_provider::bool(env.mutation_probability) {
        child = env.mutation.mutate(&child, &env.primitives)?;
    }

    Ok(child)
}

/// Step 4 of §4.J: with probability `pLocal` run coefficient optimization;
/// keep the refined coefficients with probability `pLamarck`, else restore
/// the tree as it was before local search.
fn maybe_local_search(env: &OffspringEnv, tree: Tree) -> SymregResult<Tree> {
    if env.local_search_iterations == 0 || !random_provider::bool(env.local_search_probability) {
        return Ok(tree);
    }

    let (optimized, summary) = optimize_coefficients(
        &env.dispatch,
        &tree,
        &env.dataset,
        env.range,
        &env.target,
        Solver::LevenbergMarquardt { max_iterations: env.local_search_iterations },
    )?;

    if summary.success && random_provider::bool(env.lamarckian_probability) {
        Ok(optimized)
    } else {
        Ok(tree)
    }
}

fn evaluate_fresh(env: &OffspringEnv, tree: &Tree) -> Vec<f64> {
    match env.evaluator.evaluate(tree) {
        Ok(fitness) => fitness.into_iter().map(clamp_non_finite).collect(),
        Err(_) => vec![crate::evaluator::ERR_MAX; env.evaluator.num_objectives()],
    }
}

/// Step 5-6 of §4.J: evaluate (clamping non-finite fitness), fingerprint the
/// child, and consult the transposition cache. Per the Open Questions
/// disposition (§9), both the hit and the miss path call `insert_or_update`.
fn evaluate_and_cache(env: &OffspringEnv, tree: Tree) -> Individual {
    let fitness = if env.use_transposition_cache {
        let fingerprint = env.zobrist.fingerprint(&tree);
        if let Some(cached) = env.transposition.get(fingerprint) {
            env.transposition.insert_or_update(fingerprint, &cached);
            cached
        } else {
            let computed = evaluate_fresh(env, &tree);
            env.transposition.insert_or_update(fingerprint, &computed);
            computed
        }
    } else {
        evaluate_fresh(env, &tree)
    };

    Individual::with_fitness(tree, fitness)
}

/// Runs the full per-child pipeline: crossover/mutation, optional local
/// search, evaluation, transposition-cache bookkeeping.
fn generate_child(env: &OffspringEnv, parent_a: &Tree, parent_b: &Tree) -> SymregResult<Individual> {
    let child = crossover_and_mutate(env, parent_a, parent_b)?;
    let child = maybe_local_search(env, child)?;
    Ok(evaluate_and_cache(env, child))
}

fn prefer(objective: &Objective, a: Individual, b: Individual) -> Individual {
    if objective.cmp(&a.fitness, &b.fitness) == Ordering::Less { a } else { b }
}

/// Produces one offspring from a population given a pair of selectors and a
/// comparison callback (§4.J). Implementors are the four variants in §4.J:
/// Basic, Brood, Polygenic, OffspringSelection.
pub trait OffspringGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(
        &self,
        env: &OffspringEnv,
        population: &[Individual],
        compare: &dyn Compare,
        female: &dyn Selector,
        male: &dyn Selector,
    ) -> SymregResult<Individual>;
}

/// Selects one parent pair, applies crossover/mutation/local-search once,
/// and returns the resulting child (§4.J "Basic").
pub struct BasicGenerator;

impl BasicGenerator {
    pub fn new() -> Self {
        BasicGenerator
    }
}

impl Default for BasicGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OffspringGenerator for BasicGenerator {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn generate(
        &self,
        env: &OffspringEnv,
        population: &[Individual],
        compare: &dyn Compare,
        female: &dyn Selector,
        male: &dyn Selector,
    ) -> SymregResult<Individual> {
        let a = female.select(population.len(), compare, 1)[0];
        let b = male.select(population.len(), compare, 1)[0];
        generate_child(env, &population[a].genotype, &population[b].genotype)
    }
}

/// Selects one parent pair, then produces `k` children from that same pair
/// and returns the best by `objective` (§4.J "Brood(k)").
pub struct BroodGenerator {
    pub k: usize,
}

impl BroodGenerator {
    pub fn new(k: usize) -> Self {
        BroodGenerator { k: k.max(1) }
    }
}

impl OffspringGenerator for BroodGenerator {
    fn name(&self) -> &'static str {
        "brood"
    }

    fn generate(
        &self,
        env: &OffspringEnv,
        population: &[Individual],
        compare: &dyn Compare,
        female: &dyn Selector,
        male: &dyn Selector,
    ) -> SymregResult<Individual> {
        let a = female.select(population.len(), compare, 1)[0];
        let b = male.select(population.len(), compare, 1)[0];

        let mut best: Option<Individual> = None;
        for _ in 0..self.k {
            let child = generate_child(env, &population[a].genotype, &population[b].genotype)?;
            best = Some(match best {
                None => child,
                Some(current) => prefer(&env.objective, child, current),
            });
        }
        Ok(best.expect("k is at least 1"))
    }
}

/// Re-samples parents independently for each of `k` attempts and returns the
/// best child (§4.J "Polygenic(k)").
pub struct PolygenicGenerator {
    pub k: usize,
}

impl PolygenicGenerator {
    pub fn new(k: usize) -> Self {
        PolygenicGenerator { k: k.max(1) }
    }
}

impl OffspringGenerator for PolygenicGenerator {
    fn name(&self) -> &'static str {
        "polygenic"
    }

    fn generate(
        &self,
        env: &OffspringEnv,
        population: &[Individual],
        compare: &dyn Compare,
        female: &dyn Selector,
        male: &dyn Selector,
    ) -> SymregResult<Individual> {
        let mut best: Option<Individual> = None;
        for _ in 0..self.k {
            let a = female.select(population.len(), compare, 1)[0];
            let b = male.select(population.len(), compare, 1)[0];
            let child = generate_child(env, &population[a].genotype, &population[b].genotype)?;
            best = Some(match best {
                None => child,
                Some(current) => prefer(&env.objective, child, current),
            });
        }
        Ok(best.expect("k is at least 1"))
    }
}

/// Accepts a child only if it is not dominated by a threshold "challenger"
/// derived from the two parents' fitness (§4.J "OffspringSelection"):
/// `challenger[i] = max(f1[i], f2[i]) - comparisonFactor * |f1[i] - f2[i]|`
/// per objective, for minimization. Tracks `selectionPressure = new_evals /
/// pop_size`; [`Self::pressure_exceeded`] lets the driver stop a generation
/// once that ratio crosses `maxSelectionPressure`, matching the termination
/// signal named in §4.J.
pub struct OffspringSelectionGenerator {
    pub comparison_factor: f32,
    pub max_selection_pressure: f32,
    pop_size: usize,
    evals: AtomicU64,
}

impl OffspringSelectionGenerator {
    pub fn new(pop_size: usize, comparison_factor: f32, max_selection_pressure: f32) -> Self {
        OffspringSelectionGenerator {
            comparison_factor,
            max_selection_pressure,
            pop_size: pop_size.max(1),
            evals: AtomicU64::new(0),
        }
    }

    pub fn selection_pressure(&self) -> f32 {
        self.evals.load(AtomicOrdering::Relaxed) as f32 / self.pop_size as f32
    }

    pub fn pressure_exceeded(&self) -> bool {
        self.selection_pressure() > self.max_selection_pressure
    }

    pub fn reset(&self) {
        self.evals.store(0, AtomicOrdering::Relaxed);
    }
}

impl OffspringGenerator for OffspringSelectionGenerator {
    fn name(&self) -> &'static str {
        "offspring_selection"
    }

    fn generate(
        &self,
        env: &OffspringEnv,
        population: &[Individual],
        compare: &dyn Compare,
        female: &dyn Selector,
        male: &dyn Selector,
    ) -> SymregResult<Individual> {
        loop {
            let a = female.select(population.len(), compare, 1)[0];
            let b = male.select(population.len(), compare, 1)[0];
            let child = generate_child(env, &population[a].genotype, &population[b].genotype)?;
            self.evals.fetch_add(1, AtomicOrdering::Relaxed);

            let challenger: Vec<f64> = population[a]
                .fitness
                .iter()
                .zip(&population[b].fitness)
                .map(|(&f1, &f2)| f1.max(f2) - self.comparison_factor as f64 * (f1 - f2).abs())
                .collect();

            if !env.objective.dominates(&challenger, &child.fitness) || self.pressure_exceeded() {
                return Ok(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::LengthEvaluator;
    use crate::objective::Optimize;
    use crate::selection::{RandomSelector, SingleObjectiveCompare};
    use symreg_core::{Dataset, DispatchTable, Node, NodeKind, PrimitiveSet};

    fn env_fixture() -> OffspringEnv {
        let dataset = Arc::new(Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap());
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        OffspringEnv {
            primitives: Arc::new(PrimitiveSet::new(vec![x_hash]).unwrap()),
            dispatch: Arc::new(DispatchTable::new()),
            range: dataset.full_range(),
            dataset,
            target: Arc::new(vec![1.0, 2.0, 3.0, 4.0]),
            mutation: Arc::new(MultiMutation::new(30, 8)),
            max_length: 30,
            max_depth: 8,
            internal_probability: 0.8,
            crossover_probability: 0.9,
            mutation_probability: 0.1,
            local_search_probability: 0.0,
            lamarckian_probability: 1.0,
            local_search_iterations: 0,
            transposition: Arc::new(TranspositionCache::new(1024)),
            zobrist: Arc::new(ZobristTable::new(1234)),
            use_transposition_cache: true,
            evaluator: Arc::new(LengthEvaluator::new(30)),
            objective: Arc::new(Objective::Single(Optimize::Minimize)),
        }
    }

    fn population_fixture(env: &OffspringEnv) -> Vec<Individual> {
        let x_hash = env.primitives.variable_hashes()[0];
        (0..6)
            .map(|i| {
                let tree = Tree::from_postfix(vec![
                    Node::variable(x_hash, 1.0),
                    Node::constant(i as f64),
                    Node::function(NodeKind::Add, 2),
                ])
                .unwrap();
                let fitness = env.evaluator.evaluate(&tree).unwrap();
                let mut individual = Individual::new(tree, 1);
                individual.fitness = fitness;
                individual
            })
            .collect()
    }

    #[test]
    fn basic_generator_produces_a_valid_child() {
        let env = env_fixture();
        let population = population_fixture(&env);
        let fitness: Vec<Vec<f64>> = population.iter().map(|i| i.fitness.clone()).collect();
        let compare = SingleObjectiveCompare { fitness: &fitness, index: 0, lower_is_better: true };
        let selector = RandomSelector::new();
        let generator = BasicGenerator::new();

        let child = generator.generate(&env, &population, &compare, &selector, &selector).unwrap();
        assert_eq!(child.fitness.len(), 1);
    }

    #[test]
    fn brood_generator_returns_the_best_of_k() {
        let env = env_fixture();
        let population = population_fixture(&env);
        let fitness: Vec<Vec<f64>> = population.iter().map(|i| i.fitness.clone()).collect();
        let compare = SingleObjectiveCompare { fitness: &fitness, index: 0, lower_is_better: true };
        let selector = RandomSelector::new();
        let generator = BroodGenerator::new(5);

        let child = generator.generate(&env, &population, &compare, &selector, &selector).unwrap();
        assert!(child.fitness[0].is_finite());
    }

    #[test]
    fn transposition_cache_hit_matches_the_original_fitness() {
        let env = env_fixture();
        let x_hash = env.primitives.variable_hashes()[0];
        let tree = Tree::from_postfix(vec![
            Node::variable(x_hash, 1.0),
            Node::constant(2.0),
            Node::function(NodeKind::Add, 2),
        ])
        .unwrap();

        let first = evaluate_and_cache(&env, tree.clone());
        let second = evaluate_and_cache(&env, tree);
        assert_eq!(first.fitness, second.fitness);
        let fingerprint = env.zobrist.fingerprint(&first.genotype);
        assert_eq!(env.transposition.hit_count(fingerprint), 1);
    }

    #[test]
    fn offspring_selection_rejects_a_dominated_challenger_then_terminates_on_pressure() {
        let env = env_fixture();
        let population = population_fixture(&env);
        let fitness: Vec<Vec<f64>> = population.iter().map(|i| i.fitness.clone()).collect();
        let compare = SingleObjectiveCompare { fitness: &fitness, index: 0, lower_is_better: true };
        let selector = RandomSelector::new();
        // A tiny max_selection_pressure forces termination quickly even if
        // every attempt is rejected by the challenger test.
        let generator = OffspringSelectionGenerator::new(population.len(), 0.0, 0.1);

        let child = generator.generate(&env, &population, &compare, &selector, &selector).unwrap();
        assert!(child.fitness[0].is_finite());
        assert!(generator.pressure_exceeded());
    }
}
