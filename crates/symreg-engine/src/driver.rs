//! Algorithm drivers (§4.L): the generational loop over steady-state GP and
//! NSGA-II, sharing one core engine and differing only in how a population is
//! ranked for selection/reinsertion.
//!
//! Each generation runs an evaluate -> select/produce offspring -> reinsert
//! -> report phase sequence, fanned out through
//! [`symreg_core::Executor::execute_batch`] as the `for_each_index`
//! parallel fan-out primitive named in §5.

use std::sync::Arc;
use std::time::{Duration, Instant};

use symreg_core::domain::random_provider;
use symreg_core::{Executor, PrimitiveSet, Tree};
use symreg_error::SymregResult;
use symreg_ops::{balanced, grow, ptc2};
use tracing::{debug, info, info_span};

use crate::config::GaConfig;
use crate::individual::Individual;
use crate::objective::{Objective, Optimize};
use crate::offspring::{OffspringEnv, OffspringGenerator};
use crate::reinsertion::Reinserter;
use crate::selection::{CrowdedCompare, Selector};
use crate::sorter::{SorterKind, crowding_distance};
use crate::transposition::ParetoArchive;

/// How a single offspring slot is retried before the driver gives up on it
/// for this generation (§4.L: "retrying within a single offspring task until
/// success or stop").
const MAX_OFFSPRING_ATTEMPTS: usize = 5;

/// The tree-shape creator a driver uses to seed its initial population
/// (§4.G), named so drivers don't depend on `symreg_ops`'s free functions
/// directly.
#[derive(Debug, Clone)]
pub enum CreatorKind {
    Grow { min_depth: u16, max_depth: u16 },
    Balanced { target_length: usize, min_depth: u16, max_depth: u16, irregularity: f32 },
    Ptc2 { target_length: usize, max_depth: u16 },
}

impl CreatorKind {
    fn create(&self, primitives: &PrimitiveSet) -> SymregResult<Tree> {
        match self {
            CreatorKind::Grow { min_depth, max_depth } => grow(primitives, *min_depth, *max_depth),
            CreatorKind::Balanced { target_length, min_depth, max_depth, irregularity } => {
                balanced(primitives, *target_length, *min_depth, *max_depth, *irregularity)
            }
            CreatorKind::Ptc2 { target_length, max_depth } => ptc2(primitives, *target_length, *max_depth),
        }
    }
}

/// One generation's summary, handed to the driver's report callback (§4.L).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationReport {
    pub generation: usize,
    pub best_fitness: Vec<f64>,
    pub population_size: usize,
    pub transposition_cache_size: usize,
    pub elapsed: Duration,
}

/// The outcome of a completed `run()` (§4.L).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunResult {
    pub best: Individual,
    pub generations_run: usize,
    pub history: Vec<GenerationReport>,
}

/// Assigns every individual in a fitness set a `(rank, distance)` pair that
/// [`CrowdedCompare`] can order by, unifying single- and multi-objective
/// comparison behind one struct (§9 Open Questions: `CrowdedCompare`
/// degenerates to plain scalar comparison when every rank is `0`).
fn scalar_rank_distance(fitness: &[Vec<f64>], optimize: Optimize) -> (Vec<usize>, Vec<f64>) {
    let rank = vec![0usize; fitness.len()];
    let sign = match optimize {
        Optimize::Minimize => -1.0,
        Optimize::Maximize => 1.0,
    };
    let distance = fitness.iter().map(|f| sign * f[0]).collect();
    (rank, distance)
}

/// Non-dominated sort plus per-front crowding distance (§4.K), flattened
/// into the same `(rank, distance)` shape `scalar_rank_distance` uses so
/// both drivers can share [`CrowdedCompare`] verbatim.
fn nsga2_rank_distance(
    fitness: &[Vec<f64>],
    objective: &Objective,
    sorter: SorterKind,
    eps: f64,
) -> (Vec<usize>, Vec<f64>, Vec<Vec<usize>>) {
    let fronts = sorter.sort(fitness, objective, eps);
    let mut rank = vec![0usize; fitness.len()];
    let mut distance = vec![0.0f64; fitness.len()];

    for (front_rank, front) in fronts.iter().enumerate() {
        let front_fitness: Vec<&[f64]> = front.iter().map(|&i| fitness[i].as_slice()).collect();
        let local_distance = crowding_distance(&front_fitness);
        for (local_index, &global_index) in front.iter().enumerate() {
            rank[global_index] = front_rank;
            distance[global_index] = local_distance[local_index];
        }
    }

    (rank, distance, fronts)
}

fn stop_requested(config: &GaConfig, generation: usize, started: Instant, env: &OffspringEnv) -> bool {
    generation >= config.generations
        || started.elapsed() > config.time_limit
        || env.evaluator.counters().call_count() >= config.evaluations
}

fn build_initial_population(
    env: &Arc<OffspringEnv>,
    creator: &CreatorKind,
    count: usize,
    executor: &Executor,
) -> Vec<Individual> {
    let jobs: Vec<_> = (0..count)
        .map(|_| {
            let env = Arc::clone(env);
            let creator = creator.clone();
            move || -> Individual {
                let tree = loop {
                    if let Ok(tree) = creator.create(&env.primitives) {
                        break tree;
                    }
                };
                let fitness = match env.evaluator.evaluate(&tree) {
                    Ok(fitness) => fitness.into_iter().map(crate::evaluator::clamp_non_finite).collect(),
                    Err(_) => vec![crate::evaluator::ERR_MAX; env.evaluator.num_objectives()],
                };
                Individual::with_fitness(tree, fitness)
            }
        })
        .collect();
    executor.execute_batch(jobs)
}

/// Produces `count` offspring in parallel, retrying each slot up to
/// [`MAX_OFFSPRING_ATTEMPTS`] times on a fallible crossover/mutation before
/// falling back to an untouched clone of the female parent (§4.L: "no
/// partial offspring is reinserted").
fn generate_offspring_batch(
    env: &Arc<OffspringEnv>,
    population: &Arc<Vec<Individual>>,
    rank: &Arc<Vec<usize>>,
    distance: &Arc<Vec<f64>>,
    generator: &Arc<dyn OffspringGenerator>,
    female: &Arc<dyn Selector>,
    male: &Arc<dyn Selector>,
    count: usize,
    executor: &Executor,
) -> Vec<Individual> {
    let jobs: Vec<_> = (0..count)
        .map(|_| {
            let env = Arc::clone(env);
            let population = Arc::clone(population);
            let rank = Arc::clone(rank);
            let distance = Arc::clone(distance);
            let generator = Arc::clone(generator);
            let female = Arc::clone(female);
            let male = Arc::clone(male);
            move || -> Individual {
                let compare = CrowdedCompare { rank: &rank, distance: &distance };
                let mut attempt = 0;
                loop {
                    match generator.generate(&env, &population, &compare, female.as_ref(), male.as_ref()) {
                        Ok(child) => return child,
                        Err(_) if attempt + 1 < MAX_OFFSPRING_ATTEMPTS => attempt += 1,
                        Err(_) => {
                            let fallback = population[random_provider::range(0..population.len())].clone();
                            return fallback;
                        }
                    }
                }
            }
        })
        .collect();
    executor.execute_batch(jobs)
}

fn best_index(fitness: &[Vec<f64>], objective: &Objective) -> usize {
    (1..fitness.len())
        .fold(0, |best, i| if objective.is_better(&fitness[i], &fitness[best]) { i } else { best })
}

/// Shared generational-loop state and mechanics for both drivers.
struct DriverCore {
    env: Arc<OffspringEnv>,
    config: GaConfig,
    creator: CreatorKind,
    generator: Arc<dyn OffspringGenerator>,
    female: Arc<dyn Selector>,
    male: Arc<dyn Selector>,
    reinserter: Box<dyn Reinserter>,
    executor: Executor,
    population: Vec<Individual>,
    generation: usize,
    started: Instant,
}

impl DriverCore {
    fn new(
        env: OffspringEnv,
        config: GaConfig,
        creator: CreatorKind,
        generator: Arc<dyn OffspringGenerator>,
        female: Arc<dyn Selector>,
        male: Arc<dyn Selector>,
        reinserter: Box<dyn Reinserter>,
    ) -> Self {
        random_provider::set_seed(config.seed);
        let executor = if config.pool_size <= 1 {
            Executor::serial()
        } else {
            Executor::worker_pool(config.pool_size)
        };

        let env = Arc::new(env);
        let population = build_initial_population(&env, &creator, config.population_size, &executor);

        info!(population_size = config.population_size, seed = config.seed, "driver initialized");

        DriverCore {
            env,
            config,
            creator,
            generator,
            female,
            male,
            reinserter,
            executor,
            population,
            generation: 0,
            started: Instant::now(),
        }
    }

    fn fitness(&self) -> Vec<Vec<f64>> {
        self.population.iter().map(|i| i.fitness.clone()).collect()
    }

    fn stopped(&self) -> bool {
        stop_requested(&self.config, self.generation, self.started, &self.env)
    }

    /// Runs one generation using `rank`/`distance` (current population) for
    /// selection and `rerank` to recompute `(rank, distance)` over the
    /// combined population+offspring buffer for reinsertion (§4.L).
    fn step(
        &mut self,
        rank: Vec<usize>,
        distance: Vec<f64>,
        rerank: impl Fn(&[Vec<f64>]) -> (Vec<usize>, Vec<f64>),
    ) -> GenerationReport {
        let step_started = Instant::now();
        let span = info_span!("generation", index = self.generation);
        let _guard = span.enter();

        let population_arc = Arc::new(std::mem::take(&mut self.population));
        let rank = Arc::new(rank);
        let distance = Arc::new(distance);

        debug!(phase = "produce", "generating offspring");
        let offspring = generate_offspring_batch(
            &self.env,
            &population_arc,
            &rank,
            &distance,
            &self.generator,
            &self.female,
            &self.male,
            self.config.pool_size,
            &self.executor,
        );

        let population = Arc::try_unwrap(population_arc).unwrap_or_else(|arc| (*arc).clone());

        debug!(phase = "reinsert", offspring_len = offspring.len(), "merging offspring into population");
        let mut combined_fitness: Vec<Vec<f64>> = population.iter().map(|i| i.fitness.clone()).collect();
        combined_fitness.extend(offspring.iter().map(|i| i.fitness.clone()));
        let (combined_rank, combined_distance) = rerank(&combined_fitness);
        let reinsert_compare = CrowdedCompare { rank: &combined_rank, distance: &combined_distance };

        let kept = self.reinserter.reinsert(population.len(), offspring.len(), &reinsert_compare);
        let population_len = population.len();
        let mut combined: Vec<Individual> = population;
        combined.extend(offspring);
        self.population = kept.into_iter().map(|i| combined[i].clone()).collect();
        debug_assert_eq!(self.population.len(), population_len);

        self.generation += 1;

        let fitness = self.fitness();
        let best = best_index(&fitness, &self.env.objective);
        let report = GenerationReport {
            generation: self.generation,
            best_fitness: fitness[best].clone(),
            population_size: self.population.len(),
            transposition_cache_size: self.env.transposition.len(),
            elapsed: step_started.elapsed(),
        };
        debug!(phase = "report", best_fitness = ?report.best_fitness, "generation complete");
        report
    }
}

/// Steady-state GP (§4.L): single-objective, plain scalar ranking, offspring
/// reinserted by whatever [`Reinserter`] the caller configures.
pub struct SteadyStateDriver {
    core: DriverCore,
    optimize: Optimize,
}

impl SteadyStateDriver {
    pub fn new(
        env: OffspringEnv,
        config: GaConfig,
        creator: CreatorKind,
        generator: Arc<dyn OffspringGenerator>,
        female: Arc<dyn Selector>,
        male: Arc<dyn Selector>,
        reinserter: Box<dyn Reinserter>,
        optimize: Optimize,
    ) -> Self {
        SteadyStateDriver { core: DriverCore::new(env, config, creator, generator, female, male, reinserter), optimize }
    }

    pub fn generation(&self) -> usize {
        self.core.generation
    }

    pub fn population(&self) -> &[Individual] {
        &self.core.population
    }

    /// Runs one generation and returns its report.
    pub fn step(&mut self) -> GenerationReport {
        let fitness = self.core.fitness();
        let (rank, distance) = scalar_rank_distance(&fitness, self.optimize);
        let optimize = self.optimize;
        self.core.step(rank, distance, move |f| scalar_rank_distance(f, optimize))
    }

    /// Runs generations until the stop predicate fires (§4.L), returning the
    /// best individual seen and a per-generation history.
    pub fn run(&mut self) -> RunResult {
        let mut history = Vec::new();
        while !self.core.stopped() {
            history.push(self.step());
        }

        let fitness = self.core.fitness();
        let best = best_index(&fitness, &self.core.env.objective);
        info!(generations = self.core.generation, "steady-state run complete");
        RunResult { best: self.core.population[best].clone(), generations_run: self.core.generation, history }
    }
}

/// NSGA-II (§4.L): re-sorts the pooled population into fronts every
/// generation, updates crowding distance, and feeds the first front into a
/// running [`ParetoArchive`].
pub struct Nsga2Driver {
    core: DriverCore,
    sorter: SorterKind,
    archive: ParetoArchive,
}

impl Nsga2Driver {
    pub fn new(
        env: OffspringEnv,
        config: GaConfig,
        creator: CreatorKind,
        generator: Arc<dyn OffspringGenerator>,
        female: Arc<dyn Selector>,
        male: Arc<dyn Selector>,
        reinserter: Box<dyn Reinserter>,
        sorter: SorterKind,
    ) -> Self {
        let objective = (*env.objective).clone();
        let eps = config.epsilon;
        let core = DriverCore::new(env, config, creator, generator, female, male, reinserter);
        Nsga2Driver { core, sorter, archive: ParetoArchive::new(objective, eps) }
    }

    pub fn generation(&self) -> usize {
        self.core.generation
    }

    pub fn population(&self) -> &[Individual] {
        &self.core.population
    }

    pub fn archive(&self) -> &ParetoArchive {
        &self.archive
    }

    fn refresh_archive(&mut self) {
        let fitness = self.core.fitness();
        let (_, _, fronts) = nsga2_rank_distance(&fitness, &self.core.env.objective, self.sorter, self.core.config.epsilon);
        if let Some(first_front) = fronts.first() {
            for &index in first_front {
                self.archive.insert(fitness[index].clone(), index);
            }
        }
    }

    pub fn step(&mut self) -> GenerationReport {
        let fitness = self.core.fitness();
        let (rank, distance, _) =
            nsga2_rank_distance(&fitness, &self.core.env.objective, self.sorter, self.core.config.epsilon);
        let sorter = self.sorter;
        let objective = Arc::clone(&self.core.env.objective);
        let eps = self.core.config.epsilon;
        let report = self.core.step(rank, distance, move |f| {
            let (rank, distance, _) = nsga2_rank_distance(f, &objective, sorter, eps);
            (rank, distance)
        });
        self.refresh_archive();
        report
    }

    pub fn run(&mut self) -> RunResult {
        let mut history = Vec::new();
        while !self.core.stopped() {
            history.push(self.step());
        }

        let fitness = self.core.fitness();
        let best = best_index(&fitness, &self.core.env.objective);
        info!(generations = self.core.generation, archive_size = self.archive.len(), "nsga-ii run complete");
        RunResult { best: self.core.population[best].clone(), generations_run: self.core.generation, history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Evaluator, LengthEvaluator, MultiEvaluator, ShapeEvaluator};
    use crate::offspring::BasicGenerator;
    use crate::reinsertion::KeepBestReinserter;
    use crate::selection::TournamentSelector;
    use crate::transposition::{TranspositionCache, ZobristTable};
    use symreg_core::{Dataset, DispatchTable};
    use symreg_ops::MultiMutation;

    fn env_fixture_with(objective: Objective, evaluator: Arc<dyn Evaluator>) -> OffspringEnv {
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
            zobrist: Arc::new(ZobristTable::new(99)),
            use_transposition_cache: true,
            evaluator,
            objective: Arc::new(objective),
        }
    }

    fn small_config() -> GaConfig {
        crate::config::GaConfigBuilder::new()
            .population_size(8)
            .pool_size(4)
            .generations(3)
            .seed(7)
            .build()
            .unwrap()
    }

    #[test]
    fn steady_state_driver_runs_to_completion_and_improves_or_holds_fitness() {
        let env = env_fixture_with(Objective::single_minimize(), Arc::new(LengthEvaluator::new(30)));
        let mut driver = SteadyStateDriver::new(
            env,
            small_config(),
            CreatorKind::Grow { min_depth: 1, max_depth: 4 },
            Arc::new(BasicGenerator::new()),
            Arc::new(TournamentSelector::new(3)),
            Arc::new(TournamentSelector::new(3)),
            Box::new(KeepBestReinserter::new()),
            Optimize::Minimize,
        );

        let initial_best = driver.population().iter().map(|i| i.fitness[0]).fold(f64::INFINITY, f64::min);
        let result = driver.run();
        assert_eq!(result.generations_run, 3);
        assert!(result.best.fitness[0] <= initial_best);
    }

    #[test]
    fn nsga2_driver_populates_a_pareto_archive() {
        let multi_evaluator: Arc<dyn Evaluator> = Arc::new(MultiEvaluator::new(vec![
            Box::new(LengthEvaluator::new(30)),
            Box::new(ShapeEvaluator::new()),
        ]));
        let env = env_fixture_with(Objective::Multi(vec![Optimize::Minimize, Optimize::Minimize]), multi_evaluator);
        let mut driver = Nsga2Driver::new(
            env,
            small_config(),
            CreatorKind::Grow { min_depth: 1, max_depth: 4 },
            Arc::new(BasicGenerator::new()),
            Arc::new(TournamentSelector::new(3)),
            Arc::new(TournamentSelector::new(3)),
            Box::new(KeepBestReinserter::new()),
            SorterKind::RankIntersect,
        );

        let result = driver.run();
        assert_eq!(result.generations_run, 3);
        assert!(!driver.archive().is_empty());
    }
}
