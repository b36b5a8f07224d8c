//! The evaluator family (§4.F): turns a tree into a fitness vector.
//!
//! A `Send + Sync` trait object the driver holds behind an `Arc`; each
//! variant owns the counters it needs rather than sharing one
//! executor-level counter — per §9's redesign note, counters live as
//! `Arc<AtomicU64>` fields on the evaluator handle itself so they can be
//! cloned into worker closures without an interior-mutability hack on a
//! conceptually-const object.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use symreg_core::{
    DataRange, Dataset, DispatchTable, ErrorMetric, HashMode, Tree, evaluate_to_vec, fisher_information,
    gaussian_nll, metrics, ops::NodeKind, random_provider,
};
use symreg_error::{SymregError, SymregResult};

/// Sentinel fitness value substituted for any non-finite score (§4.F).
pub const ERR_MAX: f64 = 1.0e12;

#[inline]
pub(crate) fn clamp_non_finite(v: f64) -> f64 {
    if v.is_finite() { v } else { ERR_MAX }
}

/// The four atomic counters every evaluator exposes (§4.F, §5): a global
/// call count plus residual/jacobian evaluation counts and accumulated cost
/// function wall time, all incrementable from any worker thread without a
/// lock.
#[derive(Clone, Default)]
pub struct EvaluatorCounters {
    call_count: Arc<AtomicU64>,
    residual_evaluations: Arc<AtomicU64>,
    jacobian_evaluations: Arc<AtomicU64>,
    cost_function_time_nanos: Arc<AtomicU64>,
}

impl EvaluatorCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_residuals(&self, n: u64) {
        self.residual_evaluations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_jacobians(&self, n: u64) {
        self.jacobian_evaluations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_time(&self, elapsed: Duration) {
        self.cost_function_time_nanos.fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn residual_evaluations(&self) -> u64 {
        self.residual_evaluations.load(Ordering::Relaxed)
    }

    pub fn jacobian_evaluations(&self) -> u64 {
        self.jacobian_evaluations.load(Ordering::Relaxed)
    }

    pub fn cost_function_time(&self) -> Duration {
        Duration::from_nanos(self.cost_function_time_nanos.load(Ordering::Relaxed))
    }
}

/// A shared, checkable evaluation budget (§4.F, §5). `record` is called by
/// evaluators after each evaluation; `budget_exhausted` is the predicate
/// drivers poll before generating further offspring.
#[derive(Clone)]
pub struct EvaluationBudget {
    limit: u64,
    used: Arc<AtomicU64>,
}

impl EvaluationBudget {
    pub fn new(limit: u64) -> Self {
        EvaluationBudget { limit, used: Arc::new(AtomicU64::new(0)) }
    }

    pub fn unbounded() -> Self {
        Self::new(u64::MAX)
    }

    pub fn record(&self, n: u64) {
        self.used.fetch_add(n, Ordering::Relaxed);
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Relaxed)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.used() >= self.limit
    }
}

/// `evaluator(rng, individual, scratch_buffer) → Vec<Scalar>` (§4.F).
/// Implementors must be cheap to share across worker threads — every
/// variant below is `Send + Sync` and holds only `Arc`-backed state.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>>;
    fn num_objectives(&self) -> usize;
    fn counters(&self) -> &EvaluatorCounters;
}

/// Ordinary least-squares (or likelihood, with optional affine output
/// scaling) single-objective evaluator.
pub struct LeastSquaresEvaluator {
    dispatch: Arc<DispatchTable>,
    dataset: Arc<Dataset>,
    range: DataRange,
    target: Vec<f64>,
    metric: ErrorMetric,
    linear_scaling: bool,
    counters: EvaluatorCounters,
    budget: Option<EvaluationBudget>,
}

impl LeastSquaresEvaluator {
    pub fn new(
        dispatch: Arc<DispatchTable>,
        dataset: Arc<Dataset>,
        range: DataRange,
        target: Vec<f64>,
        metric: ErrorMetric,
        linear_scaling: bool,
    ) -> Self {
        LeastSquaresEvaluator {
            dispatch,
            dataset,
            range,
            target,
            metric,
            linear_scaling,
            counters: EvaluatorCounters::new(),
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: EvaluationBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Least-squares affine fit `y ≈ a + b*x`; returns `(a, b)`.
    fn affine_fit(predicted: &[f64], target: &[f64]) -> (f64, f64) {
        let n = predicted.len() as f64;
        let mean_x = predicted.iter().sum::<f64>() / n;
        let mean_y = target.iter().sum::<f64>() / n;
        let mut cov = 0.0;
        let mut var_x = 0.0;
        for (&x, &y) in predicted.iter().zip(target) {
            cov += (x - mean_x) * (y - mean_y);
            var_x += (x - mean_x) * (x - mean_x);
        }
        if var_x <= 0.0 {
            return (mean_y, 0.0);
        }
        let b = cov / var_x;
        let a = mean_y - b * mean_x;
        (a, b)
    }
}

impl Evaluator for LeastSquaresEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        if let Some(budget) = &self.budget {
            if budget.budget_exhausted() {
                return Err(SymregError::BudgetExhausted);
            }
        }

        self.counters.record_call();
        let start = Instant::now();

        let mut predicted = evaluate_to_vec(&self.dispatch, tree, &self.dataset, self.range, &[])?;
        self.counters.record_residuals(predicted.len() as u64);
        if let Some(budget) = &self.budget {
            budget.record(predicted.len() as u64);
        }

        if self.linear_scaling {
            let (a, b) = Self::affine_fit(&predicted, &self.target);
            for p in predicted.iter_mut() {
                *p = a + b * *p;
            }
        }

        let score = self.metric.score(&predicted, &self.target).unwrap_or(ERR_MAX);
        self.counters.record_time(start.elapsed());
        Ok(vec![clamp_non_finite(score)])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// `length / max_length` (§4.F) — a parsimony pressure objective with no
/// dependency on the dataset.
pub struct LengthEvaluator {
    max_length: u32,
    counters: EvaluatorCounters,
}

impl LengthEvaluator {
    pub fn new(max_length: u32) -> Self {
        LengthEvaluator { max_length: max_length.max(1), counters: EvaluatorCounters::new() }
    }
}

impl Evaluator for LengthEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        Ok(vec![tree.len() as f64 / self.max_length as f64])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// Visitation length (§4.F): the number of node visits a full tree
/// evaluation performs. Since this crate's trees are flat postfix arrays
/// with no subexpression sharing, that's exactly the node count — distinct
/// from [`LengthEvaluator`] only in that it is not normalized.
pub struct ShapeEvaluator {
    counters: EvaluatorCounters,
}

impl ShapeEvaluator {
    pub fn new() -> Self {
        ShapeEvaluator { counters: EvaluatorCounters::new() }
    }
}

impl Default for ShapeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for ShapeEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        Ok(vec![tree.len() as f64])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

fn jaccard_distance(a: &[u64], b: &[u64]) -> f64 {
    // Both inputs are sorted; a linear two-pointer merge counts the
    // intersection without building a hash set.
    let mut i = 0;
    let mut j = 0;
    let mut intersection = 0usize;
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal => {
                intersection += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        1.0 - intersection as f64 / union as f64
    }
}

/// Negated average Jaccard distance against a random sample of the current
/// population (§4.F): a diversity-seeking objective. The driver refreshes
/// the comparison population each generation via [`Self::refresh_population`]
/// before offspring are evaluated.
pub struct DiversityEvaluator {
    population_hashes: Mutex<Vec<Vec<u64>>>,
    sample_size: usize,
    counters: EvaluatorCounters,
}

impl DiversityEvaluator {
    pub fn new(sample_size: usize) -> Self {
        DiversityEvaluator {
            population_hashes: Mutex::new(Vec::new()),
            sample_size: sample_size.max(1),
            counters: EvaluatorCounters::new(),
        }
    }

    /// Replaces the comparison population with a freshly hashed snapshot.
    pub fn refresh_population(&self, trees: &[Tree]) {
        let mut snapshot: Vec<Vec<u64>> = trees
            .iter()
            .map(|t| {
                let mut t = t.clone();
                t.hash(HashMode::Relaxed);
                let mut hashes: Vec<u64> = t.nodes().iter().map(|n| n.calculated_hash_value).collect();
                hashes.sort_unstable();
                hashes
            })
            .collect();
        snapshot.shrink_to_fit();
        *self.population_hashes.lock().unwrap() = snapshot;
    }
}

impl Evaluator for DiversityEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();

        let mut clone = tree.clone();
        clone.hash(HashMode::Relaxed);
        let mut own_hashes: Vec<u64> = clone.nodes().iter().map(|n| n.calculated_hash_value).collect();
        own_hashes.sort_unstable();

        let population = self.population_hashes.lock().unwrap();
        if population.is_empty() {
            return Ok(vec![0.0]);
        }

        let sample_size = self.sample_size.min(population.len());
        let indices = random_provider::sample_indices(0..population.len(), sample_size);
        let avg_distance: f64 = indices.iter().map(|&i| jaccard_distance(&own_hashes, &population[i])).sum::<f64>()
            / sample_size as f64;

        Ok(vec![-avg_distance])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// How [`AggregateEvaluator`] reduces its wrapped evaluator's output vector
/// to a single scalar (§4.F).
#[derive(Debug, Clone, Copy)]
pub enum Reduction {
    Min,
    Max,
    Median,
    Mean,
    HarmonicMean,
    Sum,
}

impl Reduction {
    pub fn reduce(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Reduction::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Reduction::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Reduction::Sum => values.iter().sum(),
            Reduction::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reduction::HarmonicMean => {
                let denom: f64 = values.iter().map(|v| 1.0 / v).sum();
                values.len() as f64 / denom
            }
            Reduction::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 { (sorted[mid - 1] + sorted[mid]) / 2.0 } else { sorted[mid] }
            }
        }
    }
}

/// Wraps another evaluator, reducing its (possibly multi-element) output to
/// one scalar via `reduction` (§4.F).
pub struct AggregateEvaluator {
    inner: Box<dyn Evaluator>,
    reduction: Reduction,
    counters: EvaluatorCounters,
}

impl AggregateEvaluator {
    pub fn new(inner: Box<dyn Evaluator>, reduction: Reduction) -> Self {
        AggregateEvaluator { inner, reduction, counters: EvaluatorCounters::new() }
    }
}

impl Evaluator for AggregateEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        let values = self.inner.evaluate(tree)?;
        Ok(vec![clamp_non_finite(self.reduction.reduce(&values))])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// Concatenates the outputs of several sub-evaluators into one fitness
/// vector, for multi-objective runs (§4.F).
pub struct MultiEvaluator {
    sub_evaluators: Vec<Box<dyn Evaluator>>,
    counters: EvaluatorCounters,
}

impl MultiEvaluator {
    pub fn new(sub_evaluators: Vec<Box<dyn Evaluator>>) -> Self {
        MultiEvaluator { sub_evaluators, counters: EvaluatorCounters::new() }
    }
}

impl Evaluator for MultiEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        let mut combined = Vec::with_capacity(self.sub_evaluators.len());
        for sub in &self.sub_evaluators {
            combined.extend(sub.evaluate(tree)?);
        }
        Ok(combined)
    }

    fn num_objectives(&self) -> usize {
        self.sub_evaluators.iter().map(|e| e.num_objectives()).sum()
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// Shared machinery for the three information-criterion evaluators: a tree
/// evaluation, its residual sum of squares, and (for MDL) a jacobian.
struct InformationCriterionContext {
    n: f64,
    mse: f64,
}

fn evaluate_against_target(
    dispatch: &DispatchTable,
    dataset: &Dataset,
    range: DataRange,
    target: &[f64],
    tree: &Tree,
) -> SymregResult<(Vec<f64>, InformationCriterionContext)> {
    let predicted = evaluate_to_vec(dispatch, tree, dataset, range, &[])?;
    let mse = metrics::mse(&predicted, target)?;
    Ok((predicted, InformationCriterionContext { n: predicted.len() as f64, mse: mse.max(1e-300) }))
}

/// `n·log(MSE) + p·log(n)` (§4.F).
pub struct BayesianInformationCriterionEvaluator {
    dispatch: Arc<DispatchTable>,
    dataset: Arc<Dataset>,
    range: DataRange,
    target: Vec<f64>,
    counters: EvaluatorCounters,
}

impl BayesianInformationCriterionEvaluator {
    pub fn new(dispatch: Arc<DispatchTable>, dataset: Arc<Dataset>, range: DataRange, target: Vec<f64>) -> Self {
        BayesianInformationCriterionEvaluator { dispatch, dataset, range, target, counters: EvaluatorCounters::new() }
    }
}

impl Evaluator for BayesianInformationCriterionEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        let (_, ctx) = evaluate_against_target(&self.dispatch, &self.dataset, self.range, &self.target, tree)?;
        let p = tree.num_coefficients() as f64;
        let score = ctx.n * ctx.mse.ln() + p * ctx.n.ln();
        Ok(vec![clamp_non_finite(score)])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// `n/2 · (log 2π + log(MSE) + 1)` (§4.F).
pub struct AkaikeInformationCriterionEvaluator {
    dispatch: Arc<DispatchTable>,
    dataset: Arc<Dataset>,
    range: DataRange,
    target: Vec<f64>,
    counters: EvaluatorCounters,
}

impl AkaikeInformationCriterionEvaluator {
    pub fn new(dispatch: Arc<DispatchTable>, dataset: Arc<Dataset>, range: DataRange, target: Vec<f64>) -> Self {
        AkaikeInformationCriterionEvaluator { dispatch, dataset, range, target, counters: EvaluatorCounters::new() }
    }
}

impl Evaluator for AkaikeInformationCriterionEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();
        let (_, ctx) = evaluate_against_target(&self.dispatch, &self.dataset, self.range, &self.target, tree)?;
        let score = ctx.n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + ctx.mse.ln() + 1.0);
        Ok(vec![clamp_non_finite(score)])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

/// Minimum description length (§4.F): a structural codelength (unique
/// operator kinds weighted by the log of the primitive set's arity support,
/// plus the log of non-optimized constants) added to a parameter codelength
/// (`0.5·log(I_i) + log|c_i|` over the Fisher-information diagonal, minus
/// `(p/2)·log 3`) added to the Gaussian negative log-likelihood.
pub struct MinimumDescriptionLengthEvaluator {
    dispatch: Arc<DispatchTable>,
    dataset: Arc<Dataset>,
    range: DataRange,
    target: Vec<f64>,
    num_primitive_kinds: usize,
    counters: EvaluatorCounters,
}

impl MinimumDescriptionLengthEvaluator {
    pub fn new(
        dispatch: Arc<DispatchTable>,
        dataset: Arc<Dataset>,
        range: DataRange,
        target: Vec<f64>,
        num_primitive_kinds: usize,
    ) -> Self {
        MinimumDescriptionLengthEvaluator {
            dispatch,
            dataset,
            range,
            target,
            num_primitive_kinds: num_primitive_kinds.max(1),
            counters: EvaluatorCounters::new(),
        }
    }

    fn structural_codelength(&self, tree: &Tree) -> f64 {
        let mut kinds: HashSet<NodeKind> = HashSet::new();
        let mut constant_term = 0.0;
        for node in tree.nodes() {
            if !matches!(node.kind, NodeKind::Constant | NodeKind::Variable) {
                kinds.insert(node.kind);
            }
            if node.kind == NodeKind::Constant && !node.optimize {
                constant_term += node.value.abs().max(1e-12).ln();
            }
        }
        kinds.len() as f64 * (self.num_primitive_kinds as f64).log2() + constant_term
    }

    fn parameter_codelength(fisher_diag: &[f64], coefficients: &[f64]) -> f64 {
        let p = coefficients.len() as f64;
        let mut total = 0.0;
        for (&info, &c) in fisher_diag.iter().zip(coefficients) {
            total += 0.5 * info.max(1e-12).ln() + c.abs().max(1e-12).ln();
        }
        total - (p / 2.0) * 3f64.ln()
    }
}

impl Evaluator for MinimumDescriptionLengthEvaluator {
    fn evaluate(&self, tree: &Tree) -> SymregResult<Vec<f64>> {
        self.counters.record_call();

        let predicted = evaluate_to_vec(&self.dispatch, tree, &self.dataset, self.range, &[])?;
        self.counters.record_residuals(predicted.len() as u64);

        let sse = metrics::sse(&predicted, &self.target)?;
        let n = predicted.len() as f64;
        let sigma_sq = (sse / n).max(1e-12);
        let likelihood = gaussian_nll(&predicted, &self.target, sigma_sq)?;

        let coefficients = tree.coefficients();
        let p = coefficients.len();
        let fisher_diag = if p == 0 {
            Vec::new()
        } else {
            let mut jacobian = vec![0.0; self.range.size() * p];
            symreg_core::reverse_jacobian(tree, &self.dataset, self.range, &coefficients, &mut jacobian)?;
            self.counters.record_jacobians(jacobian.len() as u64);
            let fisher = fisher_information(&jacobian, self.range.size(), p, sigma_sq)?;
            (0..p).map(|i| fisher[i * p + i]).collect()
        };

        let structural = self.structural_codelength(tree);
        let parameter = Self::parameter_codelength(&fisher_diag, &coefficients);

        Ok(vec![clamp_non_finite(likelihood + structural + parameter)])
    }

    fn num_objectives(&self) -> usize {
        1
    }

    fn counters(&self) -> &EvaluatorCounters {
        &self.counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symreg_core::{DispatchTable, Node, NodeKind as NK};

    fn fixture() -> (Arc<DispatchTable>, Arc<Dataset>, DataRange, Vec<f64>, Tree) {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let tree = Tree::from_postfix(vec![Node::variable(x_hash, 2.0)]).unwrap();
        let range = dataset.full_range();
        (Arc::new(DispatchTable::new()), Arc::new(dataset), range, vec![2.0, 4.0, 6.0, 8.0], tree)
    }

    #[test]
    fn least_squares_evaluator_scores_a_perfect_fit_near_zero() {
        let (dispatch, dataset, range, target, tree) = fixture();
        let evaluator =
            LeastSquaresEvaluator::new(dispatch, dataset, range, target, ErrorMetric::Mse, false);
        let fitness = evaluator.evaluate(&tree).unwrap();
        assert!(fitness[0] < 1e-9);
        assert_eq!(evaluator.counters().call_count(), 1);
    }

    #[test]
    fn budget_exhausted_evaluator_errors_before_evaluating() {
        let (dispatch, dataset, range, target, tree) = fixture();
        let budget = EvaluationBudget::new(0);
        budget.record(10);
        let evaluator =
            LeastSquaresEvaluator::new(dispatch, dataset, range, target, ErrorMetric::Mse, false)
                .with_budget(budget);
        assert!(evaluator.evaluate(&tree).is_err());
    }

    #[test]
    fn length_evaluator_normalizes_by_max_length() {
        let evaluator = LengthEvaluator::new(10);
        let tree = Tree::from_postfix(vec![Node::constant(1.0)]).unwrap();
        let fitness = evaluator.evaluate(&tree).unwrap();
        assert_eq!(fitness[0], 1.0 / 10.0);
    }

    #[test]
    fn diversity_evaluator_is_zero_with_an_identical_population() {
        let evaluator = DiversityEvaluator::new(2);
        let tree = Tree::from_postfix(vec![Node::constant(1.0)]).unwrap();
        evaluator.refresh_population(&[tree.clone(), tree.clone(), tree.clone()]);
        let fitness = evaluator.evaluate(&tree).unwrap();
        assert!((fitness[0] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn multi_evaluator_concatenates_sub_evaluator_outputs() {
        let evaluator = MultiEvaluator::new(vec![
            Box::new(LengthEvaluator::new(10)),
            Box::new(ShapeEvaluator::new()),
        ]);
        let tree = Tree::from_postfix(vec![
            Node::constant(1.0),
            Node::constant(2.0),
            Node::function(NK::Add, 2),
        ])
        .unwrap();
        let fitness = evaluator.evaluate(&tree).unwrap();
        assert_eq!(fitness.len(), 2);
        assert_eq!(evaluator.num_objectives(), 2);
    }

    #[test]
    fn aggregate_evaluator_reduces_to_a_single_scalar() {
        let inner = Box::new(MultiEvaluator::new(vec![
            Box::new(LengthEvaluator::new(10)),
            Box::new(ShapeEvaluator::new()),
        ]));
        let evaluator = AggregateEvaluator::new(inner, Reduction::Sum);
        let tree = Tree::from_postfix(vec![Node::constant(1.0)]).unwrap();
        let fitness = evaluator.evaluate(&tree).unwrap();
        assert_eq!(fitness.len(), 1);
    }

    #[test]
    fn bic_and_aic_are_finite_for_a_reasonable_fit() {
        let (dispatch, dataset, range, target, tree) = fixture();
        let bic = BayesianInformationCriterionEvaluator::new(
            Arc::clone(&dispatch),
            Arc::clone(&dataset),
            range,
            target.clone(),
        );
        let aic = AkaikeInformationCriterionEvaluator::new(dispatch, dataset, range, target);
        assert!(bic.evaluate(&tree).unwrap()[0].is_finite());
        assert!(aic.evaluate(&tree).unwrap()[0].is_finite());
    }
}
