//! First-order gradient-descent solver driven by a pluggable
//! [`UpdateRule`] (§4.E). Grounded on Operon's `SGDSolver`: iterate the cost
//! function's gradient through the rule, step, and stop when the step's
//! infinity norm collapses or the epoch budget is spent.

use crate::cost_function::CostFunction;
use crate::update_rule::UpdateRule;
use symreg_error::SymregResult;

/// Shared with [`crate::levenberg_marquardt::LmSummary`] so the coefficient
/// optimizer wrapper (§4.E) can report either solver's outcome uniformly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizeSummary {
    pub initial_cost: f64,
    pub final_cost: f64,
    pub iterations: usize,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub success: bool,
}

const STEP_TOLERANCE: f64 = 1e-8;

/// Minimizes `cost`'s sum of squared residuals starting from `params`,
/// returning the final parameters and a run summary. `max_epochs` bounds the
/// loop; termination also happens early once `|step|∞ < 1e-8`.
pub fn optimize(
    cost: &CostFunction,
    params: &[f64],
    rule: &mut dyn UpdateRule,
    max_epochs: usize,
) -> SymregResult<(Vec<f64>, OptimizeSummary)> {
    let np = cost.num_parameters();
    let mut x = params.to_vec();
    let mut residual = vec![0.0; cost.num_observations()];
    let mut jacobian = vec![0.0; cost.num_observations() * np];
    let mut gradient = vec![0.0; np];
    let mut step = vec![0.0; np];

    let mut function_evaluations = 0usize;
    let mut jacobian_evaluations = 0usize;

    cost.residuals(&x, &mut residual)?;
    function_evaluations += 1;
    let initial_cost = 0.5 * residual.iter().map(|r| r * r).sum::<f64>();

    let mut iterations = 0usize;

    for _ in 0..max_epochs {
        iterations += 1;

        cost.residuals(&x, &mut residual)?;
        function_evaluations += 1;
        cost.jacobian(&x, &mut jacobian)?;
        jacobian_evaluations += 1;

        gradient.iter_mut().for_each(|g| *g = 0.0);
        for row in 0..cost.num_observations() {
            for col in 0..np {
                gradient[col] += jacobian[row * np + col] * residual[row];
            }
        }

        rule.update(&gradient, &mut step);

        let converged = step.iter().all(|s| s.abs() < STEP_TOLERANCE);
        if converged {
            break;
        }

        for (xi, si) in x.iter_mut().zip(&step) {
            *xi -= si;
        }
    }

    cost.residuals(&x, &mut residual)?;
    function_evaluations += 1;
    let final_cost = 0.5 * residual.iter().map(|r| r * r).sum::<f64>();

    let success = final_cost.is_finite() && (final_cost < initial_cost || !initial_cost.is_finite());

    let summary = OptimizeSummary {
        initial_cost,
        final_cost,
        iterations,
        function_evaluations,
        jacobian_evaluations,
        success,
    };

    Ok((if success { x } else { params.to_vec() }, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update_rule::Adam;
    use symreg_core::{DispatchTable, Dataset, Node, Tree};

    #[test]
    fn converges_on_a_simple_linear_fit() {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let tree = Tree::from_postfix(vec![Node::variable(x_hash, 0.1)]).unwrap();
        let dispatch = DispatchTable::new();
        let target = vec![3.0, 6.0, 9.0, 12.0];
        let range = dataset.full_range();
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let mut rule = Adam::new(1, 0.1, 1e-8, 0.9, 0.999, false);
        let (params, summary) = optimize(&cost, &[0.1], &mut rule, 2000).unwrap();

        assert!(summary.success);
        assert!((params[0] - 3.0).abs() < 1e-2, "got {}", params[0]);
        assert!(summary.final_cost < summary.initial_cost);
    }
}
