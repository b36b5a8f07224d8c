//! The non-mutating coefficient-optimizer wrapper (§4.E): applies either
//! solver to a tree's own coefficients and returns a new tree plus a run
//! summary, leaving the caller's tree untouched.

use crate::cost_function::CostFunction;
use crate::levenberg_marquardt;
use crate::sgd::{self, OptimizeSummary};
use crate::update_rule::UpdateRule;
use symreg_core::{DataRange, Dataset, DispatchTable, Tree};
use symreg_error::SymregResult;

/// Which solver the wrapper should drive.
pub enum Solver<'a> {
    LevenbergMarquardt { max_iterations: usize },
    Sgd { rule: &'a mut dyn UpdateRule, max_epochs: usize },
}

/// Optimizes `tree`'s coefficients against `(dataset, range, target)` and
/// returns a cloned, updated tree plus the run summary. When `iterations`
/// (the solver's iteration/epoch budget) is zero, this is a no-op that
/// returns the tree unchanged and a summary reporting no work done — the
/// `iterations > 0` guard named in §4.E.
pub fn optimize(
    dispatch: &DispatchTable,
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    target: &[f64],
    solver: Solver,
) -> SymregResult<(Tree, OptimizeSummary)> {
    let budget_is_zero = match &solver {
        Solver::LevenbergMarquardt { max_iterations } => *max_iterations == 0,
        Solver::Sgd { max_epochs, .. } => *max_epochs == 0,
    };

    let original = tree.coefficients();

    if budget_is_zero {
        let cost = CostFunction::new(dispatch, tree, dataset, range, target)?;
        let flat_cost = cost.cost(&original)?;
        let summary = OptimizeSummary {
            initial_cost: flat_cost,
            final_cost: flat_cost,
            iterations: 0,
            function_evaluations: 0,
            jacobian_evaluations: 0,
            success: false,
        };
        return Ok((tree.clone(), summary));
    }

    let cost = CostFunction::new(dispatch, tree, dataset, range, target)?;
    let (updated_params, summary) = match solver {
        Solver::LevenbergMarquardt { max_iterations } => {
            levenberg_marquardt::optimize(&cost, &original, max_iterations)?
        }
        Solver::Sgd { rule, max_epochs } => sgd::optimize(&cost, &original, rule, max_epochs)?,
    };

    let mut updated = tree.clone();
    updated.set_coefficients(&updated_params)?;
    Ok((updated, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update_rule::Adam;
    use symreg_core::Node;

    fn fixture() -> (DispatchTable, Tree, Dataset, Vec<f64>) {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let tree = Tree::from_postfix(vec![Node::variable(x_hash, 0.1)]).unwrap();
        let dispatch = DispatchTable::new();
        let target = vec![3.0, 6.0, 9.0, 12.0];
        (dispatch, tree, dataset, target)
    }

    #[test]
    fn zero_budget_leaves_coefficients_untouched() {
        let (dispatch, tree, dataset, target) = fixture();
        let range = dataset.full_range();
        let (updated, summary) = optimize(
            &dispatch,
            &tree,
            &dataset,
            range,
            &target,
            Solver::LevenbergMarquardt { max_iterations: 0 },
        )
        .unwrap();
        assert_eq!(updated.coefficients(), tree.coefficients());
        assert_eq!(summary.iterations, 0);
        assert!(!summary.success);
    }

    #[test]
    fn lm_solver_updates_a_cloned_tree_without_mutating_the_original() {
        let (dispatch, tree, dataset, target) = fixture();
        let range = dataset.full_range();
        let original_coeffs = tree.coefficients();
        let (updated, summary) = optimize(
            &dispatch,
            &tree,
            &dataset,
            range,
            &target,
            Solver::LevenbergMarquardt { max_iterations: 50 },
        )
        .unwrap();
        assert!(summary.success);
        assert_eq!(tree.coefficients(), original_coeffs);
        assert!((updated.coefficients()[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn sgd_solver_updates_a_cloned_tree() {
        let (dispatch, tree, dataset, target) = fixture();
        let range = dataset.full_range();
        let mut rule = Adam::new(1, 0.1, 1e-8, 0.9, 0.999, false);
        let (updated, summary) = optimize(
            &dispatch,
            &tree,
            &dataset,
            range,
            &target,
            Solver::Sgd { rule: &mut rule, max_epochs: 2000 },
        )
        .unwrap();
        assert!(summary.success);
        assert!((updated.coefficients()[0] - 3.0).abs() < 1e-2);
    }
}
