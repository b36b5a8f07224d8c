//! Wraps an interpreter + autodiff pair as a residual/jacobian functor over a
//! fixed `(tree, dataset, range, target)` (§4.E). Grounded on Operon's
//! `nnls/cost_function.hpp`: parameters flow in, residuals and an optional
//! jacobian flow out, with no mutation of the wrapped tree.

use symreg_core::{DataRange, Dataset, DispatchTable, Tree, evaluate, reverse_jacobian};
use symreg_error::{SymregError, SymregResult};

/// A nonlinear least-squares cost function over a tree's optimizable
/// coefficients: `residuals(p) = predicted(p) - target`.
pub struct CostFunction<'a> {
    dispatch: &'a DispatchTable,
    tree: &'a Tree,
    dataset: &'a Dataset,
    range: DataRange,
    target: &'a [f64],
}

impl<'a> CostFunction<'a> {
    pub fn new(
        dispatch: &'a DispatchTable,
        tree: &'a Tree,
        dataset: &'a Dataset,
        range: DataRange,
        target: &'a [f64],
    ) -> SymregResult<Self> {
        if target.len() != range.size() {
            return Err(SymregError::invalid_argument(format!(
                "target has {} values but range covers {} rows",
                target.len(),
                range.size()
            )));
        }
        Ok(CostFunction { dispatch, tree, dataset, range, target })
    }

    pub fn num_parameters(&self) -> usize {
        self.tree.num_coefficients()
    }

    pub fn num_observations(&self) -> usize {
        self.range.size()
    }

    /// `predicted(params) - target`, row-major, one entry per observation.
    pub fn residuals(&self, params: &[f64], out: &mut [f64]) -> SymregResult<()> {
        evaluate(self.dispatch, self.tree, self.dataset, self.range, params, out, None)?;
        for (r, t) in out.iter_mut().zip(self.target) {
            *r -= t;
        }
        Ok(())
    }

    /// Jacobian of the residuals with respect to `params`, row-major
    /// (`num_observations` x `num_parameters`). Residuals are an affine shift
    /// of the predictions, so this is exactly the prediction jacobian.
    pub fn jacobian(&self, params: &[f64], out: &mut [f64]) -> SymregResult<()> {
        reverse_jacobian(self.tree, self.dataset, self.range, params, out)
    }

    /// Computes both in one call, as the solver loop wants them together.
    pub fn eval(
        &self,
        params: &[f64],
        out_residual: &mut [f64],
        out_jacobian: Option<&mut [f64]>,
    ) -> SymregResult<()> {
        self.residuals(params, out_residual)?;
        if let Some(jac) = out_jacobian {
            self.jacobian(params, jac)?;
        }
        Ok(())
    }

    /// Half the sum of squared residuals, the quantity both solvers minimize.
    pub fn cost(&self, params: &[f64]) -> SymregResult<f64> {
        let mut residual = vec![0.0; self.num_observations()];
        self.residuals(params, &mut residual)?;
        Ok(0.5 * residual.iter().map(|r| r * r).sum::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symreg_core::{Node, NodeKind};

    fn linear_fixture() -> (DispatchTable, Tree, Dataset) {
        let dataset = Dataset::new(vec![
            ("x".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
        ])
        .unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let tree = Tree::from_postfix(vec![Node::variable(x_hash, 0.1)]).unwrap();
        (DispatchTable::new(), tree, dataset)
    }

    #[test]
    fn residuals_are_zero_at_the_true_coefficient() {
        let (dispatch, tree, dataset) = linear_fixture();
        let target = vec![3.0, 6.0, 9.0, 12.0];
        let range = dataset.full_range();
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let mut residual = vec![0.0; 4];
        cost.residuals(&[3.0], &mut residual).unwrap();
        for r in residual {
            assert!(r.abs() < 1e-12);
        }
    }

    #[test]
    fn jacobian_matches_the_variable_column() {
        let (dispatch, tree, dataset) = linear_fixture();
        let target = vec![0.0, 0.0, 0.0, 0.0];
        let range = dataset.full_range();
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let mut jacobian = vec![0.0; 4];
        cost.jacobian(&[1.0], &mut jacobian).unwrap();
        assert_eq!(jacobian, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rejects_mismatched_target_length() {
        let (dispatch, tree, dataset) = linear_fixture();
        let range = dataset.full_range();
        assert!(CostFunction::new(&dispatch, &tree, &dataset, range, &[0.0, 0.0]).is_err());
    }
}
