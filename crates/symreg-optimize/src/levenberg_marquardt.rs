//! Levenberg–Marquardt coefficient refinement (§4.E). Grounded on Operon's
//! `LMCostFunction` plus Eigen's damped Gauss-Newton loop: build the normal
//! equations `(JᵀJ + λ·diag(JᵀJ))·δ = -Jᵀr`, solve by Gaussian elimination
//! (no external linear-algebra crate is pulled in for this), and adapt `λ`
//! based on whether the step reduced the cost.

use crate::cost_function::CostFunction;
use crate::sgd::OptimizeSummary;
use symreg_error::SymregResult;

const INITIAL_LAMBDA: f64 = 1e-3;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const COST_TOLERANCE: f64 = 1e-12;

/// Solves the symmetric positive (semi-)definite system `a·x = b` in place
/// via Gauss-Jordan elimination with partial pivoting. `a` is `n x n`
/// row-major; returns `false` (leaving `x` unusable) if `a` is singular to
/// working precision.
fn solve_normal_equations(a: &mut [f64], n: usize, b: &mut [f64]) -> bool {
    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = a[col * n + col].abs();
        for row in (col + 1)..n {
            let v = a[row * n + col].abs();
            if v > pivot_val {
                pivot_val = v;
                pivot_row = row;
            }
        }
        if pivot_val < 1e-300 {
            return false;
        }
        if pivot_row != col {
            for k in 0..n {
                a.swap(col * n + k, pivot_row * n + k);
            }
            b.swap(col, pivot_row);
        }

        let pivot = a[col * n + col];
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    for i in 0..n {
        b[i] /= a[i * n + i];
    }
    true
}

/// Refines `params` against `cost` with up to `max_iterations` damped
/// Gauss-Newton steps. Reports `initial_cost`, `final_cost`, iteration and
/// evaluation counts, and `success = final_cost < initial_cost` (§4.E); on
/// failure the caller should keep the original parameters.
pub fn optimize(
    cost: &CostFunction,
    params: &[f64],
    max_iterations: usize,
) -> SymregResult<(Vec<f64>, OptimizeSummary)> {
    let np = cost.num_parameters();
    let num_obs = cost.num_observations();

    let mut x = params.to_vec();
    let mut residual = vec![0.0; num_obs];
    let mut jacobian = vec![0.0; num_obs * np];

    let mut function_evaluations = 0usize;
    let mut jacobian_evaluations = 0usize;

    cost.residuals(&x, &mut residual)?;
    function_evaluations += 1;
    let initial_cost = 0.5 * residual.iter().map(|r| r * r).sum::<f64>();

    if np == 0 {
        let summary = OptimizeSummary {
            initial_cost,
            final_cost: initial_cost,
            iterations: 0,
            function_evaluations,
            jacobian_evaluations,
            success: false,
        };
        return Ok((x, summary));
    }

    let mut lambda = INITIAL_LAMBDA;
    let mut current_cost = initial_cost;
    let mut iterations = 0usize;

    for _ in 0..max_iterations {
        iterations += 1;

        cost.jacobian(&x, &mut jacobian)?;
        jacobian_evaluations += 1;

        let mut jtj = vec![0.0; np * np];
        let mut jtr = vec![0.0; np];
        for a in 0..np {
            for row in 0..num_obs {
                jtr[a] += jacobian[row * np + a] * residual[row];
            }
            for b in 0..np {
                let mut acc = 0.0;
                for row in 0..num_obs {
                    acc += jacobian[row * np + a] * jacobian[row * np + b];
                }
                jtj[a * np + b] = acc;
            }
        }

        let mut damped = jtj.clone();
        for d in 0..np {
            damped[d * np + d] += lambda * jtj[d * np + d].max(1e-12);
        }
        let mut rhs: Vec<f64> = jtr.iter().map(|v| -v).collect();

        if !solve_normal_equations(&mut damped, np, &mut rhs) {
            lambda *= LAMBDA_UP;
            continue;
        }

        let candidate: Vec<f64> = x.iter().zip(&rhs).map(|(xi, di)| xi + di).collect();
        let mut candidate_residual = vec![0.0; num_obs];
        cost.residuals(&candidate, &mut candidate_residual)?;
        function_evaluations += 1;
        let candidate_cost = 0.5 * candidate_residual.iter().map(|r| r * r).sum::<f64>();

        if candidate_cost.is_finite() && candidate_cost < current_cost {
            let prev_cost = current_cost;
            x = candidate;
            residual = candidate_residual;
            current_cost = candidate_cost;
            lambda *= LAMBDA_DOWN;

            if (prev_cost - current_cost).abs() < COST_TOLERANCE * prev_cost.max(1.0) {
                break;
            }
        } else {
            lambda *= LAMBDA_UP;
        }

        if !lambda.is_finite() || lambda > 1e16 {
            break;
        }
    }

    let success = current_cost.is_finite() && current_cost < initial_cost;
    let summary = OptimizeSummary {
        initial_cost,
        final_cost: current_cost,
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
    use symreg_core::{DataRange, DispatchTable, Dataset, Node, NodeKind, Tree};

    #[test]
    fn refines_a_linear_coefficient_to_the_least_squares_optimum() {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0])]).unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let tree = Tree::from_postfix(vec![Node::variable(x_hash, 0.1)]).unwrap();
        let dispatch = DispatchTable::new();
        let target = vec![2.0, 4.0, 6.0, 8.0, 10.0];
        let range = dataset.full_range();
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let (params, summary) = optimize(&cost, &[0.1], 50).unwrap();
        assert!(summary.success);
        assert!((params[0] - 2.0).abs() < 1e-6, "got {}", params[0]);
    }

    #[test]
    fn converges_on_a_nonlinear_power_tree() {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0, 3.0, 4.0])]).unwrap();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        // scale * x^exponent
        let mut pow_node = Node::function(NodeKind::Pow, 2);
        pow_node.value = 1.5;
        let tree = Tree::from_postfix(vec![
            Node::variable(x_hash, 1.0),
            Node::constant(2.0),
            pow_node,
        ])
        .unwrap();

        let dispatch = DispatchTable::new();
        let target: Vec<f64> = [1.0, 2.0, 3.0, 4.0].iter().map(|x: &f64| 3.0 * x * x).collect();
        let range = DataRange::full(4);
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let (_, summary) = optimize(&cost, &tree.coefficients(), 100).unwrap();
        assert!(summary.final_cost <= summary.initial_cost);
    }

    #[test]
    fn zero_coefficient_tree_reports_failure_without_panicking() {
        let dataset = Dataset::new(vec![("x".to_string(), vec![1.0, 2.0])]).unwrap();
        let tree = Tree::from_postfix(vec![Node::constant(5.0)]).unwrap();
        let dispatch = DispatchTable::new();
        let target = vec![5.0, 5.0];
        let range = dataset.full_range();
        let cost = CostFunction::new(&dispatch, &tree, &dataset, range, &target).unwrap();

        let (params, summary) = optimize(&cost, &[], 10).unwrap();
        assert!(params.is_empty());
        assert!(!summary.success);
    }
}
