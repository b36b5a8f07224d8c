//! Forward-jet, forward-mode, and reverse-mode jacobians over the same
//! primitive vocabulary the interpreter dispatches on (§4.C). Grounded on
//! Operon's `derivative_calculator.hpp`: a per-node-kind closed-form partial,
//! chained either forward (accumulate a dot-product down from the
//! coefficients) or backward (accumulate an adjoint down from the root).
//!
//! Unlike the primal [`interpreter`](crate::interpreter), which batches rows
//! through the `f64`-only [`DispatchTable`](crate::dispatch::DispatchTable),
//! autodiff walks the postfix array one row at a time: the per-kind partials
//! below don't fit that table's dispatch-by-hash design, and the jacobian is
//! only ever consulted by the optimizer (§4.E) on the training range, never
//! on the hot per-generation evaluation path.

use crate::dataset::{DataRange, Dataset};
use crate::node::Node;
use crate::ops::NodeKind;
use crate::tree::Tree;
use symreg_error::{SymregError, SymregResult};

fn child_indices(nodes: &[Node], i: usize) -> Vec<usize> {
    let mut v = Vec::with_capacity(nodes[i].arity as usize);
    let mut cursor = i as isize - 1;
    let mut remaining = nodes[i].arity;
    while remaining > 0 {
        let c = cursor as usize;
        v.push(c);
        remaining -= 1;
        cursor = c as isize - 1 - nodes[c].length as isize;
    }
    v.reverse();
    v
}

/// Per-row, per-node `(raw, value)` pair: `raw` is the node's output before
/// any optimizable scale is applied, `value` is what the interpreter would
/// actually produce (§4.C). For a coefficient-bearing node `c`,
/// `d(value[c])/d(param[c]) == raw[c]` regardless of whether `param[c]` is
/// zero — the safe, division-free form of `primal[c] / param[c]`.
struct RowTrace {
    raw: Vec<f64>,
    value: Vec<f64>,
}

fn evaluate_row(
    nodes: &[Node],
    dataset: &Dataset,
    row: usize,
    coefficients: &[f64],
) -> SymregResult<RowTrace> {
    let mut raw = vec![0.0; nodes.len()];
    let mut value = vec![0.0; nodes.len()];
    let mut coeff_cursor = 0usize;

    for i in 0..nodes.len() {
        let node = &nodes[i];
        let param = if !coefficients.is_empty() && node.optimize {
            let v = coefficients[coeff_cursor];
            coeff_cursor += 1;
            v
        } else {
            node.value
        };

        if let Some(var_hash) = node.variable {
            let variable = dataset.get_variable(var_hash).ok_or_else(|| {
                SymregError::invalid_argument(format!("no dataset column bound to hash {var_hash}"))
            })?;
            let x = dataset.values(variable.column)[row];
            raw[i] = x;
            value[i] = param * x;
        } else if node.is_constant() {
            raw[i] = param;
            value[i] = param;
        } else {
            let kids = child_indices(nodes, i);
            let xs: Vec<f64> = kids.iter().map(|&k| value[k]).collect();
            let r = apply(node.kind, &xs)?;
            raw[i] = r;
            value[i] = if node.optimize { param * r } else { r };
        }
    }

    Ok(RowTrace { raw, value })
}

fn apply(kind: NodeKind, xs: &[f64]) -> SymregResult<f64> {
    use NodeKind::*;
    Ok(match kind {
        Add => xs.iter().sum(),
        Sub => xs[0] - xs[1..].iter().sum::<f64>(),
        Mul => xs.iter().product(),
        Div => xs[0] / xs[1],
        Aq => xs[0] / (1.0 + xs[1] * xs[1]).sqrt(),
        Pow => xs[0].powf(xs[1]),
        Square => xs[0] * xs[0],
        Sqrt => xs[0].sqrt(),
        SqrtAbs => xs[0].abs().sqrt(),
        Cbrt => xs[0].cbrt(),
        Abs => xs[0].abs(),
        Exp => xs[0].exp(),
        Log => xs[0].ln(),
        Log1p => xs[0].ln_1p(),
        LogAbs => xs[0].abs().ln(),
        Sin => xs[0].sin(),
        Cos => xs[0].cos(),
        Tan => xs[0].tan(),
        Asin => xs[0].asin(),
        Acos => xs[0].acos(),
        Atan => xs[0].atan(),
        Sinh => xs[0].sinh(),
        Cosh => xs[0].cosh(),
        Tanh => xs[0].tanh(),
        Fmin => xs.iter().copied().fold(f64::INFINITY, f64::min),
        Fmax => xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Constant | Variable => {
            return Err(SymregError::invalid_structure(
                "leaf kind reached the function dispatch path",
            ));
        }
    })
}

/// `d(raw_i)/d(value_j)` for each child `j` of `i`, in the same order as
/// [`child_indices`]. Returns `UnsupportedDerivative` only for node kinds
/// with no closed form registered — every kind in [`crate::ops::ALL_NODE_KINDS`]
/// has one today; this is a hook for a future primitive without one (§4.C).
fn local_partials(kind: NodeKind, xs: &[f64], raw: f64) -> SymregResult<Vec<f64>> {
    use NodeKind::*;
    Ok(match kind {
        Add => vec![1.0; xs.len()],
        Sub => xs
            .iter()
            .enumerate()
            .map(|(k, _)| if k == 0 { 1.0 } else { -1.0 })
            .collect(),
        Mul => xs
            .iter()
            .enumerate()
            .map(|(k, &x)| {
                if x != 0.0 {
                    raw / x
                } else {
                    xs.iter().enumerate().filter(|(j, _)| *j != k).map(|(_, &v)| v).product()
                }
            })
            .collect(),
        Div => vec![1.0 / xs[1], -xs[0] / (xs[1] * xs[1])],
        Aq => {
            let denom = (1.0 + xs[1] * xs[1]).sqrt();
            vec![1.0 / denom, -xs[0] * xs[1] / (denom * denom * denom)]
        }
        Pow => vec![
            xs[1] * xs[0].powf(xs[1] - 1.0),
            if xs[0] > 0.0 { raw * xs[0].ln() } else { 0.0 },
        ],
        Square => vec![2.0 * xs[0]],
        Sqrt => vec![0.5 / raw.max(f64::MIN_POSITIVE)],
        SqrtAbs => vec![xs[0].signum() * 0.5 / raw.max(f64::MIN_POSITIVE)],
        Cbrt => vec![1.0 / (3.0 * raw * raw).max(f64::MIN_POSITIVE)],
        Abs => vec![xs[0].signum()],
        Exp => vec![raw],
        Log => vec![1.0 / xs[0]],
        Log1p => vec![1.0 / (1.0 + xs[0])],
        LogAbs => vec![1.0 / xs[0]],
        Sin => vec![xs[0].cos()],
        Cos => vec![-xs[0].sin()],
        Tan => {
            let c = xs[0].cos();
            vec![1.0 / (c * c)]
        }
        Asin => vec![1.0 / (1.0 - xs[0] * xs[0]).sqrt()],
        Acos => vec![-1.0 / (1.0 - xs[0] * xs[0]).sqrt()],
        Atan => vec![1.0 / (1.0 + xs[0] * xs[0])],
        Sinh => vec![xs[0].cosh()],
        Cosh => vec![xs[0].sinh()],
        Tanh => vec![1.0 - raw * raw],
        Fmin | Fmax => {
            let target = raw;
            let mut winner = 0usize;
            for (k, &x) in xs.iter().enumerate() {
                if x == target {
                    winner = k;
                    break;
                }
            }
            (0..xs.len()).map(|k| if k == winner { 1.0 } else { 0.0 }).collect()
        }
        Constant | Variable => {
            return Err(SymregError::UnsupportedDerivative {
                node_type: kind.name().into(),
            });
        }
    })
}

/// Indices, in postfix order, of the nodes whose `value` is an optimizable
/// coefficient — the jacobian's column order.
fn coefficient_node_indices(nodes: &[Node]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.optimize)
        .map(|(i, _)| i)
        .collect()
}

/// Reverse-mode jacobian (§4.C): one adjoint sweep per row computes every
/// coefficient's column at once. `jacobian` is row-major, `range.size()`
/// rows by `tree.num_coefficients()` columns.
pub fn reverse_jacobian(
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    coefficients: &[f64],
    jacobian: &mut [f64],
) -> SymregResult<()> {
    let nodes = tree.nodes();
    let coeff_nodes = coefficient_node_indices(nodes);
    let num_coeffs = coeff_nodes.len();

    if jacobian.len() != range.size() * num_coeffs {
        return Err(SymregError::invalid_argument(format!(
            "jacobian buffer has {} slots, expected {} rows x {} coefficients",
            jacobian.len(),
            range.size(),
            num_coeffs
        )));
    }

    for (r, row) in range.iter().enumerate() {
        let trace = evaluate_row(nodes, dataset, row, coefficients)?;

        let mut adjoint = vec![0.0; nodes.len()];
        let root = nodes.len() - 1;
        adjoint[root] = 1.0;

        for i in (0..nodes.len()).rev() {
            if nodes[i].is_leaf() || adjoint[i] == 0.0 {
                continue;
            }
            let kids = child_indices(nodes, i);
            let xs: Vec<f64> = kids.iter().map(|&k| trace.value[k]).collect();
            let partials = local_partials(nodes[i].kind, &xs, trace.raw[i])?;
            let node_scale = if nodes[i].optimize {
                coefficients
                    .get(coeff_nodes.iter().position(|&c| c == i).unwrap())
                    .copied()
                    .unwrap_or(nodes[i].value)
            } else {
                1.0
            };
            for (&k, &p) in kids.iter().zip(partials.iter()) {
                adjoint[k] += adjoint[i] * node_scale * p;
            }
        }

        for (col, &c) in coeff_nodes.iter().enumerate() {
            jacobian[r * num_coeffs + col] = adjoint[c] * trace.raw[c];
        }
    }

    Ok(())
}

/// Forward-mode scalar jacobian (§4.C): one forward dot-product sweep per
/// coefficient, per row. Same results as [`reverse_jacobian`] by a different
/// traversal; the two are cross-checked in tests and by the optimizer's
/// equivalence requirement (§8).
pub fn forward_jacobian(
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    coefficients: &[f64],
    jacobian: &mut [f64],
) -> SymregResult<()> {
    let nodes = tree.nodes();
    let coeff_nodes = coefficient_node_indices(nodes);
    let num_coeffs = coeff_nodes.len();

    if jacobian.len() != range.size() * num_coeffs {
        return Err(SymregError::invalid_argument(format!(
            "jacobian buffer has {} slots, expected {} rows x {} coefficients",
            jacobian.len(),
            range.size(),
            num_coeffs
        )));
    }

    for (r, row) in range.iter().enumerate() {
        let trace = evaluate_row(nodes, dataset, row, coefficients)?;

        for (col, &c) in coeff_nodes.iter().enumerate() {
            let mut dot = vec![0.0; nodes.len()];
            dot[c] = trace.raw[c];

            for i in (c + 1)..nodes.len() {
                if nodes[i].is_leaf() {
                    continue;
                }
                let kids = child_indices(nodes, i);
                if kids.iter().all(|&k| dot[k] == 0.0) {
                    continue;
                }
                let xs: Vec<f64> = kids.iter().map(|&k| trace.value[k]).collect();
                let partials = local_partials(nodes[i].kind, &xs, trace.raw[i])?;
                let node_scale = if nodes[i].optimize {
                    coefficients
                        .get(coeff_nodes.iter().position(|&x| x == i).unwrap())
                        .copied()
                        .unwrap_or(nodes[i].value)
                } else {
                    1.0
                };
                let mut acc = 0.0;
                for (&k, &p) in kids.iter().zip(partials.iter()) {
                    acc += dot[k] * p;
                }
                dot[i] = node_scale * acc;
            }

            jacobian[r * num_coeffs + col] = dot[nodes.len() - 1];
        }
    }

    Ok(())
}

/// Forward-jet jacobian (§4.C): like [`forward_jacobian`], but every node
/// carries its *entire* gradient vector (width = number of coefficients) so
/// one forward sweep per row fills every column, rather than one sweep per
/// column. The "jet" is `(value, gradient)`, modeled here as a plain
/// `Vec<f64>` per node instead of a dedicated dual-number type, since no
/// other component needs jets outside this function.
pub fn forward_jet_jacobian(
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    coefficients: &[f64],
    jacobian: &mut [f64],
) -> SymregResult<()> {
    let nodes = tree.nodes();
    let coeff_nodes = coefficient_node_indices(nodes);
    let num_coeffs = coeff_nodes.len();

    if jacobian.len() != range.size() * num_coeffs {
        return Err(SymregError::invalid_argument(format!(
            "jacobian buffer has {} slots, expected {} rows x {} coefficients",
            jacobian.len(),
            range.size(),
            num_coeffs
        )));
    }

    if num_coeffs == 0 {
        return Ok(());
    }

    for (r, row) in range.iter().enumerate() {
        let trace = evaluate_row(nodes, dataset, row, coefficients)?;
        let mut grad = vec![vec![0.0; num_coeffs]; nodes.len()];

        for (col, &c) in coeff_nodes.iter().enumerate() {
            grad[c][col] = trace.raw[c];
        }

        for i in 0..nodes.len() {
            if nodes[i].is_leaf() {
                continue;
            }
            let kids = child_indices(nodes, i);
            let xs: Vec<f64> = kids.iter().map(|&k| trace.value[k]).collect();
            let partials = local_partials(nodes[i].kind, &xs, trace.raw[i])?;
            let node_scale = if nodes[i].optimize {
                coefficients
                    .get(coeff_nodes.iter().position(|&x| x == i).unwrap())
                    .copied()
                    .unwrap_or(nodes[i].value)
            } else {
                1.0
            };

            let mut acc = vec![0.0; num_coeffs];
            for (&k, &p) in kids.iter().zip(partials.iter()) {
                for col in 0..num_coeffs {
                    acc[col] += grad[k][col] * p;
                }
            }
            for col in 0..num_coeffs {
                grad[i][col] += node_scale * acc[col];
            }
        }

        let root = nodes.len() - 1;
        jacobian[r * num_coeffs..(r + 1) * num_coeffs].copy_from_slice(&grad[root]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

    fn xy_dataset(n: usize) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64 + 1.0).collect();
        let y: Vec<f64> = (0..n).map(|i| 2.0 * (i as f64 + 1.0) - 1.0).collect();
        Dataset::new(vec![("x".to_string(), x), ("y".to_string(), y)]).unwrap()
    }

    #[test]
    fn forward_and_reverse_agree_on_add() {
        let dataset = xy_dataset(4);
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;
        let y_hash = dataset.get_variable_by_name("y").unwrap().hash;

        let tree = Tree::from_postfix(vec![
            Node::variable(x_hash, 0.0001),
            Node::variable(y_hash, 0.0001),
            Node::function(NodeKind::Add, 2),
        ])
        .unwrap();

        let coeffs = tree.coefficients();
        let range = dataset.full_range();
        let n = range.size() * coeffs.len();
        let mut fwd = vec![0.0; n];
        let mut rev = vec![0.0; n];
        let mut jet = vec![0.0; n];

        forward_jacobian(&tree, &dataset, range, &coeffs, &mut fwd).unwrap();
        reverse_jacobian(&tree, &dataset, range, &coeffs, &mut rev).unwrap();
        forward_jet_jacobian(&tree, &dataset, range, &coeffs, &mut jet).unwrap();

        for i in 0..n {
            assert!((fwd[i] - rev[i]).abs() < 1e-9, "fwd {} vs rev {}", fwd[i], rev[i]);
            assert!((fwd[i] - jet[i]).abs() < 1e-9, "fwd {} vs jet {}", fwd[i], jet[i]);
        }
    }

    #[test]
    fn transcendental_tree_agrees_within_tolerance() {
        let dataset = xy_dataset(1);
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;

        // sin(0.5 * x) + exp(0.1 * x)
        let tree = Tree::from_postfix(vec![
            Node::variable(x_hash, 0.5),
            Node::function(NodeKind::Sin, 1),
            Node::variable(x_hash, 0.1),
            Node::function(NodeKind::Exp, 1),
            Node::function(NodeKind::Add, 2),
        ])
        .unwrap();

        let coeffs = tree.coefficients();
        let range = dataset.full_range();
        let n = range.size() * coeffs.len();
        let mut fwd = vec![0.0; n];
        let mut rev = vec![0.0; n];

        forward_jacobian(&tree, &dataset, range, &coeffs, &mut fwd).unwrap();
        reverse_jacobian(&tree, &dataset, range, &coeffs, &mut rev).unwrap();

        for i in 0..n {
            let rel = (fwd[i] - rev[i]).abs() / fwd[i].abs().max(1e-12);
            assert!(rel < 1e-4, "fwd {} vs rev {} (rel {})", fwd[i], rev[i], rel);
        }
    }

    #[test]
    fn single_node_tree_has_empty_jacobian() {
        let dataset = xy_dataset(2);
        let tree = Tree::from_postfix(vec![Node::constant(3.0)]).unwrap();
        let range = dataset.full_range();
        let mut jacobian: Vec<f64> = vec![];
        reverse_jacobian(&tree, &dataset, range, &[], &mut jacobian).unwrap();
        assert!(jacobian.is_empty());
    }
}
