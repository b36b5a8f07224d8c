//! Evaluates a tree over a dataset range, batched through the dispatch
//! table (§4.C). Grounded on Operon's `GenericInterpreter::operator()`: a
//! per-node metadata pass (bind each node's effective parameter, its dataset
//! column if it's a variable, and its dispatch callable) followed by a
//! row-batch loop that writes into a reused [`Matrix`].

use crate::dataset::{DataRange, Dataset};
use crate::dispatch::DispatchTable;
use crate::matrix::{BATCH, Matrix};
use crate::node::Node;
use crate::tree::Tree;
use symreg_error::{SymregError, SymregResult};

enum Binding<'a> {
    Constant(f64),
    Variable { weight: f64, column: &'a [f64] },
    /// `scale` is `Some(param)` when the node is itself optimizable (§3:
    /// "structural coefficient for a function node") — the dispatch
    /// callable computes the raw operator result, then this binding
    /// multiplies it by `param` in place.
    Function(crate::dispatch::Callable, Option<f64>),
}

/// Evaluates `tree` over `range` of `dataset`, writing `range.size()` values
/// into `result`. `coefficients`, if non-empty, overrides the tree's own
/// `optimize = true` node values in postfix order (§4.C step 2); pass `&[]`
/// to use the tree's own coefficients unchanged.
///
/// `on_batch`, if supplied, is invoked once per row-batch with the scratch
/// matrix and the batch's starting row, mirroring the original's per-batch
/// callback hook (used by the autodiff and optimizer layers to read
/// intermediate columns without re-evaluating).
pub fn evaluate(
    dispatch: &DispatchTable,
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    coefficients: &[f64],
    result: &mut [f64],
    mut on_batch: Option<&mut dyn FnMut(&Matrix, usize)>,
) -> SymregResult<()> {
    if result.len() != range.size() {
        return Err(SymregError::invalid_argument(format!(
            "result buffer has {} slots but range covers {} rows",
            result.len(),
            range.size()
        )));
    }

    let nodes = tree.nodes();
    if nodes.is_empty() {
        return Err(SymregError::invalid_structure("tree has no nodes"));
    }

    if !coefficients.is_empty() && coefficients.len() != tree.num_coefficients() {
        return Err(SymregError::invalid_argument(format!(
            "tree has {} optimizable coefficients but {} were supplied",
            tree.num_coefficients(),
            coefficients.len()
        )));
    }

    let mut m = Matrix::new(nodes.len());
    let mut bindings: Vec<Binding> = Vec::with_capacity(nodes.len());
    let mut coeff_cursor = 0usize;

    for node in nodes {
        let param = if !coefficients.is_empty() && node.optimize {
            let v = coefficients[coeff_cursor];
            coeff_cursor += 1;
            v
        } else {
            node.value
        };

        let binding = if let Some(var_hash) = node.variable {
            let variable = dataset.get_variable(var_hash).ok_or_else(|| {
                SymregError::invalid_argument(format!("no dataset column bound to hash {var_hash}"))
            })?;
            let column = &dataset.values(variable.column)[range.start..range.end];
            Binding::Variable { weight: param, column }
        } else if node.is_constant() {
            Binding::Constant(param)
        } else {
            let scale = node.optimize.then_some(param);
            Binding::Function(dispatch.get(node.hash_value)?, scale)
        };
        bindings.push(binding);
    }

    for (i, binding) in bindings.iter().enumerate() {
        if let Binding::Constant(v) = binding {
            m.col_mut(i).fill(*v);
        }
    }

    let num_rows = range.size();
    let mut row = 0;
    while row < num_rows {
        let len = BATCH.min(num_rows - row);

        for (i, binding) in bindings.iter().enumerate() {
            match binding {
                Binding::Constant(_) => {}
                Binding::Variable { weight, column } => {
                    let col = m.col_mut(i);
                    for k in 0..len {
                        col[k] = weight * column[row + k];
                    }
                }
                Binding::Function(f, scale) => {
                    f(&mut m, nodes, i);
                    if let Some(s) = scale {
                        for v in m.col_mut(i)[..len].iter_mut() {
                            *v *= s;
                        }
                    }
                }
            }
        }

        let root = nodes.len() - 1;
        let root_col = m.col(root);
        result[row..row + len].copy_from_slice(&root_col[..len]);

        if let Some(cb) = on_batch.as_deref_mut() {
            cb(&m, row);
        }

        row += len;
    }

    Ok(())
}

/// Convenience form that allocates and returns the result vector.
pub fn evaluate_to_vec(
    dispatch: &DispatchTable,
    tree: &Tree,
    dataset: &Dataset,
    range: DataRange,
    coefficients: &[f64],
) -> SymregResult<Vec<f64>> {
    let mut result = vec![0.0; range.size()];
    evaluate(dispatch, tree, dataset, range, coefficients, &mut result, None)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::NodeKind;

    fn xy_dataset() -> Dataset {
        Dataset::new(vec![
            ("x".to_string(), vec![1.0, 2.0, 3.0]),
            ("y".to_string(), vec![2.0, 4.0, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn add_only_tree_returns_constant_sum() {
        let mut plus = Node::function(NodeKind::Add, 3);
        plus.optimize = false;
        let tree = Tree::from_postfix(vec![
            Node::constant(2.0),
            Node::constant(3.0),
            Node::constant(5.0),
            plus,
        ])
        .unwrap();

        let dataset = xy_dataset();
        let dispatch = DispatchTable::new();
        let out = evaluate_to_vec(&dispatch, &tree, &dataset, dataset.full_range(), &[]).unwrap();
        assert_eq!(out, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn variable_rescaling_matches_literal_scaling() {
        let dataset = xy_dataset();
        let x_hash = dataset.get_variable_by_name("x").unwrap().hash;

        let tree = Tree::from_postfix(vec![
            Node::constant(0.5),
            Node::variable(x_hash, 1.0),
            Node::function(NodeKind::Mul, 2),
        ])
        .unwrap();

        let dispatch = DispatchTable::new();
        let out = evaluate_to_vec(&dispatch, &tree, &dataset, dataset.full_range(), &[]).unwrap();
        assert_eq!(out, vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn single_constant_tree_repeats_value() {
        let dataset = xy_dataset();
        let tree = Tree::from_postfix(vec![Node::constant(7.0)]).unwrap();
        let dispatch = DispatchTable::new();
        let out = evaluate_to_vec(&dispatch, &tree, &dataset, dataset.full_range(), &[]).unwrap();
        assert_eq!(out, vec![7.0, 7.0, 7.0]);
    }

    #[test]
    fn empty_range_returns_empty_buffer() {
        let dataset = xy_dataset();
        let tree = Tree::from_postfix(vec![Node::constant(1.0)]).unwrap();
        let dispatch = DispatchTable::new();
        let out = evaluate_to_vec(&dispatch, &tree, &dataset, DataRange::new(0, 0), &[]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn unknown_dispatch_entry_fails() {
        let dataset = xy_dataset();
        let mut node = Node::function(NodeKind::Sin, 1);
        node.hash_value = 0xdead_beef;
        let tree = Tree::from_postfix(vec![Node::constant(1.0), node]).unwrap();
        let dispatch = DispatchTable::new();
        let err = evaluate_to_vec(&dispatch, &tree, &dataset, dataset.full_range(), &[]);
        assert!(err.is_err());
    }
}
