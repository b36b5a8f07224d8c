//! Maps a node's seed hash to a batched operator callable (§3, §4.B).
//!
//! Grounded on Operon's `DispatchTable`: a hash-keyed map of per-type
//! callables, built once and shared read-only across workers. This crate
//! targets a single scalar type (`f64`) rather than Operon's type-tuple-per-
//! hash design — the dispatch key space and n-ary reduction strategy carry
//! over unchanged, but registering a second scalar type would mean a second
//! parallel table rather than a second tuple slot (documented in
//! DESIGN.md). Autodiff (§4.C) reuses these same `NodeKind` buckets with its
//! own dual-number callables instead of indexing into this table.

use crate::matrix::Matrix;
use crate::node::Node;
use crate::ops::NodeKind;
use symreg_error::{SymregError, SymregResult};
use std::collections::HashMap;

pub type Callable = fn(&mut Matrix, &[Node], usize);

/// Yields the `arity` immediate children of node `i`, right-to-left, reading
/// only the `length`/`arity` fields already cached on each [`Node`]. Mirrors
/// [`crate::tree::Tree::children`] but works from a bare slice, since the
/// dispatch callables only ever see `&[Node]`, never a whole [`Tree`](crate::tree::Tree).
fn children(nodes: &[Node], i: usize) -> impl Iterator<Item = usize> + '_ {
    let mut cursor = i as isize - 1;
    let mut remaining = nodes[i].arity;
    std::iter::from_fn(move || {
        if remaining == 0 || cursor < 0 {
            return None;
        }
        let c = cursor as usize;
        remaining -= 1;
        cursor = c as isize - 1 - nodes[c].length as isize;
        Some(c)
    })
}

/// Children left-to-right (source operand order), for binary/n-ary ops where
/// operand order matters (`sub`, `div`, `pow`).
fn children_ltr(nodes: &[Node], i: usize) -> Vec<usize> {
    let mut v: Vec<usize> = children(nodes, i).collect();
    v.reverse();
    v
}

fn unary_op(m: &mut Matrix, i: usize, f: impl Fn(f64) -> f64) {
    let (out, src) = m.split_at_col(i, i - 1);
    for (o, s) in out.iter_mut().zip(src.iter()) {
        *o = f(*s);
    }
}

fn binary_op(m: &mut Matrix, a: usize, b: usize, out: usize, f: impl Fn(f64, f64) -> f64) {
    let (o, x) = m.split_at_col(out, a);
    let y = m.col(b).to_vec();
    for i in 0..o.len() {
        o[i] = f(x[i], y[i]);
    }
}

/// Combines `source`'s column into `target`'s in place: `target[i] = f(target[i], source[i])`.
/// Used by [`nary_op`], where the running accumulator already lives in the
/// parent's own column, so `binary_op`'s target/source split (which requires
/// two distinct columns) doesn't apply.
fn fold_into(m: &mut Matrix, target: usize, source: usize, f: impl Fn(f64, f64) -> f64) {
    let src = m.col(source).to_vec();
    let dst = m.col_mut(target);
    for i in 0..dst.len() {
        dst[i] = f(dst[i], src[i]);
    }
}

/// Reduces an n-ary node's children with `f`, seeding the accumulator from
/// the first child and folding the rest in, left-to-right (§4.B: "reduce in
/// groups of four to minimize temporaries" — here a plain fold, since the
/// four-wide grouping in the original is an Eigen-expression-template
/// optimization with no equivalent need in a hand-rolled loop).
fn nary_op(m: &mut Matrix, nodes: &[Node], i: usize, f: impl Fn(f64, f64) -> f64) {
    let kids = children_ltr(nodes, i);
    debug_assert!(kids.len() >= 2);
    let first = kids[0];
    {
        let src = m.col(first).to_vec();
        m.col_mut(i).copy_from_slice(&src);
    }
    for &k in &kids[1..] {
        fold_into(m, i, k, &f);
    }
}

fn aq(x: f64, y: f64) -> f64 {
    x / (1.0 + y * y).sqrt()
}

pub struct DispatchTable {
    callables: HashMap<u64, Callable>,
}

impl DispatchTable {
    /// Registers every [`NodeKind`] except `Constant`/`Variable` (which the
    /// interpreter pre-binds directly, §4.C step 2, and never dispatches).
    pub fn new() -> Self {
        let mut callables: HashMap<u64, Callable> = HashMap::new();

        macro_rules! register {
            ($kind:expr, $f:expr) => {
                callables.insert($kind.seed_hash(), $f);
            };
        }

        register!(NodeKind::Add, (|m: &mut Matrix, n: &[Node], i: usize| {
            nary_op(m, n, i, |a, b| a + b)
        }) as Callable);
        register!(NodeKind::Sub, (|m: &mut Matrix, n: &[Node], i: usize| {
            nary_op(m, n, i, |a, b| a - b)
        }) as Callable);
        register!(NodeKind::Mul, (|m: &mut Matrix, n: &[Node], i: usize| {
            nary_op(m, n, i, |a, b| a * b)
        }) as Callable);
        register!(NodeKind::Fmin, (|m: &mut Matrix, n: &[Node], i: usize| {
            nary_op(m, n, i, f64::min)
        }) as Callable);
        register!(NodeKind::Fmax, (|m: &mut Matrix, n: &[Node], i: usize| {
            nary_op(m, n, i, f64::max)
        }) as Callable);

        register!(NodeKind::Div, (|m: &mut Matrix, n: &[Node], i: usize| {
            let kids = children_ltr(n, i);
            binary_op(m, kids[0], kids[1], i, |a, b| a / b)
        }) as Callable);
        register!(NodeKind::Aq, (|m: &mut Matrix, n: &[Node], i: usize| {
            let kids = children_ltr(n, i);
            binary_op(m, kids[0], kids[1], i, aq)
        }) as Callable);
        register!(NodeKind::Pow, (|m: &mut Matrix, n: &[Node], i: usize| {
            let kids = children_ltr(n, i);
            binary_op(m, kids[0], kids[1], i, f64::powf)
        }) as Callable);

        register!(NodeKind::Square, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, |x| x * x)
        }) as Callable);
        register!(NodeKind::Sqrt, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::sqrt)
        }) as Callable);
        register!(NodeKind::SqrtAbs, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, |x| x.abs().sqrt())
        }) as Callable);
        register!(NodeKind::Cbrt, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::cbrt)
        }) as Callable);
        register!(NodeKind::Abs, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::abs)
        }) as Callable);
        register!(NodeKind::Exp, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::exp)
        }) as Callable);
        register!(NodeKind::Log, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::ln)
        }) as Callable);
        register!(NodeKind::Log1p, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::ln_1p)
        }) as Callable);
        register!(NodeKind::LogAbs, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, |x| x.abs().ln())
        }) as Callable);
        register!(NodeKind::Sin, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::sin)
        }) as Callable);
        register!(NodeKind::Cos, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::cos)
        }) as Callable);
        register!(NodeKind::Tan, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::tan)
        }) as Callable);
        register!(NodeKind::Asin, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::asin)
        }) as Callable);
        register!(NodeKind::Acos, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::acos)
        }) as Callable);
        register!(NodeKind::Atan, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::atan)
        }) as Callable);
        register!(NodeKind::Sinh, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::sinh)
        }) as Callable);
        register!(NodeKind::Cosh, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::cosh)
        }) as Callable);
        register!(NodeKind::Tanh, (|m: &mut Matrix, _: &[Node], i: usize| {
            unary_op(m, i, f64::tanh)
        }) as Callable);

        DispatchTable { callables }
    }

    pub fn get(&self, hash: u64) -> SymregResult<Callable> {
        self.callables
            .get(&hash)
            .copied()
            .ok_or(SymregError::UnknownOperator { hash })
    }

    pub fn contains(&self, hash: u64) -> bool {
        self.callables.contains_key(&hash)
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;

    #[test]
    fn every_non_leaf_kind_has_a_registration() {
        let table = DispatchTable::new();
        for kind in crate::ops::ALL_NODE_KINDS {
            if kind.is_leaf() {
                continue;
            }
            assert!(table.contains(kind.seed_hash()), "missing {kind}");
        }
    }

    #[test]
    fn unknown_hash_fails() {
        let table = DispatchTable::new();
        assert!(table.get(0xdead_beef).is_err());
    }

    #[test]
    fn add_reduces_nary_children_left_to_right() {
        let tree = Tree::from_postfix(vec![
            Node::constant(2.0),
            Node::constant(3.0),
            Node::constant(4.0),
            Node::function(NodeKind::Add, 3),
        ])
        .unwrap();

        let table = DispatchTable::new();
        let mut m = Matrix::new(tree.len());
        m.col_mut(0).fill(2.0);
        m.col_mut(1).fill(3.0);
        m.col_mut(2).fill(4.0);

        let root = tree.root_index();
        let f = table.get(tree.nodes()[root].hash_value).unwrap();
        f(&mut m, tree.nodes(), root);

        assert_eq!(m.col(root)[0], 9.0);
    }
}
