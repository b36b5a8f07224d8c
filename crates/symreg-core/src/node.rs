//! The fixed-size [`Node`] record that makes up a postfix [`Tree`](crate::tree::Tree).

use crate::ops::NodeKind;

/// A single element of a postfix expression tree (§3).
///
/// `length`, `depth`, `level` and `parent` are caches recomputed by
/// [`crate::tree::Tree::rebuild`] after any structural edit; they must never
/// be hand-mutated independently of the node they describe.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub kind: NodeKind,
    pub arity: u8,
    /// Number of descendants (subtree size minus one).
    pub length: u32,
    /// Height of the subtree rooted at this node (0 for a leaf).
    pub depth: u16,
    /// Distance from the root to this node (0 for the root).
    pub level: u16,
    /// Index of the parent node in the tree's postfix array; the root is its own parent.
    pub parent: usize,
    pub is_enabled: bool,
    /// Whether this node's `value` is one of the tree's optimizable coefficients.
    pub optimize: bool,
    /// Weight for a variable leaf, numeric value for a constant, or a
    /// structural coefficient (e.g. a `Pow` exponent) for a function node.
    pub value: f64,
    /// Set only on `NodeKind::Variable` leaves: the stable hash of the bound column name.
    pub variable: Option<u64>,
    /// Seed hash of `kind`, used as the dispatch key (§4.B).
    pub hash_value: u64,
    /// Filled in by `Tree::hash`; canonical identity of the subtree rooted here.
    pub calculated_hash_value: u64,
}

impl Node {
    pub fn constant(value: f64) -> Self {
        Node {
            kind: NodeKind::Constant,
            arity: 0,
            length: 0,
            depth: 0,
            level: 0,
            parent: 0,
            is_enabled: true,
            optimize: true,
            value,
            variable: None,
            hash_value: NodeKind::Constant.seed_hash(),
            calculated_hash_value: 0,
        }
    }

    pub fn variable(variable_hash: u64, weight: f64) -> Self {
        Node {
            kind: NodeKind::Variable,
            arity: 0,
            length: 0,
            depth: 0,
            level: 0,
            parent: 0,
            is_enabled: true,
            optimize: true,
            value: weight,
            variable: Some(variable_hash),
            hash_value: NodeKind::Variable.seed_hash(),
            calculated_hash_value: 0,
        }
    }

    pub fn function(kind: NodeKind, arity: u8) -> Self {
        assert!(
            kind.arity().contains(arity),
            "{kind} does not support arity {arity}"
        );
        Node {
            kind,
            arity,
            length: 0,
            depth: 0,
            level: 0,
            parent: 0,
            is_enabled: true,
            optimize: kind == NodeKind::Pow,
            value: 1.0,
            variable: None,
            hash_value: kind.seed_hash(),
            calculated_hash_value: 0,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.arity == 0
    }

    pub fn is_variable(&self) -> bool {
        self.kind == NodeKind::Variable
    }

    pub fn is_constant(&self) -> bool {
        self.kind == NodeKind::Constant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_defaults_to_optimized() {
        let n = Node::constant(2.0);
        assert!(n.optimize);
        assert!(n.is_leaf());
    }

    #[test]
    fn variable_defaults_to_optimized_weight() {
        let n = Node::variable(42, 0.5);
        assert!(n.optimize);
        assert_eq!(n.variable, Some(42));
    }

    #[test]
    #[should_panic]
    fn function_rejects_incompatible_arity() {
        Node::function(NodeKind::Sin, 2);
    }
}
