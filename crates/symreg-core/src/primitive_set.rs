//! The set of node types enabled for a run, with their sampling weights and
//! arity constraints (§3).

use crate::ops::{ALL_NODE_KINDS, Arity, NodeKind};
use symreg_error::{SymregError, SymregResult};

#[derive(Debug, Clone, Copy)]
pub struct Primitive {
    pub kind: NodeKind,
    pub enabled: bool,
    pub frequency: f32,
    pub arity: Arity,
}

/// Drives symbol sampling for the tree creators (§4.H) and `ChangeFunction`
/// mutation (§4.I). Constructed once per run and treated as immutable after.
#[derive(Debug, Clone)]
pub struct PrimitiveSet {
    primitives: Vec<Primitive>,
    variable_hashes: Vec<u64>,
}

impl PrimitiveSet {
    /// Enables every non-leaf node type in `ALL_NODE_KINDS` with frequency
    /// `1.0`, plus the given variable hashes as terminals, and returns a
    /// builder that can then disable/reweight individual kinds.
    pub fn new(variable_hashes: Vec<u64>) -> SymregResult<Self> {
        if variable_hashes.is_empty() {
            return Err(SymregError::invalid_argument(
                "primitive set needs at least one input variable",
            ));
        }

        let primitives = ALL_NODE_KINDS
            .iter()
            .filter(|k| !matches!(k, NodeKind::Constant | NodeKind::Variable))
            .map(|&kind| Primitive {
                kind,
                enabled: true,
                frequency: 1.0,
                arity: kind.arity(),
            })
            .collect();

        Ok(PrimitiveSet {
            primitives,
            variable_hashes,
        })
    }

    pub fn enable_only(mut self, kinds: &[NodeKind]) -> Self {
        for p in self.primitives.iter_mut() {
            p.enabled = kinds.contains(&p.kind);
        }
        self
    }

    pub fn with_frequency(mut self, kind: NodeKind, frequency: f32) -> Self {
        if let Some(p) = self.primitives.iter_mut().find(|p| p.kind == kind) {
            p.frequency = frequency;
        }
        self
    }

    pub fn variable_hashes(&self) -> &[u64] {
        &self.variable_hashes
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.iter().filter(|p| p.enabled)
    }

    /// Enabled function primitives whose arity range overlaps `requested`.
    pub fn eligible(&self, requested: Arity) -> Vec<&Primitive> {
        self.enabled()
            .filter(|p| p.arity.overlaps(&requested))
            .collect()
    }

    /// Draws a node type by frequency weight among the enabled primitives
    /// whose arity range overlaps `requested`. Returns `None` if nothing
    /// qualifies.
    pub fn sample_function(&self, requested: Arity) -> Option<NodeKind> {
        let candidates = self.eligible(requested);
        if candidates.is_empty() {
            return None;
        }

        let total: f32 = candidates.iter().map(|p| p.frequency).sum();
        if total <= 0.0 {
            return candidates.first().map(|p| p.kind);
        }

        let mut draw = crate::domain::random_provider::range(0.0..total);
        for p in &candidates {
            if draw < p.frequency {
                return Some(p.kind);
            }
            draw -= p.frequency;
        }
        candidates.last().map(|p| p.kind)
    }

    pub fn sample_variable(&self) -> u64 {
        *crate::domain::random_provider::choose(&self.variable_hashes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_variables() {
        assert!(PrimitiveSet::new(vec![]).is_err());
    }

    #[test]
    fn sampling_respects_enable_only() {
        let set = PrimitiveSet::new(vec![1])
            .unwrap()
            .enable_only(&[NodeKind::Add, NodeKind::Sin]);

        for _ in 0..50 {
            let kind = set.sample_function(Arity::Range(1, 2)).unwrap();
            assert!(matches!(kind, NodeKind::Add | NodeKind::Sin));
        }
    }

    #[test]
    fn arity_filter_excludes_incompatible_primitives() {
        let set = PrimitiveSet::new(vec![1]).unwrap();
        let unary_only = set.eligible(Arity::Exact(1));
        assert!(unary_only.iter().all(|p| p.arity.contains(1)));
        assert!(!unary_only.iter().any(|p| p.kind == NodeKind::Div));
    }
}
