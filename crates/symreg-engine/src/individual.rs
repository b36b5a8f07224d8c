//! The unit the generational loop operates on (§3 "Individual").
//!
//! A genotype plus a fitness vector and the bookkeeping NSGA-II needs
//! (rank, crowding distance), kept as plain fields rather than behind a
//! chromosome trait object since this crate has exactly one genotype shape
//! (`Tree`).

use symreg_core::Tree;

/// An evolved expression tree plus its evaluated fitness and multi-objective
/// bookkeeping. `fitness.len() == objectives` once evaluated; defaults to a
/// single `+inf` entry before the first evaluation (§3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Individual {
    pub genotype: Tree,
    pub fitness: Vec<f64>,
    /// NSGA-II Pareto rank; `0` is the first (best) front. Meaningless for a
    /// single-objective run, left at `0`.
    pub rank: usize,
    /// NSGA-II crowding distance; `+inf` for boundary points. Meaningless for
    /// a single-objective run, left at `0.0`.
    pub distance: f64,
}

impl Individual {
    pub fn new(genotype: Tree, objectives: usize) -> Self {
        Individual {
            genotype,
            fitness: vec![f64::INFINITY; objectives.max(1)],
            rank: 0,
            distance: 0.0,
        }
    }

    pub fn with_fitness(genotype: Tree, fitness: Vec<f64>) -> Self {
        Individual { genotype, fitness, rank: 0, distance: 0.0 }
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.iter().all(|f| f.is_finite())
    }
}

impl AsRef<[f64]> for Individual {
    fn as_ref(&self) -> &[f64] {
        &self.fitness
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symreg_core::Node;

    #[test]
    fn fresh_individual_defaults_to_infinite_fitness() {
        let tree = Tree::from_postfix(vec![Node::constant(1.0)]).unwrap();
        let ind = Individual::new(tree, 2);
        assert_eq!(ind.fitness, vec![f64::INFINITY, f64::INFINITY]);
        assert!(!ind.is_evaluated());
    }
}
