//! Compound mutation (§4.H): pick a random node, operate, rebuild. Each
//! variant below follows that shape for a different kind of edit.

use crate::creators;
use symreg_core::{Arity, Node, NodeKind, PrimitiveSet, Tree, domain::random_provider};
use symreg_error::{SymregError, SymregResult};

const MAX_CHILD_ARITY: u8 = 6;

fn sample_terminal(primitives: &PrimitiveSet) -> Node {
    if random_provider::bool(0.5) {
        Node::constant(random_provider::gaussian(0.0, 1.0))
    } else {
        Node::variable(primitives.sample_variable(), 1.0)
    }
}

fn leaf_indices(tree: &Tree) -> Vec<usize> {
    (0..tree.len()).filter(|&i| tree.nodes()[i].is_leaf()).collect()
}

fn function_indices(tree: &Tree) -> Vec<usize> {
    (0..tree.len()).filter(|&i| !tree.nodes()[i].is_leaf()).collect()
}

fn rebuild_with(tree: &Tree, nodes: Vec<Node>) -> SymregResult<Tree> {
    Tree::from_postfix(nodes)
}

/// Resample one leaf's value from a continuous distribution: a fresh
/// Gaussian draw for a constant, or a reweighted coefficient for a variable.
pub fn one_point(tree: &Tree, sigma: f64) -> SymregResult<Tree> {
    let leaves = leaf_indices(tree);
    let idx = *random_provider::choose(&leaves);
    let mut nodes = tree.nodes().to_vec();
    nodes[idx].value = random_provider::gaussian(nodes[idx].value, sigma);
    rebuild_with(tree, nodes)
}

/// Resample one constant leaf's value from a discrete weighted set. A no-op
/// (returns a clone) if the tree has no constant leaf.
pub fn discrete_point(tree: &Tree, choices: &[f64]) -> SymregResult<Tree> {
    if choices.is_empty() {
        return Err(SymregError::invalid_argument("discrete_point needs at least one choice"));
    }
    let constants: Vec<usize> = leaf_indices(tree)
        .into_iter()
        .filter(|&i| tree.nodes()[i].is_constant())
        .collect();
    if constants.is_empty() {
        return Ok(tree.clone());
    }
    let idx = *random_provider::choose(&constants);
    let mut nodes = tree.nodes().to_vec();
    nodes[idx].value = *random_provider::choose(choices);
    rebuild_with(tree, nodes)
}

/// Replaces a variable leaf's bound column with a different eligible input.
/// A no-op if the tree has no variable leaf.
pub fn change_variable(tree: &Tree, primitives: &PrimitiveSet) -> SymregResult<Tree> {
    let variables: Vec<usize> = leaf_indices(tree)
        .into_iter()
        .filter(|&i| tree.nodes()[i].is_variable())
        .collect();
    if variables.is_empty() {
        return Ok(tree.clone());
    }
    let idx = *random_provider::choose(&variables);
    let mut nodes = tree.nodes().to_vec();
    nodes[idx].variable = Some(primitives.sample_variable());
    rebuild_with(tree, nodes)
}

/// Retypes a function node to a different kind whose arity range still
/// accepts the node's current child count. A no-op if nothing qualifies.
pub fn change_function(tree: &Tree, primitives: &PrimitiveSet) -> SymregResult<Tree> {
    let functions = function_indices(tree);
    if functions.is_empty() {
        return Ok(tree.clone());
    }
    let idx = *random_provider::choose(&functions);
    let arity = tree.nodes()[idx].arity;
    let Some(new_kind) = primitives.sample_function(Arity::Exact(arity)) else {
        return Ok(tree.clone());
    };

    let mut nodes = tree.nodes().to_vec();
    nodes[idx].kind = new_kind;
    nodes[idx].hash_value = new_kind.seed_hash();
    nodes[idx].optimize = new_kind == NodeKind::Pow;
    if new_kind == NodeKind::Pow {
        nodes[idx].value = 1.0;
    }
    rebuild_with(tree, nodes)
}

/// Replaces a randomly chosen subtree with a freshly grown one, respecting
/// the remaining length and depth budget.
pub fn replace_subtree(
    tree: &Tree,
    primitives: &PrimitiveSet,
    max_length: usize,
    max_depth: u16,
) -> SymregResult<Tree> {
    let idx = random_provider::range(0..tree.len());
    let range = tree.subtree_range(idx);
    let removed = range.clone().count();
    let remaining_budget = max_length.saturating_sub(tree.len() - removed).max(1);
    let remaining_depth = max_depth.saturating_sub(tree.nodes()[idx].level).max(1);

    let replacement = creators::grow(primitives, 0, remaining_depth.min(remaining_budget as u16))?;

    let mut nodes: Vec<Node> = Vec::with_capacity(tree.len() - removed + replacement.len());
    nodes.extend_from_slice(&tree.nodes()[..*range.start()]);
    nodes.extend_from_slice(replacement.nodes());
    nodes.extend_from_slice(&tree.nodes()[*range.end() + 1..]);
    rebuild_with(tree, nodes)
}

/// Inserts a fresh terminal as a new child of a commutative node whose
/// arity has room to grow. A no-op if no such node exists.
pub fn insert_subtree(tree: &Tree, primitives: &PrimitiveSet) -> SymregResult<Tree> {
    let candidates: Vec<usize> = function_indices(tree)
        .into_iter()
        .filter(|&i| {
            let n = &tree.nodes()[i];
            n.kind.is_commutative() && n.arity < MAX_CHILD_ARITY
        })
        .collect();
    if candidates.is_empty() {
        return Ok(tree.clone());
    }

    let idx = *random_provider::choose(&candidates);
    let insert_at = *tree.subtree_range(idx).start();
    let mut nodes = tree.nodes().to_vec();
    nodes.insert(insert_at, sample_terminal(primitives));
    nodes[idx + 1].arity += 1;
    rebuild_with(tree, nodes)
}

/// Deletes one child subtree of a commutative node whose arity is above its
/// minimum. A no-op if no such node exists.
pub fn remove_subtree(tree: &Tree) -> SymregResult<Tree> {
    let candidates: Vec<usize> = function_indices(tree)
        .into_iter()
        .filter(|&i| {
            let n = &tree.nodes()[i];
            n.kind.is_commutative() && n.arity > n.kind.arity().min()
        })
        .collect();
    if candidates.is_empty() {
        return Ok(tree.clone());
    }

    let idx = *random_provider::choose(&candidates);
    let children: Vec<usize> = tree.children(idx).collect();
    let victim = *random_provider::choose(&children);
    let victim_range = tree.subtree_range(victim);

    let mut nodes: Vec<Node> = Vec::with_capacity(tree.len() - victim_range.clone().count());
    nodes.extend_from_slice(&tree.nodes()[..*victim_range.start()]);
    nodes.extend_from_slice(&tree.nodes()[*victim_range.end() + 1..]);
    let parent_idx = idx - victim_range.clone().count();
    nodes[parent_idx].arity -= 1;
    rebuild_with(tree, nodes)
}

/// Permutes the child order of a randomly picked function node with at
/// least two children.
pub fn shuffle_subtrees(tree: &Tree) -> SymregResult<Tree> {
    let candidates: Vec<usize> = function_indices(tree)
        .into_iter()
        .filter(|&i| tree.nodes()[i].arity >= 2)
        .collect();
    if candidates.is_empty() {
        return Ok(tree.clone());
    }

    let idx = *random_provider::choose(&candidates);
    let children: Vec<usize> = tree.children(idx).collect();
    let mut segments: Vec<&[Node]> = children
        .iter()
        .map(|&c| {
            let r = tree.subtree_range(c);
            &tree.nodes()[r]
        })
        .collect();
    random_provider::shuffle(&mut segments);

    let parent_range = tree.subtree_range(idx);
    let mut nodes: Vec<Node> = Vec::with_capacity(tree.len());
    nodes.extend_from_slice(&tree.nodes()[..*parent_range.start()]);
    for segment in segments {
        nodes.extend_from_slice(segment);
    }
    nodes.push(tree.nodes()[idx].clone());
    nodes.extend_from_slice(&tree.nodes()[*parent_range.end() + 1..]);
    rebuild_with(tree, nodes)
}

/// The eight mutation variants, weighted by how often each is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    OnePoint,
    DiscretePoint,
    ChangeVariable,
    ChangeFunction,
    ReplaceSubtree,
    InsertSubtree,
    RemoveSubtree,
    ShuffleSubtrees,
}

/// A weighted-random compound mutation over the eight variants in §4.H.
pub struct MultiMutation {
    weights: Vec<(MutationKind, f32)>,
    sigma: f64,
    discrete_choices: Vec<f64>,
    max_length: usize,
    max_depth: u16,
}

impl MultiMutation {
    pub fn new(max_length: usize, max_depth: u16) -> Self {
        MultiMutation {
            weights: vec![
                (MutationKind::OnePoint, 1.0),
                (MutationKind::DiscretePoint, 1.0),
                (MutationKind::ChangeVariable, 1.0),
                (MutationKind::ChangeFunction, 1.0),
                (MutationKind::ReplaceSubtree, 1.0),
                (MutationKind::InsertSubtree, 1.0),
                (MutationKind::RemoveSubtree, 1.0),
                (MutationKind::ShuffleSubtrees, 1.0),
            ],
            sigma: 1.0,
            discrete_choices: vec![std::f64::consts::PI, std::f64::consts::E, 0.5, 2.0],
            max_length,
            max_depth,
        }
    }

    pub fn with_weight(mut self, kind: MutationKind, weight: f32) -> Self {
        if let Some(entry) = self.weights.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = weight;
        }
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma;
        self
    }

    fn pick_kind(&self) -> MutationKind {
        let total: f32 = self.weights.iter().map(|(_, w)| w).sum();
        let mut draw = random_provider::range(0.0..total.max(f32::MIN_POSITIVE));
        for (kind, weight) in &self.weights {
            if draw < *weight {
                return *kind;
            }
            draw -= weight;
        }
        self.weights.last().map(|(k, _)| *k).unwrap_or(MutationKind::OnePoint)
    }

    pub fn mutate(&self, tree: &Tree, primitives: &PrimitiveSet) -> SymregResult<Tree> {
        match self.pick_kind() {
            MutationKind::OnePoint => one_point(tree, self.sigma),
            MutationKind::DiscretePoint => discrete_point(tree, &self.discrete_choices),
            MutationKind::ChangeVariable => change_variable(tree, primitives),
            MutationKind::ChangeFunction => change_function(tree, primitives),
            MutationKind::ReplaceSubtree => {
                replace_subtree(tree, primitives, self.max_length, self.max_depth)
            }
            MutationKind::InsertSubtree => insert_subtree(tree, primitives),
            MutationKind::RemoveSubtree => remove_subtree(tree),
            MutationKind::ShuffleSubtrees => shuffle_subtrees(tree),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitives() -> PrimitiveSet {
        PrimitiveSet::new(vec![1, 2, 3]).unwrap()
    }

    fn sum_of_three_vars() -> Tree {
        Tree::from_postfix(vec![
            Node::variable(1, 1.0),
            Node::variable(2, 1.0),
            Node::variable(3, 1.0),
            Node::function(NodeKind::Add, 3),
        ])
        .unwrap()
    }

    fn valid_lengths(tree: &Tree) {
        for i in 0..tree.len() {
            let expected: u32 = tree.children(i).map(|c| tree.length(c) + 1).sum();
            assert_eq!(tree.length(i), expected);
        }
    }

    #[test]
    fn one_point_changes_a_leaf_value() {
        let tree = sum_of_three_vars();
        let mutated = one_point(&tree, 0.1).unwrap();
        valid_lengths(&mutated);
        assert_eq!(mutated.len(), tree.len());
    }

    #[test]
    fn change_function_preserves_arity() {
        let tree = sum_of_three_vars();
        let mutated = change_function(&tree, &primitives()).unwrap();
        valid_lengths(&mutated);
        assert_eq!(mutated.root().arity, 3);
    }

    #[test]
    fn insert_then_remove_subtree_round_trips_arity() {
        let tree = sum_of_three_vars();
        let grown = insert_subtree(&tree, &primitives()).unwrap();
        valid_lengths(&grown);
        assert_eq!(grown.root().arity, 4);

        let shrunk = remove_subtree(&grown).unwrap();
        valid_lengths(&shrunk);
        assert_eq!(shrunk.root().arity, 3);
    }

    #[test]
    fn remove_subtree_is_a_no_op_at_minimum_arity() {
        let tree = Tree::from_postfix(vec![
            Node::variable(1, 1.0),
            Node::variable(2, 1.0),
            Node::function(NodeKind::Add, 2),
        ])
        .unwrap();
        let shrunk = remove_subtree(&tree).unwrap();
        assert_eq!(shrunk.len(), tree.len());
    }

    #[test]
    fn shuffle_subtrees_preserves_the_multiset_of_children() {
        let tree = sum_of_three_vars();
        let shuffled = shuffle_subtrees(&tree).unwrap();
        valid_lengths(&shuffled);
        assert_eq!(shuffled.len(), tree.len());
    }

    #[test]
    fn replace_subtree_respects_the_length_budget() {
        let tree = sum_of_three_vars();
        let replaced = replace_subtree(&tree, &primitives(), 6, 4).unwrap();
        valid_lengths(&replaced);
        assert!(replaced.len() <= 10);
    }

    #[test]
    fn multi_mutation_always_returns_a_structurally_valid_tree() {
        let multi = MultiMutation::new(20, 6);
        for _ in 0..50 {
            let tree = sum_of_three_vars();
            let mutated = multi.mutate(&tree, &primitives()).unwrap();
            valid_lengths(&mutated);
        }
    }
}
