//! Subtree crossover (§4.H): pick a cut point in each parent, swap the
//! subtrees rooted there, retry a bounded number of times if the result
//! would bust a size budget.

use symreg_core::{Node, Tree, domain::random_provider};
use symreg_error::{SymregError, SymregResult};

const MAX_ATTEMPTS: usize = 8;

/// Picks a node index in `tree`, biased toward internal (non-leaf) nodes
/// with probability `internal_probability`; with probability
/// `1 - internal_probability` the cut lands on a leaf, matching the
/// idempotence requirement in §4.H (a leaf-for-leaf swap is always valid).
fn pick_cut_point(tree: &Tree, internal_probability: f32) -> usize {
    let want_internal = random_provider::bool(internal_probability);
    let candidates: Vec<usize> = (0..tree.len())
        .filter(|&i| {
            let is_leaf = tree.nodes()[i].is_leaf();
            if want_internal { !is_leaf } else { is_leaf }
        })
        .collect();

    if candidates.is_empty() {
        return random_provider::range(0..tree.len());
    }
    *random_provider::choose(&candidates)
}

fn splice(a: &Tree, cut_a: usize, b: &Tree, cut_b: usize) -> SymregResult<Tree> {
    let a_range = a.subtree_range(cut_a);
    let b_range = b.subtree_range(cut_b);

    let mut spliced: Vec<Node> = Vec::with_capacity(
        a.len() - a_range.clone().count() + b_range.clone().count(),
    );
    spliced.extend_from_slice(&a.nodes()[..*a_range.start()]);
    spliced.extend_from_slice(&b.nodes()[b_range]);
    spliced.extend_from_slice(&a.nodes()[*a_range.end() + 1..]);

    Tree::from_postfix(spliced)
}

/// Splices a subtree from `donor` into `recipient` at a cut point biased by
/// `internal_probability`, retrying with fresh cut points up to
/// [`MAX_ATTEMPTS`] times whenever the result would exceed `max_length` or
/// `max_depth`. Returns `InvalidStructure` if no attempt satisfies the
/// budget (e.g. the donor's smallest subtree already overflows it).
pub fn subtree_crossover(
    recipient: &Tree,
    donor: &Tree,
    internal_probability: f32,
    max_length: usize,
    max_depth: u16,
) -> SymregResult<Tree> {
    for _ in 0..MAX_ATTEMPTS {
        let cut_recipient = pick_cut_point(recipient, internal_probability);
        let cut_donor = pick_cut_point(donor, internal_probability);

        let Ok(child) = splice(recipient, cut_recipient, donor, cut_donor) else {
            continue;
        };

        if child.len() <= max_length && child.depth(child.root_index()) <= max_depth {
            return Ok(child);
        }
    }

    Err(SymregError::invalid_structure(
        "subtree crossover could not find a cut satisfying the length/depth budget",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use symreg_core::NodeKind;

    fn sum_of_three_vars(hashes: [u64; 3]) -> Tree {
        Tree::from_postfix(vec![
            Node::variable(hashes[0], 1.0),
            Node::variable(hashes[1], 1.0),
            Node::variable(hashes[2], 1.0),
            Node::function(NodeKind::Add, 3),
        ])
        .unwrap()
    }

    #[test]
    fn crossover_produces_a_structurally_valid_tree() {
        let a = sum_of_three_vars([1, 2, 3]);
        let b = sum_of_three_vars([4, 5, 6]);
        let child = subtree_crossover(&a, &b, 0.5, 50, 20).unwrap();
        for i in 0..child.len() {
            let expected: u32 = child.children(i).map(|c| child.length(c) + 1).sum();
            assert_eq!(child.length(i), expected);
        }
    }

    #[test]
    fn leaf_for_leaf_crossover_is_idempotent_in_shape() {
        let a = sum_of_three_vars([1, 2, 3]);
        let b = sum_of_three_vars([4, 5, 6]);
        let child = subtree_crossover(&a, &b, 0.0, 50, 20).unwrap();
        assert_eq!(child.len(), a.len());
    }

    #[test]
    fn impossible_budget_is_reported_as_an_error() {
        let a = sum_of_three_vars([1, 2, 3]);
        let b = sum_of_three_vars([4, 5, 6]);
        assert!(subtree_crossover(&a, &b, 1.0, 1, 0).is_err());
    }
}
