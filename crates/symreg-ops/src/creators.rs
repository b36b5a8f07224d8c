//! Tree creators (§4.G): build a fresh, valid tree from a primitive set and
//! a target shape, sampled into a scratch arena then flattened to postfix.
//! The sampling strategies themselves (Grow, ramped-half-and-half-style
//! balanced growth, PTC2) follow Koza/Langdon's classical GP creator
//! algorithms.

use crate::arena::{Arena, ArenaNode};
use symreg_core::{Arity, NodeKind, PrimitiveSet, Tree, domain::random_provider};
use symreg_error::{SymregError, SymregResult};

const FUNCTION_PROBABILITY: f32 = 0.7;
/// Widest n-ary arity any creator samples, so an `Add`/`Mul`/... node never
/// balloons to an unreasonable child count even though their declared arity
/// range is unbounded.
const MAX_NARY_ARITY: u8 = 4;

fn sample_terminal(primitives: &PrimitiveSet) -> ArenaNode {
    if random_provider::bool(0.5) {
        ArenaNode::leaf_constant(random_provider::gaussian(0.0, 1.0))
    } else {
        ArenaNode::leaf_variable(primitives.sample_variable(), 1.0)
    }
}

fn pick_arity(arity: Arity) -> u8 {
    let hi = arity.max().min(MAX_NARY_ARITY).max(arity.min());
    if hi <= arity.min() {
        arity.min()
    } else {
        random_provider::range(arity.min()..(hi + 1))
    }
}

/// Classical Koza "grow": at each slot, independently choose a function or a
/// terminal until `max_depth` is reached or a slot terminates; `min_depth`
/// forces a function at shallower slots so the tree doesn't collapse to a
/// single leaf.
pub fn grow(primitives: &PrimitiveSet, min_depth: u16, max_depth: u16) -> SymregResult<Tree> {
    let mut arena = Arena::new();
    let root = grow_node(&mut arena, primitives, 0, min_depth, max_depth)?;
    Tree::from_postfix(arena.flatten(root))
}

fn grow_node(
    arena: &mut Arena,
    primitives: &PrimitiveSet,
    depth: u16,
    min_depth: u16,
    max_depth: u16,
) -> SymregResult<usize> {
    let must_branch = depth < min_depth;
    let can_branch = depth < max_depth;

    if can_branch && (must_branch || random_provider::bool(FUNCTION_PROBABILITY)) {
        if let Some(kind) = primitives.sample_function(Arity::Range(1, u8::MAX)) {
            let arity = pick_arity(kind.arity());
            let mut node = ArenaNode::function(kind);
            if kind == NodeKind::Pow {
                node.value = random_provider::gaussian(1.0, 0.25);
            }
            let idx = arena.push(node);
            let mut children = Vec::with_capacity(arity as usize);
            for _ in 0..arity {
                children.push(grow_node(arena, primitives, depth + 1, min_depth, max_depth)?);
            }
            arena.nodes[idx].children = children;
            return Ok(idx);
        }
    }

    Ok(arena.push(sample_terminal(primitives)))
}

/// Breadth-first "balanced" growth: a horizon of open slots is expanded
/// round-robin rather than depth-first, biased by `irregularity` toward
/// small-arity primitives so the resulting tree isn't perfectly regular.
/// `target_length` bounds the total node count; once the horizon would push
/// past it, every remaining slot is closed off with a terminal.
pub fn balanced(
    primitives: &PrimitiveSet,
    target_length: usize,
    min_depth: u16,
    max_depth: u16,
    irregularity: f32,
) -> SymregResult<Tree> {
    if target_length == 0 {
        return Err(SymregError::invalid_argument("target_length must be at least 1"));
    }

    let mut arena = Arena::new();
    let root_idx = arena.push(ArenaNode::leaf_constant(0.0));
    let mut horizon: Vec<(usize, u16)> = vec![(root_idx, 0)];
    let mut total = 1usize;

    while let Some((slot, depth)) = horizon.pop() {
        let remaining_budget = target_length.saturating_sub(total);
        let must_branch = depth < min_depth;
        let can_branch = depth < max_depth && remaining_budget > 0;

        let expand = can_branch
            && (must_branch || random_provider::bool(FUNCTION_PROBABILITY.min(remaining_budget as f32)));

        if !expand {
            arena.nodes[slot] = sample_terminal(primitives);
            continue;
        }

        let requested = if remaining_budget <= 2 {
            Arity::Range(1, 2)
        } else if random_provider::bool(irregularity.clamp(0.0, 1.0)) {
            Arity::Range(1, 1)
        } else {
            Arity::Range(1, u8::MAX)
        };

        let Some(kind) = primitives.sample_function(requested) else {
            arena.nodes[slot] = sample_terminal(primitives);
            continue;
        };

        let arity = pick_arity(kind.arity()).max(1).min((remaining_budget as u8).max(1));
        let mut node = ArenaNode::function(kind);
        if kind == NodeKind::Pow {
            node.value = random_provider::gaussian(1.0, 0.25);
        }

        let mut children = Vec::with_capacity(arity as usize);
        for _ in 0..arity {
            let child_idx = arena.push(ArenaNode::leaf_constant(0.0));
            total += 1;
            children.push(child_idx);
            horizon.push((child_idx, depth + 1));
        }
        node.children = children;
        arena.nodes[slot] = node;
    }

    Tree::from_postfix(arena.flatten(root_idx))
}

/// Langdon's PTC2: expand a FIFO queue of open slots until the accumulated
/// length reaches `target_length`, then close every remaining slot with a
/// terminal.
pub fn ptc2(
    primitives: &PrimitiveSet,
    target_length: usize,
    max_depth: u16,
) -> SymregResult<Tree> {
    if target_length == 0 {
        return Err(SymregError::invalid_argument("target_length must be at least 1"));
    }

    let mut arena = Arena::new();
    let root = arena.push(ArenaNode::function(NodeKind::Add));
    let mut queue: std::collections::VecDeque<(usize, u16)> = std::collections::VecDeque::new();
    queue.push_back((root, 0));
    let mut length = 1usize;

    while let Some((slot, depth)) = queue.pop_front() {
        let expand = length < target_length && depth < max_depth;

        if expand {
            if let Some(kind) = primitives.sample_function(Arity::Range(1, u8::MAX)) {
                let arity = pick_arity(kind.arity());
                let mut node = ArenaNode::function(kind);
                if kind == NodeKind::Pow {
                    node.value = random_provider::gaussian(1.0, 0.25);
                }
                arena.nodes[slot] = node;
                let mut children = Vec::with_capacity(arity as usize);
                for _ in 0..arity {
                    let child_idx = arena.push(sample_terminal(primitives));
                    length += 1;
                    children.push(child_idx);
                    queue.push_back((child_idx, depth + 1));
                }
                arena.nodes[slot].children = children;
                continue;
            }
        }

        arena.nodes[slot] = sample_terminal(primitives);
    }

    Tree::from_postfix(arena.flatten(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primitives() -> PrimitiveSet {
        PrimitiveSet::new(vec![1, 2, 3]).unwrap()
    }

    #[test]
    fn grow_respects_max_depth() {
        for _ in 0..20 {
            let tree = grow(&primitives(), 0, 3).unwrap();
            assert!(tree.depth(tree.root_index()) <= 3);
        }
    }

    #[test]
    fn grow_respects_min_depth_when_possible() {
        let tree = grow(&primitives(), 2, 4).unwrap();
        assert!(tree.depth(tree.root_index()) >= 1);
    }

    #[test]
    fn balanced_tree_does_not_exceed_target_length_by_much() {
        for _ in 0..20 {
            let tree = balanced(&primitives(), 15, 1, 6, 0.3).unwrap();
            assert!(tree.len() <= 15 + MAX_NARY_ARITY as usize);
        }
    }

    #[test]
    fn ptc2_tree_is_a_valid_postfix_tree() {
        for _ in 0..20 {
            let tree = ptc2(&primitives(), 10, 6).unwrap();
            for i in 0..tree.len() {
                let expected: u32 = tree.children(i).map(|c| tree.length(c) + 1).sum();
                assert_eq!(tree.length(i), expected);
            }
        }
    }

    #[test]
    fn zero_target_length_is_rejected() {
        assert!(balanced(&primitives(), 0, 0, 3, 0.5).is_err());
        assert!(ptc2(&primitives(), 0, 3).is_err());
    }
}
