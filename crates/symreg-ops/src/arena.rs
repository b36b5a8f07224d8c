//! A scratch tree representation the creators build into before flattening
//! to the postfix [`Node`] array `Tree` expects. Each creator samples nodes
//! breadth-first or depth-first into this indexed arena, then
//! [`flatten`] walks it children-first (left-to-right) to produce a valid
//! postfix sequence in one pass.

use symreg_core::{Node, NodeKind};

pub struct ArenaNode {
    pub kind: NodeKind,
    pub value: f64,
    pub variable: Option<u64>,
    pub children: Vec<usize>,
}

impl ArenaNode {
    pub fn leaf_constant(value: f64) -> Self {
        ArenaNode { kind: NodeKind::Constant, value, variable: None, children: Vec::new() }
    }

    pub fn leaf_variable(hash: u64, weight: f64) -> Self {
        ArenaNode { kind: NodeKind::Variable, value: weight, variable: Some(hash), children: Vec::new() }
    }

    pub fn function(kind: NodeKind) -> Self {
        ArenaNode { kind, value: 1.0, variable: None, children: Vec::new() }
    }
}

pub struct Arena {
    pub nodes: Vec<ArenaNode>,
}

impl Arena {
    pub fn new() -> Self {
        Arena { nodes: Vec::new() }
    }

    pub fn push(&mut self, node: ArenaNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Number of nodes reachable from `root`, inclusive.
    pub fn subtree_size(&self, root: usize) -> usize {
        1 + self.nodes[root]
            .children
            .iter()
            .map(|&c| self.subtree_size(c))
            .sum::<usize>()
    }

    pub fn depth(&self, root: usize) -> usize {
        1 + self.nodes[root]
            .children
            .iter()
            .map(|&c| self.depth(c))
            .max()
            .unwrap_or(0)
    }

    /// Flattens the arena into a postfix [`Node`] array rooted at `root`.
    pub fn flatten(&self, root: usize) -> Vec<Node> {
        let mut out = Vec::with_capacity(self.subtree_size(root));
        self.flatten_into(root, &mut out);
        out
    }

    fn flatten_into(&self, i: usize, out: &mut Vec<Node>) {
        let arena_node = &self.nodes[i];
        for &child in &arena_node.children {
            self.flatten_into(child, out);
        }

        let node = match arena_node.kind {
            NodeKind::Constant => Node::constant(arena_node.value),
            NodeKind::Variable => Node::variable(arena_node.variable.unwrap(), arena_node.value),
            kind => {
                let mut n = Node::function(kind, arena_node.children.len() as u8);
                if n.optimize {
                    n.value = arena_node.value;
                }
                n
            }
        };
        out.push(node);
    }
}
