//! Tree creators, crossover/mutation operators (§4.G, §4.H).
//!
//! Mirrors `symreg-core`'s flat module-plus-re-export layout: each concern
//! (creation, crossover, mutation, the scratch arena they share) gets its
//! own file, with the crate root exposing the public surface other crates
//! reach for.

pub mod arena;
pub mod creators;
pub mod crossover;
pub mod mutation;

pub use arena::{Arena, ArenaNode};
pub use creators::{balanced, grow, ptc2};
pub use crossover::subtree_crossover;
pub use mutation::{
    MultiMutation, MutationKind, change_function, change_variable, discrete_point, insert_subtree,
    one_point, remove_subtree, replace_subtree, shuffle_subtrees,
};
