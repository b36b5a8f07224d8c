//! Zobrist fingerprinting and the transposition cache (§3 "Transposition
//! cache", §9 "Zobrist singleton").
//!
//! The original keeps the Zobrist table behind a process-wide singleton;
//! per §9's redesign note this crate instead owns a [`ZobristTable`] per run,
//! constructed once by the algorithm driver from the run seed and threaded
//! explicitly into the offspring generator — no global mutable state escapes
//! a phase (§9, last bullet). The cache itself is grounded on a classic
//! sharded map (one `Mutex<HashMap>` per shard, key hashed to a shard index)
//! so concurrent workers only ever contend within a shard (§5: "exactly one
//! lock ... the shard lock of the transposition cache").

use std::collections::HashMap;
use std::sync::Mutex;
use symreg_core::{Node, Tree};

const MAX_POSITIONS: usize = 512;
const NUM_SHARDS: usize = 32;

fn split_mix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// A per-run table of random `u64`s indexed by `(node kind, position bucket)`
/// (§3: "XOR of per-node Zobrist values indexed by (node-type-index,
/// position)"). Positions beyond [`MAX_POSITIONS`] wrap, which only means
/// very deep/long trees share buckets — an acceptable approximation for a
/// fingerprint used to skip redundant fitness evaluation, not for exact
/// structural identity (that's [`Tree::hash`](symreg_core::Tree::hash)).
pub struct ZobristTable {
    values: Vec<u64>,
    num_kinds: usize,
}

impl ZobristTable {
    pub fn new(seed: u64) -> Self {
        let num_kinds = symreg_core::ALL_NODE_KINDS.len();
        let mut state = seed;
        let values = (0..num_kinds * MAX_POSITIONS)
            .map(|_| {
                state = split_mix64(state);
                state
            })
            .collect();
        ZobristTable { values, num_kinds }
    }

    #[inline]
    fn value(&self, kind_index: usize, position: usize) -> u64 {
        self.values[kind_index * MAX_POSITIONS + (position % MAX_POSITIONS)]
    }

    /// XORs this node's Zobrist value into `acc`, plus the bound variable
    /// hash for a variable leaf (§3).
    fn fold_node(&self, acc: &mut u64, node: &Node, position: usize) {
        let kind_index = symreg_core::ALL_NODE_KINDS
            .iter()
            .position(|k| *k == node.kind)
            .unwrap_or(0)
            .min(self.num_kinds - 1);
        *acc ^= self.value(kind_index, position);
        if let Some(var_hash) = node.variable {
            *acc ^= var_hash;
        }
    }

    /// Fingerprints `tree`'s whole structure (§3).
    pub fn fingerprint(&self, tree: &Tree) -> u64 {
        let mut acc = 0u64;
        for (position, node) in tree.nodes().iter().enumerate() {
            self.fold_node(&mut acc, node, position);
        }
        acc
    }
}

struct CacheEntry {
    fitness: Vec<f64>,
    hit_count: u64,
}

/// A bounded, sharded `fingerprint -> (fitness, hit_count)` memo (§3).
/// Cleared at the start of each run; lives only for that run's duration.
pub struct TranspositionCache {
    shards: Vec<Mutex<HashMap<u64, CacheEntry>>>,
    capacity_per_shard: usize,
}

impl TranspositionCache {
    pub fn new(capacity: usize) -> Self {
        let capacity_per_shard = (capacity / NUM_SHARDS).max(16);
        TranspositionCache {
            shards: (0..NUM_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            capacity_per_shard,
        }
    }

    fn shard_index(&self, fingerprint: u64) -> usize {
        (fingerprint as usize) % self.shards.len()
    }

    /// Looks up `fingerprint`. On hit, bumps the entry's hit counter and
    /// returns a clone of its cached fitness (§4.J step 6: "on hit, adopt
    /// cached fitness and skip re-evaluation").
    pub fn get(&self, fingerprint: u64) -> Option<Vec<f64>> {
        let shard = self.shards[self.shard_index(fingerprint)].lock().unwrap();
        shard.get(&fingerprint).map(|e| e.fitness.clone())
    }

    /// Inserts or refreshes the entry for `fingerprint`. Per the Open
    /// Questions disposition (§9), this is called on both the cache-hit and
    /// cache-miss paths of the offspring generator; a pre-existing entry has
    /// its hit counter bumped rather than being silently overwritten with
    /// stale data from a racing worker. Returns `true` if this call observed
    /// a pre-existing entry (a hit), `false` if it inserted fresh (a miss).
    pub fn insert_or_update(&self, fingerprint: u64, fitness: &[f64]) -> bool {
        let mut shard = self.shards[self.shard_index(fingerprint)].lock().unwrap();

        if let Some(entry) = shard.get_mut(&fingerprint) {
            entry.hit_count += 1;
            return true;
        }

        if shard.len() >= self.capacity_per_shard {
            // Evict an arbitrary entry rather than growing unbounded; the
            // cache is a memo, not a source of truth.
            if let Some(&victim) = shard.keys().next() {
                shard.remove(&victim);
            }
        }

        shard.insert(fingerprint, CacheEntry { fitness: fitness.to_vec(), hit_count: 0 });
        false
    }

    pub fn hit_count(&self, fingerprint: u64) -> u64 {
        let shard = self.shards[self.shard_index(fingerprint)].lock().unwrap();
        shard.get(&fingerprint).map(|e| e.hit_count).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symreg_core::{Node, NodeKind};

    fn sum_tree(hashes: [u64; 2]) -> Tree {
        Tree::from_postfix(vec![
            Node::variable(hashes[0], 1.0),
            Node::variable(hashes[1], 1.0),
            Node::function(NodeKind::Add, 2),
        ])
        .unwrap()
    }

    #[test]
    fn identical_structures_fingerprint_identically() {
        let table = ZobristTable::new(1234);
        let a = sum_tree([1, 2]);
        let b = sum_tree([1, 2]);
        assert_eq!(table.fingerprint(&a), table.fingerprint(&b));
    }

    #[test]
    fn different_variables_fingerprint_differently() {
        let table = ZobristTable::new(1234);
        let a = sum_tree([1, 2]);
        let b = sum_tree([1, 3]);
        assert_ne!(table.fingerprint(&a), table.fingerprint(&b));
    }

    #[test]
    fn cache_hit_returns_the_same_fitness_as_the_original_insert() {
        let cache = TranspositionCache::new(1024);
        let fp = 42u64;
        assert!(!cache.insert_or_update(fp, &[1.0, 2.0]));
        assert!(cache.insert_or_update(fp, &[9.0, 9.0]));
        assert_eq!(cache.get(fp), Some(vec![1.0, 2.0]));
        assert_eq!(cache.hit_count(fp), 1);
    }

    #[test]
    fn miss_then_lookup_round_trips() {
        let cache = TranspositionCache::new(1024);
        assert!(cache.get(7).is_none());
        cache.insert_or_update(7, &[3.0]);
        assert_eq!(cache.get(7), Some(vec![3.0]));
    }
}
