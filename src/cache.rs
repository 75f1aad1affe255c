//! NFP cache (component C4): deterministic keyed store for computed NFPs.
//!
//! This is a plain value, never a process singleton — the evaluator owns
//! one `NfpCache` per nesting session and hands the placer a reference to
//! it.
//!
//! Reads and writes need to behave as if they deep-clone: every `Nfp` is
//! an owned `Vec`-of-`Vec`, so an ordinary `.clone()` already produces an
//! independent copy with no shared backing storage, giving that guarantee
//! for free.

use crate::nfp::{Nfp, NfpKey};
use std::collections::HashMap;
use std::sync::RwLock;

/// Single-writer (evaluator), many-reader (placer) NFP store. A
/// `RwLock<HashMap<..>>` gives thread-safe sharing without needing a
/// dedicated actor/channel, since all writes happen in
/// the evaluator's pair-insertion phase before the placer is ever invoked
/// for that individual.
pub struct NfpCache {
    store: RwLock<HashMap<String, Nfp>>,
}

impl NfpCache {
    pub fn new() -> Self {
        Self { store: RwLock::new(HashMap::new()) }
    }

    /// Look up `key`, returning an independent clone on hit.
    pub fn find(&self, key: &NfpKey) -> Option<Nfp> {
        self.store.read().expect("nfp cache poisoned").get(&key.cache_key()).cloned()
    }

    /// Insert `nfp` under `key`, cloning it into the store so the caller
    /// keeps an independent copy too.
    pub fn insert(&self, key: &NfpKey, nfp: Nfp) {
        self.store.write().expect("nfp cache poisoned").insert(key.cache_key(), nfp);
    }

    pub fn contains(&self, key: &NfpKey) -> bool {
        self.store.read().expect("nfp cache poisoned").contains_key(&key.cache_key())
    }

    /// Number of entries currently cached.
    pub fn stats(&self) -> usize {
        self.store.read().expect("nfp cache poisoned").len()
    }

    /// Drop every cached NFP. Called on `reset`.
    pub fn clear(&self) {
        self.store.write().expect("nfp cache poisoned").clear();
    }
}

impl Default for NfpCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::nfp::NfpShape;

    fn sample_key() -> NfpKey {
        NfpKey { a_source: 1, b_source: 2, a_rot: 0, b_rot: 90, a_flip: false, b_flip: false, inside: false }
    }

    #[test]
    fn insert_then_find_round_trips() {
        let cache = NfpCache::new();
        let key = sample_key();
        let shape = NfpShape { points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)], children: vec![] };
        cache.insert(&key, Nfp::Single(shape.clone()));
        let found = cache.find(&key).unwrap();
        match found {
            Nfp::Single(s) => assert_eq!(s.points, shape.points),
            Nfp::Many(_) => panic!("expected Single"),
        }
    }

    #[test]
    fn stats_counts_distinct_keys() {
        let cache = NfpCache::new();
        assert_eq!(cache.stats(), 0);
        let key = sample_key();
        let shape = NfpShape { points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)], children: vec![] };
        cache.insert(&key, Nfp::Single(shape.clone()));
        cache.find(&key);
        cache.find(&key);
        assert_eq!(cache.stats(), 1);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = NfpCache::new();
        let key = sample_key();
        let shape = NfpShape { points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)], children: vec![] };
        cache.insert(&key, Nfp::Single(shape));
        assert_eq!(cache.stats(), 1);
        cache.clear();
        assert_eq!(cache.stats(), 0);
    }
}
