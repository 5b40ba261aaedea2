//! Deterministic utilities for reproducible training
//!
//! Provides an LCG-based numeric generator, a seed-keyed hasher for
//! hash-order-dependent maps, and split tie-breaking.

use std::hash::{BuildHasher, Hasher};
use std::num::Wrapping;

/// Environment variable carrying the hash-ordering seed
pub const HASH_SEED_ENV: &str = "KSTARTER_HASH_SEED";

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 1103515245;
    const INCREMENT: u64 = 12345;
    const MODULUS: u64 = 1 << 31;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping(seed % Self::MODULUS),
        }
    }

    /// Next value in `[0, 2^31)`
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Value in `[0, max)`; 0 when `max == 0`
    pub fn next_range(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        self.next_u64() % max
    }

    /// Uniform float in `[0, 1)`
    pub fn next_f64(&mut self) -> f64 {
        self.next_u64() as f64 / Self::MODULUS as f64
    }
}

const PRIME1: u64 = 0x9E3779B185EBCA87;
const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
const PRIME3: u64 = 0x165667B19E3779F9;
const PRIME5: u64 = 0x85EBCA77C2B2AE63;

/// Seed-keyed xxhash-style hasher
#[derive(Clone, Debug)]
pub struct SeededHasher {
    h: u64,
}

impl Hasher for SeededHasher {
    fn write(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(8) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            let val = u64::from_le_bytes(buf) ^ chunk.len() as u64;
            self.h = self.h.wrapping_add(val.wrapping_mul(PRIME3));
            self.h = self.h.rotate_left(17).wrapping_mul(PRIME2);
        }
    }

    fn finish(&self) -> u64 {
        let mut h = self.h;
        h ^= h >> 33;
        h = h.wrapping_mul(PRIME1);
        h ^= h >> 29;
        h = h.wrapping_mul(PRIME2);
        h ^= h >> 32;
        h
    }
}

/// `BuildHasher` whose iteration order depends only on the seed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeededHashState {
    seed: u64,
}

impl SeededHashState {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from `KSTARTER_HASH_SEED`, or 0 when unset or unparsable
    pub fn from_env() -> Self {
        let seed = std::env::var(HASH_SEED_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Self::new(seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for SeededHashState {
    fn default() -> Self {
        Self::from_env()
    }
}

impl BuildHasher for SeededHashState {
    type Hasher = SeededHasher;

    fn build_hasher(&self) -> SeededHasher {
        SeededHasher {
            h: self.seed.wrapping_add(PRIME5),
        }
    }
}

/// Deterministic tie-breaker for split selection
/// Lower (feature_idx, bin) wins between equal gains
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub bin: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, bin: usize) -> Self {
        Self { feature_idx, bin }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..100 {
            assert!(rng.next_range(10) < 10);
            let f = rng.next_f64();
            assert!((0.0..1.0).contains(&f));
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_hash_depends_on_seed() {
        let hash = |seed: u64| SeededHashState::new(seed).hash_one("Heart Disease");
        assert_eq!(hash(42), hash(42));
        assert_ne!(hash(42), hash(43));
    }

    #[test]
    fn test_map_iteration_is_reproducible() {
        let keys = ["age", "sex", "chest_pain", "bp", "cholesterol", "fbs"];
        let order = || {
            let mut map: HashMap<&str, usize, SeededHashState> =
                HashMap::with_hasher(SeededHashState::new(7));
            for (i, k) in keys.iter().enumerate() {
                map.insert(k, i);
            }
            map.into_iter().map(|(k, _)| k).collect::<Vec<_>>()
        };
        assert_eq!(order(), order());
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 100);
        let t2 = SplitTieBreaker::new(0, 101);
        let t3 = SplitTieBreaker::new(1, 3);

        assert!(t1 < t2);
        assert!(t2 < t3);
    }
}
