//! Seed fixing for reproducible runs
//!
//! `set_seed` seeds every generator the process can use, in a fixed order,
//! and hands them back as an explicit `SeedContext`. Stochastic components
//! take their seed from the context (or its `seed`) rather than from hidden
//! global state.

use crate::capabilities::{capabilities, Capabilities};
use crate::deterministic::{LcgRng, SeededHashState, HASH_SEED_ENV};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/// Generators owned by the parallel training runtime
#[derive(Debug, Clone)]
pub struct RuntimeGenerators {
    /// Host-side generator
    pub host: StdRng,
    /// One generator per visible accelerator, all seeded identically
    pub devices: Vec<StdRng>,
}

/// Every generator seeded by `set_seed`
#[derive(Debug, Clone)]
pub struct SeedContext {
    pub seed: u64,
    /// General-purpose generator
    pub general: StdRng,
    /// Numeric-array generator
    pub numeric: LcgRng,
    /// Hasher keyed by the exported hash seed
    pub hash_state: SeededHashState,
    /// Present only when the parallel runtime is compiled in
    pub runtime: Option<RuntimeGenerators>,
}

/// Seed all available generators using the process-wide capability flags
pub fn set_seed(seed: u64) -> SeedContext {
    set_seed_with(seed, capabilities())
}

/// Seed all generators available under `caps`.
///
/// Order: general generator, numeric generator, `KSTARTER_HASH_SEED`, then the
/// runtime host generator and one generator per accelerator.
pub fn set_seed_with(seed: u64, caps: &Capabilities) -> SeedContext {
    let general = StdRng::seed_from_u64(seed);
    let numeric = LcgRng::new(seed);

    std::env::set_var(HASH_SEED_ENV, seed.to_string());
    let hash_state = SeededHashState::new(seed);

    let runtime = caps.parallel_runtime.then(|| RuntimeGenerators {
        host: StdRng::seed_from_u64(seed),
        devices: caps
            .accelerators
            .iter()
            .map(|_| StdRng::seed_from_u64(seed))
            .collect(),
    });

    debug!(
        seed,
        runtime = runtime.is_some(),
        devices = runtime.as_ref().map_or(0, |r| r.devices.len()),
        "seeded generators"
    );

    SeedContext {
        seed,
        general,
        numeric,
        hash_state,
        runtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::AcceleratorInfo;
    use rand::Rng;

    fn caps(parallel_runtime: bool, gpus: usize) -> Capabilities {
        Capabilities {
            parallel_runtime,
            worker_threads: 1,
            accelerators: (0..gpus)
                .map(|index| AcceleratorInfo {
                    index,
                    name: format!("gpu{index}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = set_seed(42);
        let mut b = set_seed(42);

        let draws_a: Vec<u64> = (0..16).map(|_| a.general.gen()).collect();
        let draws_b: Vec<u64> = (0..16).map(|_| b.general.gen()).collect();
        assert_eq!(draws_a, draws_b);

        assert_eq!(a.numeric.next_u64(), b.numeric.next_u64());
    }

    #[test]
    fn test_different_seed_different_draws() {
        let mut a = set_seed(1);
        let mut b = set_seed(2);
        let x: u64 = a.general.gen();
        let y: u64 = b.general.gen();
        assert_ne!(x, y);
    }

    #[test]
    fn test_exports_hash_seed() {
        let ctx = set_seed(1234);
        assert_eq!(ctx.hash_state.seed(), 1234);

        // other tests seed concurrently, so only the presence is stable here
        let exported = std::env::var(HASH_SEED_ENV).unwrap();
        assert!(exported.parse::<u64>().is_ok());
    }

    #[test]
    fn test_degrades_without_runtime() {
        let ctx = set_seed_with(5, &caps(false, 2));
        assert!(ctx.runtime.is_none());
    }

    #[test]
    fn test_seeds_every_device() {
        let ctx = set_seed_with(5, &caps(true, 3));
        let runtime = ctx.runtime.unwrap();
        assert_eq!(runtime.devices.len(), 3);

        let mut firsts = runtime.devices.into_iter().map(|mut rng| rng.gen::<u32>());
        let first = firsts.next().unwrap();
        assert!(firsts.all(|v| v == first));
    }

    #[test]
    fn test_runtime_without_accelerators() {
        let ctx = set_seed_with(5, &caps(true, 0));
        let runtime = ctx.runtime.unwrap();
        assert!(runtime.devices.is_empty());
    }
}
