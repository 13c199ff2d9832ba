//! Deterministic RNG wrapper used by every sample generator.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::seed::BatchKey;

/// Deterministic RNG handle exposed to preagg consumers.
///
/// The handle is a thin wrapper around `StdRng`. Generators never seed from
/// entropy: the seed is either supplied by the caller or derived from a
/// [`BatchKey`], so two runs over the same batch draw identical samples.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Creates a new RNG handle from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates the RNG handle for a batch.
    pub fn for_batch(batch: BatchKey) -> Self {
        Self::from_seed(batch.seed())
    }

    /// Returns a mutable reference to the underlying RNG for advanced usage.
    pub fn inner_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}
