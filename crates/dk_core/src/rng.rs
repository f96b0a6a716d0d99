//! Seedable draw RNG for the sampler and orchestrator.
//!
//! ChaCha20 under the hood. `from_seed_u64` maps the seed's little-endian bytes
//! into the first 8 bytes of the 32-byte ChaCha seed (rest zero), so a given
//! seed replays the same draws on every platform. Production callers seed from
//! OS entropy (`std` feature).

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};

#[derive(Debug, Clone)]
pub struct DrawRng {
    rng: ChaCha20Rng,
}

impl DrawRng {
    #[inline]
    pub fn from_seed_u64(seed: u64) -> Self {
        let mut seed32 = [0u8; 32];
        seed32[..8].copy_from_slice(&seed.to_le_bytes());
        Self {
            rng: ChaCha20Rng::from_seed(seed32),
        }
    }

    /// Seed from OS entropy.
    #[cfg(feature = "std")]
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    /// Uniform `f64` in `[0, 1)` from the top 53 bits of one word.
    #[inline]
    pub fn next_unit(&mut self) -> f64 {
        const SCALE: f64 = 1.0 / ((1u64 << 53) as f64);
        (self.next_u64() >> 11) as f64 * SCALE
    }

    /// Unbiased integer in `[0, n)`; `None` when `n == 0`.
    ///
    /// Threshold rejection: accept `x >= 2^64 mod n`, then `x % n` is uniform.
    pub fn gen_range(&mut self, n: u64) -> Option<u64> {
        if n == 0 {
            return None;
        }
        let threshold = n.wrapping_neg() % n;
        loop {
            let x = self.next_u64();
            if x >= threshold {
                return Some(x % n);
            }
        }
    }

    /// Uniform index into a slice of length `len`.
    #[inline]
    pub fn choose_index(&mut self, len: usize) -> Option<usize> {
        self.gen_range(len as u64).map(|i| i as usize)
    }
}
