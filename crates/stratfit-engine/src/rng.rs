//! Seeded linear-congruential generator.
//!
//! Paths must be reproducible bit for bit from a seed, independent of the
//! `rand` version in use, so the walk draws from this small generator
//! rather than a library RNG. It still implements `RngCore` and
//! `SeedableRng` so it plugs into anything that takes a `rand` generator.

use rand::{Error, RngCore, SeedableRng};
use rand_chacha::rand_core::impls;

const MULTIPLIER: u32 = 1_664_525;
const INCREMENT: u32 = 1_013_904_223;
const SCALE: f64 = 4_294_967_296.0; // 2^32

/// 32-bit LCG with the Numerical Recipes constants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self {
            state: (seed ^ (seed >> 32)) as u32,
        }
    }

    fn step(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }

    /// Uniform draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.step()) / SCALE
    }

    /// Bernoulli trial: true with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

impl RngCore for Lcg {
    fn next_u32(&mut self) -> u32 {
        self.step()
    }

    fn next_u64(&mut self) -> u64 {
        impls::next_u64_via_u32(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Lcg {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u32::from_le_bytes(seed),
        }
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}
