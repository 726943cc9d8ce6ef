//! Deterministic random number generation for a simulation run.
//!
//! Each [`Simulator`](super::Simulator) owns one [`SimRng`] seeded from its
//! configuration. Models draw from it through `Simulator::rng()`, so two runs
//! with the same seed and the same scheduling history see the same values.

use std::ops::Range;

use rand::{
    distributions::{uniform::SampleUniform, Distribution, Standard},
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;

use netsim_core::Time;

/// Seeded random number generator owned by a simulator.
///
/// Uses ChaCha8Rng for deterministic, reproducible randomness.
#[derive(Debug, Clone)]
pub struct SimRng {
    rng: ChaCha8Rng,
    seed: u64,
    calls: u64,
}

impl SimRng {
    /// Creates a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            calls: 0,
        }
    }

    /// Restarts the sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = SimRng::new(seed);
    }

    /// The seed the current sequence started from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of values drawn since the last (re)seed.
    pub fn call_count(&self) -> u64 {
        self.calls
    }

    /// Generate a random value of any type with a standard distribution.
    pub fn random<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        self.calls += 1;
        self.rng.gen()
    }

    /// Generate a random value within `range` (exclusive upper bound).
    ///
    /// # Panics
    ///
    /// Panics if the range is empty.
    pub fn random_range<T>(&mut self, range: Range<T>) -> T
    where
        T: SampleUniform + PartialOrd,
    {
        self.calls += 1;
        self.rng.gen_range(range)
    }

    /// Like [`SimRng::random_range`], returning the start value for an empty range.
    pub fn random_range_or_default<T>(&mut self, range: Range<T>) -> T
    where
        T: SampleUniform + PartialOrd + Clone,
    {
        if range.start >= range.end {
            range.start
        } else {
            self.random_range(range)
        }
    }

    /// A uniform value in `[0, 1)`.
    pub fn random_f64(&mut self) -> f64 {
        self.random::<f64>()
    }

    /// A uniform time in `[low, high)`, or `low` if the interval is empty.
    pub fn random_time_between(&mut self, low: Time, high: Time) -> Time {
        Time::from_femtos(self.random_range_or_default(low.as_femtos()..high.as_femtos()))
    }
}
