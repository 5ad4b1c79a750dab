//! Pseudo-random source used to seed and recycle particles.
//!
//! Scenes never reach for a global RNG. They take a `&mut dyn RandomSource`
//! so tests can feed them fixed sequences.

use rand::rngs::{SmallRng, StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// A source of uniform samples in `[0, 1)`.
pub trait RandomSource {
    /// Next sample in `[0, 1)`.
    fn next_f32(&mut self) -> f32;

    /// Sample centered on zero: `(r - 0.5) * extent`.
    #[inline]
    fn centered(&mut self, extent: f32) -> f32 {
        (self.next_f32() - 0.5) * extent
    }

    /// Sample in `[min, min + span)`.
    #[inline]
    fn span(&mut self, min: f32, span: f32) -> f32 {
        self.next_f32() * span + min
    }
}

impl RandomSource for SmallRng {
    #[inline]
    fn next_f32(&mut self) -> f32 {
        self.gen()
    }
}

impl RandomSource for StdRng {
    #[inline]
    fn next_f32(&mut self) -> f32 {
        self.gen()
    }
}

impl RandomSource for ThreadRng {
    #[inline]
    fn next_f32(&mut self) -> f32 {
        self.gen()
    }
}

/// RNG seeded from the wall clock, different on every run.
pub fn from_entropy() -> SmallRng {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42);
    SmallRng::seed_from_u64(seed)
}
