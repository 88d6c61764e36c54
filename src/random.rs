//! Utilities related to random numbers.

use rand::{rngs::StdRng, RngCore, SeedableRng};

/// Random number generator used for all stochastic parts of the simulation.
pub type SimulationRng = StdRng;

/// Draws a fresh seed from system entropy.
pub fn draw_random_seed() -> u64 {
    u64::from(rand::random::<u32>())
}

/// Creates a generator from the given seed.
pub fn create_rng(seed: u64) -> SimulationRng {
    StdRng::seed_from_u64(seed)
}

/// Creates a generator whose stream is independent of, but fully
/// determined by, the given seed and stream index.
pub fn create_derived_rng(seed: u64, stream: u64) -> SimulationRng {
    let mut parent = StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    StdRng::seed_from_u64(parent.next_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_stream() {
        let mut rng_1 = create_rng(42);
        let mut rng_2 = create_rng(42);
        for _ in 0..10 {
            assert_eq!(rng_1.next_u64(), rng_2.next_u64());
        }
    }

    #[test]
    fn derived_streams_differ() {
        let mut rng_1 = create_derived_rng(42, 0);
        let mut rng_2 = create_derived_rng(42, 1);
        assert_ne!(rng_1.next_u64(), rng_2.next_u64());
    }
}
