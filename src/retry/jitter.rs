use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Jitter Sources
// ============================================================================
//
// Randomness used to spread retries out. Policies hold an Arc<dyn JitterSource>
// so tests can swap in a seeded generator and get reproducible delays.
//
// ============================================================================

/// Uniform random offsets for backoff delays
pub trait JitterSource: Send + Sync {
    /// Uniform draw from `[-spread, +spread]`; `spread` is in seconds and non-negative
    fn offset(&self, spread: f64) -> f64;
}

/// Thread-local RNG. The default for production policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn offset(&self, spread: f64) -> f64 {
        if spread <= 0.0 || !spread.is_finite() {
            return 0.0;
        }
        rand::thread_rng().gen_range(-spread..=spread)
    }
}

/// Deterministic jitter from a seeded `StdRng`
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn offset(&self, spread: f64) -> f64 {
        if spread <= 0.0 || !spread.is_finite() {
            return 0.0;
        }
        // a panic mid-draw leaves the generator usable
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen_range(-spread..=spread)
    }
}

impl fmt::Debug for SeededJitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeededJitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_spread_is_zero() {
        assert_eq!(ThreadRngJitter.offset(0.0), 0.0);
        assert_eq!(SeededJitter::new(1).offset(0.0), 0.0);
    }

    #[test]
    fn test_offsets_stay_within_spread() {
        let jitter = ThreadRngJitter;
        for _ in 0..1_000 {
            let offset = jitter.offset(0.5);
            assert!((-0.5..=0.5).contains(&offset), "offset {offset} out of range");
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        for _ in 0..10 {
            assert_eq!(a.offset(1.0), b.offset(1.0));
        }
    }

    #[test]
    fn test_offsets_cover_both_signs() {
        let jitter = SeededJitter::new(7);
        let draws: Vec<f64> = (0..200).map(|_| jitter.offset(1.0)).collect();
        assert!(draws.iter().any(|d| *d < 0.0));
        assert!(draws.iter().any(|d| *d > 0.0));
    }
}
