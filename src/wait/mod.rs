//! Think-time policies applied between session iterations.
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ValidationError;


/// Stateless delay policy shared by every session of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeStrategy {
    Constant(Duration),
    Between(WaitRange),
}

/// Closed interval `[low, high]`. Only built through
/// [`WaitTimeStrategy::between`], which rejects `low > high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRange {
    low: Duration,
    high: Duration,
}

impl WaitRange {
    #[must_use]
    pub const fn low(&self) -> Duration {
        self.low
    }

    #[must_use]
    pub const fn high(&self) -> Duration {
        self.high
    }
}

impl WaitTimeStrategy {
    #[must_use]
    pub const fn constant(delay: Duration) -> Self {
        WaitTimeStrategy::Constant(delay)
    }

    /// Uniform delay within the closed interval `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns `WaitRangeInverted` when `low > high`.
    pub fn between(low: Duration, high: Duration) -> Result<Self, ValidationError> {
        if low > high {
            return Err(ValidationError::WaitRangeInverted { low, high });
        }
        Ok(WaitTimeStrategy::Between(WaitRange { low, high }))
    }

    /// Per-session sampler. With a seed, each session id maps to its own
    /// reproducible stream.
    #[must_use]
    pub fn sampler(self, seed: Option<u64>, session_id: u64) -> WaitSampler {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(mix_seed(seed, session_id)),
            None => StdRng::from_entropy(),
        };
        WaitSampler {
            strategy: self,
            rng,
        }
    }
}

#[derive(Debug)]
pub struct WaitSampler {
    strategy: WaitTimeStrategy,
    rng: StdRng,
}

impl WaitSampler {
    pub fn next_delay(&mut self) -> Duration {
        match self.strategy {
            WaitTimeStrategy::Constant(delay) => delay,
            WaitTimeStrategy::Between(range) => {
                let low_nanos = u64::try_from(range.low.as_nanos()).unwrap_or(u64::MAX);
                let high_nanos = u64::try_from(range.high.as_nanos()).unwrap_or(u64::MAX);
                // Ordered here too, so an empty range can never reach `gen_range`.
                let (from, to) = (low_nanos.min(high_nanos), low_nanos.max(high_nanos));
                Duration::from_nanos(self.rng.gen_range(from..=to))
            }
        }
    }
}

// splitmix64 finalizer so neighbouring session ids get unrelated streams.
const fn mix_seed(seed: u64, session_id: u64) -> u64 {
    let mut value = seed ^ session_id.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value = (value ^ (value >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    value ^ (value >> 31)
}
