//! Exponential backoff with bounded random jitter.

use std::time::Duration;

use rand::Rng;

const DEFAULT_BASE_MS: u64 = 1_000;
const DEFAULT_JITTER_MS: u64 = 500;
const MAX_EXPONENT: u32 = 16;

/// Maps a retry index to a wait duration: `base * 2^index + U[0, jitter)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Backoff {
    pub base_ms: u64,
    pub jitter_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BASE_MS,
            jitter_ms: DEFAULT_JITTER_MS,
        }
    }
}

impl Backoff {
    /// Wait before retry number `attempt + 1` (`attempt` is 0-based).
    pub fn delay(&self, attempt: usize) -> Duration {
        let exp = attempt.min(MAX_EXPONENT as usize) as u32;
        let delay_ms = self.base_ms.saturating_mul(1u64 << exp);
        let jitter_ms = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        };
        Duration::from_millis(delay_ms.saturating_add(jitter_ms))
    }
}

/// [`Backoff::delay`] with the default 1000 ms base and 500 ms jitter ceiling.
pub fn backoff(attempt: usize) -> Duration {
    Backoff::default().delay(attempt)
}
