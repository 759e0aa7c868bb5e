use crate::backoff::Backoff;

/// Configures HTTP timeout and retry behavior.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: usize,
    /// Base retry backoff in milliseconds (exponential strategy).
    pub retry_backoff_ms: u64,
    /// Upper bound (exclusive) of the random jitter added to each backoff.
    pub retry_jitter_ms: u64,
}

impl ClientOptions {
    pub(crate) fn backoff(&self) -> Backoff {
        Backoff {
            base_ms: self.retry_backoff_ms,
            jitter_ms: self.retry_jitter_ms,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            retry_jitter_ms: 500,
        }
    }
}
