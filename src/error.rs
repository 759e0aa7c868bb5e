use crate::wallet::SignerError;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum MemVaultError {
    /// Wallet credential is unusable or a signature could not be produced.
    #[error("signing error: {0}")]
    Signing(#[from] SignerError),
    /// A single attempt exceeded the configured per-request deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// Network or request execution error from `reqwest` (no response received).
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Malformed 402 challenge or failure while building the payment.
    #[error("payment challenge error: {0}")]
    PaymentChallenge(String),
    /// Retry loop ended without a recorded error.
    #[error("request failed: retries exhausted")]
    RetriesExhausted,
    /// The call was cancelled by the caller.
    #[error("request cancelled")]
    Cancelled,
    /// Response decoding error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Request rejected before any network activity.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Missing or malformed configuration.
    #[error("config error: {0}")]
    Config(String),
}

/// HTTP statuses considered transient and therefore retried.
pub(crate) const TRANSIENT_STATUSES: [u16; 5] = [408, 429, 502, 503, 504];

pub(crate) fn is_transient_status(status: u16) -> bool {
    TRANSIENT_STATUSES.contains(&status)
}

impl MemVaultError {
    /// Returns `true` when the failure may succeed if the request is retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Http { status, .. } => is_transient_status(*status),
            _ => false,
        }
    }

    /// HTTP status for [`MemVaultError::Http`] errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
