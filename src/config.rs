use std::fmt;

use crate::{ClientOptions, MemVaultError, Result};

pub const ENV_API_URL: &str = "MEMVAULT_API_URL";
pub const ENV_WALLET_KEY: &str = "MEMVAULT_WALLET_KEY";
pub const ENV_TIMEOUT_MS: &str = "MEMVAULT_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "MEMVAULT_MAX_RETRIES";

/// Process-level client configuration, created once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend origin, without trailing `/`.
    pub base_url: String,
    /// Hex private key of the paying wallet.
    pub wallet_key: String,
    pub options: ClientOptions,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("wallet_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl AsRef<str>, wallet_key: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            wallet_key: wallet_key.into(),
            options: ClientOptions::default(),
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// Reads:
    /// - `MEMVAULT_API_URL` — backend origin (required)
    /// - `MEMVAULT_WALLET_KEY` — wallet private key (required)
    /// - `MEMVAULT_TIMEOUT_MS` — per-attempt timeout, default 30000
    /// - `MEMVAULT_MAX_RETRIES` — retries after the first attempt, default 3
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = required(&lookup, ENV_API_URL)?;
        let wallet_key = required(&lookup, ENV_WALLET_KEY)?;

        let mut config = Self::new(base_url, wallet_key);
        if let Some(timeout_ms) = optional_number(&lookup, ENV_TIMEOUT_MS)? {
            config.options.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = optional_number(&lookup, ENV_MAX_RETRIES)? {
            config.options.max_retries = max_retries;
        }
        Ok(config)
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }
}

pub(crate) fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_owned()),
        Some(_) => Err(MemVaultError::Config(format!("{name} is set but empty"))),
        None => Err(MemVaultError::Config(format!(
            "missing {name} environment variable"
        ))),
    }
}

fn optional_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(name).filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|_| {
        MemVaultError::Config(format!(
            "{name} must be a non-negative integer, got '{raw}'"
        ))
    })
}
