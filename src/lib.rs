//! `memvault-http` is a resilient async HTTP client for the MemVault memory API.
//!
//! Every logical call goes through [`MemVaultClient::send`], which:
//! - signs a fresh `x-wallet-auth` header (free-tier wallet authentication),
//! - bounds each attempt with a deadline and retries transient failures
//!   with exponential backoff and jitter,
//! - answers `402 Payment Required` challenges with a signed x402 payment
//!   and re-issues the request once.
//!
//! Typed memory and graph operations are layered on top:
//! [`MemVaultClient::store_memory`], [`MemVaultClient::search_memories`],
//! [`MemVaultClient::related_memories`] and friends.

mod backoff;
mod client;
mod config;
mod eip712;
mod error;
mod memory;
mod options;
mod outcome;
mod payment;
mod request;
mod types;
mod wallet;
pub mod wire;

pub use backoff::{backoff, Backoff};
pub use client::{MemVaultClient, WALLET_AUTH_HEADER};
pub use config::ClientConfig;
pub use eip712::{Eip712Domain, TransferWithAuthorization};
pub use error::MemVaultError;
pub use memory::BULK_CONCURRENCY;
pub use options::ClientOptions;
pub use outcome::CallOutcome;
pub use payment::{chain_id_for_network, HeaderLookup, PaymentHandler, X402PaymentHandler};
pub use request::{Method, RequestSpec};
pub use types::{Memory, MemoryLink, MemoryUpdate, NewMemory, RelatedMemory, SearchHit, SearchQuery};
pub use wallet::{
    personal_message_hash, recover_address, SignerError, WalletSignature, WalletSigner,
    AUTH_MESSAGE_PREFIX,
};

pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, MemVaultError>;
