//! Wallet signer used for free-tier authentication and payment signatures.
//!
//! Signatures are Ethereum-compatible: 65 bytes `r || s || v` with
//! `v = 27 + recovery_id`.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

/// Prefix of the message signed for the `x-wallet-auth` header.
pub const AUTH_MESSAGE_PREFIX: &str = "memvault-auth:";

/// Errors that can occur while loading a key or signing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    #[error("invalid private key")]
    InvalidKey,
    #[error("invalid hex string")]
    InvalidHex,
    #[error("signing failed")]
    SigningFailed,
    #[error("invalid signature format")]
    InvalidSignature,
    #[error("signature recovery failed")]
    RecoveryFailed,
}

/// A 65-byte recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WalletSignature(pub [u8; 65]);

impl WalletSignature {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for WalletSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for WalletSignature {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes =
            hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| SignerError::InvalidHex)?;
        let bytes: [u8; 65] = bytes
            .try_into()
            .map_err(|_| SignerError::InvalidSignature)?;
        Ok(Self(bytes))
    }
}

/// Holds the wallet private key and produces signatures on demand.
///
/// Signing only reads the key, so one signer can be shared by concurrent calls.
#[derive(Clone)]
pub struct WalletSigner {
    key: SigningKey,
    address: Address,
}

impl WalletSigner {
    /// Parses a hex private key, with or without `0x` prefix.
    pub fn from_private_key(private_key: &str) -> Result<Self, SignerError> {
        let trimmed = private_key.trim();
        let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_key).map_err(|_| SignerError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    /// Creates a signer from raw 32-byte key material.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignerError> {
        if bytes.len() != 32 {
            return Err(SignerError::InvalidKey);
        }
        let key = SigningKey::from_slice(bytes).map_err(|_| SignerError::InvalidKey)?;
        let address = address_from_verifying_key(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Signs a 32-byte prehash.
    pub fn sign_hash(&self, hash: &B256) -> Result<WalletSignature, SignerError> {
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(hash.as_slice())
            .map_err(|_| SignerError::SigningFailed)?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte() + 27;
        Ok(WalletSignature(bytes))
    }

    /// Signs `message` as an EIP-191 personal message.
    pub fn sign_message(&self, message: &[u8]) -> Result<WalletSignature, SignerError> {
        self.sign_hash(&personal_message_hash(message))
    }

    /// Builds the `x-wallet-auth` value `address:timestamp:signature`.
    ///
    /// The signature binds to `timestamp`, so callers must pass a fresh value
    /// on every attempt.
    pub fn auth_header(&self, timestamp: u64) -> Result<String, SignerError> {
        let message = format!("{AUTH_MESSAGE_PREFIX}{timestamp}");
        let signature = self.sign_message(message.as_bytes())?;
        Ok(format!(
            "{}:{}:{}",
            self.address,
            timestamp,
            signature.to_hex()
        ))
    }
}

impl FromStr for WalletSigner {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_private_key(s)
    }
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// EIP-191 hash: `keccak256("\x19Ethereum Signed Message:\n" || len || message)`.
pub fn personal_message_hash(message: &[u8]) -> B256 {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Recovers the address that produced `signature` over `hash`.
pub fn recover_address(hash: &B256, signature: &WalletSignature) -> Result<Address, SignerError> {
    let bytes = signature.as_bytes();
    let sig = Signature::from_slice(&bytes[..64]).map_err(|_| SignerError::InvalidSignature)?;
    let v = bytes[64];
    let recovery_id = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })
        .ok_or(SignerError::RecoveryFailed)?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &sig, recovery_id)
        .map_err(|_| SignerError::RecoveryFailed)?;
    Ok(address_from_verifying_key(&key))
}

fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    // Uncompressed point is 0x04 || x || y; the address hashes x || y.
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
