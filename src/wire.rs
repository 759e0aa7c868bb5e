//! x402 payment wire types.
//!
//! Version 2 challenges arrive base64-encoded in the `PAYMENT-REQUIRED`
//! response header; version 1 challenges arrive as the JSON response body.

use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::{MemVaultError, Result};

/// Response header carrying a version 2 challenge.
pub const PAYMENT_REQUIRED_HEADER: &str = "payment-required";
/// Request header carrying a version 2 payment payload.
pub const PAYMENT_SIGNATURE_HEADER: &str = "payment-signature";
/// Request header carrying a version 1 payment payload.
pub const X_PAYMENT_HEADER: &str = "x-payment";

/// Only scheme this crate can pay with.
pub const EXACT_SCHEME: &str = "exact";

fn default_version() -> u8 {
    1
}

/// Payment requirements returned by the server in a 402 response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    #[serde(default = "default_version")]
    pub x402_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
}

/// One accepted way to pay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: String,
    /// Atomic token units, decimal string.
    #[serde(alias = "maxAmountRequired")]
    pub amount: String,
    /// Token contract address.
    pub asset: String,
    #[serde(alias = "payToAddress")]
    pub pay_to: String,
    #[serde(default)]
    pub max_timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirements {
    /// Reads a string from the scheme-specific `extra` object.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.as_ref()?.get(key)?.as_str()
    }
}

/// Signed payment sent back with the retried request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u8,
    /// Version 1 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Version 1 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    /// Version 2 only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
    /// Version 2 only: the requirement being paid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted: Option<PaymentRequirements>,
    pub payload: ExactEvmPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: String,
    pub authorization: Eip3009Authorization,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: String,
    pub to: String,
    pub value: String,
    pub valid_after: String,
    pub valid_before: String,
    pub nonce: String,
}

impl PaymentRequired {
    /// Decodes a base64 JSON `PAYMENT-REQUIRED` header value.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = b64.decode(encoded.trim()).map_err(|err| {
            MemVaultError::PaymentChallenge(format!("payment-required header is not base64: {err}"))
        })?;
        serde_json::from_slice(&decoded).map_err(|err| {
            MemVaultError::PaymentChallenge(format!("payment-required header is not valid: {err}"))
        })
    }
}

impl PaymentPayload {
    /// Encodes the payload as base64 JSON for the payment request header.
    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_vec(self).map_err(|err| {
            MemVaultError::PaymentChallenge(format!("failed to serialize payment payload: {err}"))
        })?;
        Ok(b64.encode(json))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let decoded = b64.decode(encoded.trim()).map_err(|err| {
            MemVaultError::PaymentChallenge(format!("payment header is not base64: {err}"))
        })?;
        serde_json::from_slice(&decoded).map_err(|err| {
            MemVaultError::PaymentChallenge(format!("payment header is not valid: {err}"))
        })
    }
}
