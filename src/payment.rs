//! Payment challenge handling for 402 responses.
//!
//! A challenge is handled in three strictly sequential steps:
//! [`PaymentHandler::build_challenge`], [`PaymentHandler::create_payload`]
//! and [`PaymentHandler::encode_headers`]. Any failure is fatal for the
//! current call.

use std::time::{SystemTime, UNIX_EPOCH};

use alloy_primitives::{Address, B256, U256};
use rand::RngCore;

use crate::{
    eip712::{Eip712Domain, TransferWithAuthorization},
    wallet::WalletSigner,
    wire::{
        Eip3009Authorization, ExactEvmPayload, PaymentPayload, PaymentRequired,
        PaymentRequirements, EXACT_SCHEME, PAYMENT_REQUIRED_HEADER, PAYMENT_SIGNATURE_HEADER,
        X_PAYMENT_HEADER,
    },
    MemVaultError, Result,
};

const DEFAULT_TOKEN_NAME: &str = "USD Coin";
const DEFAULT_TOKEN_VERSION: &str = "2";
const MIN_VALIDITY_SECS: u64 = 60;
// Tolerates clock skew between this host and the settling chain.
const VALID_AFTER_SKEW_SECS: u64 = 600;

/// Header lookup by case-insensitive name, decoupled from any HTTP client.
pub type HeaderLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Builds payment headers from a 402 challenge.
pub trait PaymentHandler: Send + Sync {
    /// Parses the challenge from the `PAYMENT-REQUIRED` header, falling back
    /// to the JSON response body.
    fn build_challenge(&self, headers: HeaderLookup<'_>, body: &str) -> Result<PaymentRequired> {
        let challenge = match headers(PAYMENT_REQUIRED_HEADER) {
            Some(encoded) => PaymentRequired::from_base64(&encoded)?,
            None => serde_json::from_str::<PaymentRequired>(body).map_err(|err| {
                MemVaultError::PaymentChallenge(format!(
                    "402 response carries no readable payment requirements: {err}"
                ))
            })?,
        };
        if challenge.accepts.is_empty() {
            return Err(MemVaultError::PaymentChallenge(
                "402 response lists no payment options".to_owned(),
            ));
        }
        Ok(challenge)
    }

    /// Produces a signed payment for one of the challenge's options.
    fn create_payload(&self, challenge: &PaymentRequired) -> Result<PaymentPayload>;

    /// Encodes the payload into request headers.
    fn encode_headers(&self, payload: &PaymentPayload) -> Result<Vec<(String, String)>> {
        let name = if payload.x402_version >= 2 {
            PAYMENT_SIGNATURE_HEADER
        } else {
            X_PAYMENT_HEADER
        };
        Ok(vec![(name.to_owned(), payload.to_base64()?)])
    }
}

/// Resolves an x402 network name to an EVM chain id.
pub fn chain_id_for_network(network: &str) -> Option<u64> {
    match network {
        "base" => Some(8453),
        "base-sepolia" => Some(84532),
        other => other.strip_prefix("eip155:")?.parse().ok(),
    }
}

/// Pays `exact` EVM challenges with an EIP-3009 transfer authorization.
#[derive(Clone, Debug)]
pub struct X402PaymentHandler {
    signer: WalletSigner,
}

impl X402PaymentHandler {
    pub fn new(signer: WalletSigner) -> Self {
        Self { signer }
    }

    fn select<'a>(&self, challenge: &'a PaymentRequired) -> Result<(&'a PaymentRequirements, u64)> {
        challenge
            .accepts
            .iter()
            .filter(|req| req.scheme == EXACT_SCHEME)
            .find_map(|req| chain_id_for_network(&req.network).map(|chain_id| (req, chain_id)))
            .ok_or_else(|| {
                let offered: Vec<String> = challenge
                    .accepts
                    .iter()
                    .map(|req| format!("{}/{}", req.scheme, req.network))
                    .collect();
                MemVaultError::PaymentChallenge(format!(
                    "no supported payment option (offered: {})",
                    offered.join(", ")
                ))
            })
    }
}

impl PaymentHandler for X402PaymentHandler {
    fn create_payload(&self, challenge: &PaymentRequired) -> Result<PaymentPayload> {
        let (requirements, chain_id) = self.select(challenge)?;

        let pay_to = parse_address("payTo", &requirements.pay_to)?;
        let asset = parse_address("asset", &requirements.asset)?;
        let value = requirements.amount.parse::<U256>().map_err(|err| {
            MemVaultError::PaymentChallenge(format!(
                "invalid amount '{}': {err}",
                requirements.amount
            ))
        })?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| MemVaultError::PaymentChallenge(format!("clock error: {err}")))?
            .as_secs();
        let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECS);
        let valid_before = now
            .checked_add(requirements.max_timeout_seconds.max(MIN_VALIDITY_SECS))
            .ok_or_else(|| {
                MemVaultError::PaymentChallenge(format!(
                    "maxTimeoutSeconds out of range: {}",
                    requirements.max_timeout_seconds
                ))
            })?;

        let mut nonce = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut nonce);
        let nonce = B256::from(nonce);

        let domain = Eip712Domain {
            name: requirements
                .extra_str("name")
                .unwrap_or(DEFAULT_TOKEN_NAME)
                .to_owned(),
            version: requirements
                .extra_str("version")
                .unwrap_or(DEFAULT_TOKEN_VERSION)
                .to_owned(),
            chain_id,
            verifying_contract: asset,
        };
        let message = TransferWithAuthorization {
            from: self.signer.address(),
            to: pay_to,
            value,
            valid_after,
            valid_before,
            nonce,
        };

        let signature = self
            .signer
            .sign_hash(&message.signing_hash(&domain))
            .map_err(|err| MemVaultError::PaymentChallenge(format!("payment signing failed: {err}")))?;

        let payload = ExactEvmPayload {
            signature: signature.to_hex(),
            authorization: Eip3009Authorization {
                from: self.signer.address().to_string(),
                to: requirements.pay_to.clone(),
                value: value.to_string(),
                valid_after: valid_after.to_string(),
                valid_before: valid_before.to_string(),
                nonce: format!("0x{}", hex::encode(nonce)),
            },
        };

        Ok(if challenge.x402_version >= 2 {
            PaymentPayload {
                x402_version: challenge.x402_version,
                scheme: None,
                network: None,
                resource: challenge.resource.clone(),
                accepted: Some(requirements.clone()),
                payload,
            }
        } else {
            PaymentPayload {
                x402_version: challenge.x402_version,
                scheme: Some(requirements.scheme.clone()),
                network: Some(requirements.network.clone()),
                resource: None,
                accepted: None,
                payload,
            }
        })
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|err| MemVaultError::PaymentChallenge(format!("invalid {field} '{value}': {err}")))
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as b64;
    use base64::Engine;
    use serde_json::json;

    use super::*;
    use crate::wallet::{recover_address, WalletSignature};

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";
    const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

    fn handler() -> X402PaymentHandler {
        X402PaymentHandler::new(WalletSigner::from_private_key(KEY).unwrap())
    }

    fn v2_challenge() -> serde_json::Value {
        json!({
            "x402Version": 2,
            "resource": { "url": "https://api.example/memories" },
            "accepts": [
                {
                    "scheme": "upto",
                    "network": "eip155:8453",
                    "amount": "1",
                    "asset": USDC_BASE,
                    "payTo": PAY_TO
                },
                {
                    "scheme": "exact",
                    "network": "eip155:8453",
                    "amount": "2500",
                    "asset": USDC_BASE,
                    "payTo": PAY_TO,
                    "maxTimeoutSeconds": 300,
                    "extra": { "name": "USD Coin", "version": "2" }
                }
            ]
        })
    }

    fn no_headers(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn network_names_resolve_to_chain_ids() {
        assert_eq!(chain_id_for_network("base"), Some(8453));
        assert_eq!(chain_id_for_network("base-sepolia"), Some(84532));
        assert_eq!(chain_id_for_network("eip155:1"), Some(1));
        assert_eq!(chain_id_for_network("solana"), None);
        assert_eq!(chain_id_for_network("eip155:x"), None);
    }

    #[test]
    fn challenge_prefers_header_over_body() {
        let encoded = b64.encode(v2_challenge().to_string());
        let lookup = move |name: &str| (name == PAYMENT_REQUIRED_HEADER).then(|| encoded.clone());

        let challenge = handler()
            .build_challenge(&lookup, "not json at all")
            .unwrap();
        assert_eq!(challenge.x402_version, 2);
        assert_eq!(challenge.accepts.len(), 2);
    }

    #[test]
    fn challenge_falls_back_to_body() {
        let body = json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "base",
                "maxAmountRequired": "10",
                "asset": USDC_BASE,
                "payTo": PAY_TO
            }]
        })
        .to_string();

        let challenge = handler().build_challenge(&no_headers, &body).unwrap();
        assert_eq!(challenge.x402_version, 1);
        assert_eq!(challenge.accepts[0].amount, "10");
    }

    #[test]
    fn malformed_challenge_is_rejected() {
        let err = handler()
            .build_challenge(&no_headers, "<html>payment required</html>")
            .unwrap_err();
        assert!(matches!(err, MemVaultError::PaymentChallenge(_)));

        let err = handler()
            .build_challenge(&no_headers, r#"{"x402Version":1,"accepts":[]}"#)
            .unwrap_err();
        assert!(matches!(err, MemVaultError::PaymentChallenge(_)));
    }

    #[test]
    fn v2_payload_signs_recoverable_authorization() {
        let handler = handler();
        let challenge: PaymentRequired = serde_json::from_value(v2_challenge()).unwrap();

        let payload = handler.create_payload(&challenge).unwrap();
        assert_eq!(payload.x402_version, 2);
        let accepted = payload.accepted.as_ref().unwrap();
        assert_eq!(accepted.scheme, "exact");
        assert_eq!(accepted.amount, "2500");

        let auth = &payload.payload.authorization;
        assert_eq!(auth.from, handler.signer.address().to_string());
        assert_eq!(auth.value, "2500");
        let valid_after: u64 = auth.valid_after.parse().unwrap();
        let valid_before: u64 = auth.valid_before.parse().unwrap();
        assert_eq!(valid_before - valid_after, 300 + VALID_AFTER_SKEW_SECS);

        let message = TransferWithAuthorization {
            from: handler.signer.address(),
            to: PAY_TO.parse().unwrap(),
            value: U256::from(2_500u64),
            valid_after,
            valid_before,
            nonce: auth.nonce.parse().unwrap(),
        };
        let domain = Eip712Domain {
            name: "USD Coin".to_owned(),
            version: "2".to_owned(),
            chain_id: 8453,
            verifying_contract: USDC_BASE.parse().unwrap(),
        };
        let signature: WalletSignature = payload.payload.signature.parse().unwrap();
        let recovered = recover_address(&message.signing_hash(&domain), &signature).unwrap();
        assert_eq!(recovered, handler.signer.address());

        let headers = handler.encode_headers(&payload).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].0, PAYMENT_SIGNATURE_HEADER);
        assert_eq!(PaymentPayload::from_base64(&headers[0].1).unwrap(), payload);
    }

    #[test]
    fn v1_payload_uses_legacy_header() {
        let challenge: PaymentRequired = serde_json::from_value(json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "base-sepolia",
                "maxAmountRequired": "10",
                "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                "payTo": PAY_TO
            }]
        }))
        .unwrap();

        let payload = handler().create_payload(&challenge).unwrap();
        assert_eq!(payload.scheme.as_deref(), Some("exact"));
        assert_eq!(payload.network.as_deref(), Some("base-sepolia"));
        assert!(payload.accepted.is_none());

        let valid_after: u64 = payload.payload.authorization.valid_after.parse().unwrap();
        let valid_before: u64 = payload.payload.authorization.valid_before.parse().unwrap();
        assert_eq!(valid_before - valid_after, MIN_VALIDITY_SECS + VALID_AFTER_SKEW_SECS);

        let headers = handler().encode_headers(&payload).unwrap();
        assert_eq!(headers[0].0, X_PAYMENT_HEADER);
    }

    #[test]
    fn unsupported_options_are_fatal() {
        let challenge: PaymentRequired = serde_json::from_value(json!({
            "x402Version": 2,
            "accepts": [{
                "scheme": "exact",
                "network": "solana",
                "amount": "1",
                "asset": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                "payTo": "2wKupLR9q6wXYppw8Gr2NvWxKBUqm4PPJKkQfoxHDBg4"
            }]
        }))
        .unwrap();

        let err = handler().create_payload(&challenge).unwrap_err();
        assert!(err.to_string().contains("exact/solana"));
    }

    #[test]
    fn malformed_amount_is_fatal() {
        let mut challenge: PaymentRequired = serde_json::from_value(v2_challenge()).unwrap();
        challenge.accepts[1].amount = "lots".to_owned();

        let err = handler().create_payload(&challenge).unwrap_err();
        assert!(matches!(err, MemVaultError::PaymentChallenge(_)));
    }

    #[test]
    fn oversized_timeout_is_fatal() {
        let mut challenge: PaymentRequired = serde_json::from_value(v2_challenge()).unwrap();
        for option in &mut challenge.accepts {
            option.max_timeout_seconds = u64::MAX;
        }

        let err = handler().create_payload(&challenge).unwrap_err();
        assert!(matches!(err, MemVaultError::PaymentChallenge(_)));
        assert!(err.to_string().contains("maxTimeoutSeconds"));
    }
}
