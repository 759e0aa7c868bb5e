use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::{
    config::normalize_base_url,
    error::is_transient_status,
    payment::{PaymentHandler, X402PaymentHandler},
    request::Method,
    wallet::WalletSigner,
    ClientConfig, ClientOptions, MemVaultError, RequestSpec, Result,
};

/// Request header carrying the free-tier wallet signature.
pub const WALLET_AUTH_HEADER: &str = "x-wallet-auth";

/// HTTP client for the MemVault memory API.
///
/// Every attempt carries a fresh `x-wallet-auth` signature. A `402 Payment
/// Required` answer is paid through the configured [`PaymentHandler`] and
/// re-issued once without consuming retry budget.
#[derive(Clone)]
pub struct MemVaultClient {
    http: reqwest::Client,
    base_url: String,
    signer: Arc<WalletSigner>,
    payments: Arc<dyn PaymentHandler>,
    options: ClientOptions,
}

impl fmt::Debug for MemVaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemVaultClient")
            .field("base_url", &self.base_url)
            .field("wallet", &self.signer.address())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Raw response of one HTTP exchange, body fully read.
struct RawResponse {
    status: u16,
    headers: HeaderMap,
    body: String,
}

/// Result of one attempt that did not fail fatally.
enum AttemptOutcome {
    Success(serde_json::Value),
    Transient(MemVaultError),
}

impl MemVaultClient {
    /// Creates a client paying 402 challenges with the same wallet.
    pub fn new(base_url: impl AsRef<str>, signer: WalletSigner) -> Self {
        let payments: Arc<dyn PaymentHandler> =
            Arc::new(X402PaymentHandler::new(signer.clone()));
        Self {
            http: reqwest::Client::new(),
            base_url: normalize_base_url(base_url.as_ref()),
            signer: Arc::new(signer),
            payments,
            options: ClientOptions::default(),
        }
    }

    /// Creates a client from loaded configuration.
    ///
    /// Fails if the wallet key is malformed.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let signer = WalletSigner::from_private_key(&config.wallet_key)?;
        Ok(Self::new(config.base_url, signer).with_options(config.options))
    }

    /// Creates a client from `MEMVAULT_*` environment variables.
    ///
    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?)
    }

    /// Applies client options such as timeout and retry behavior.
    pub fn with_options(mut self, opts: ClientOptions) -> Self {
        self.options = opts;
        self
    }

    /// Replaces the handler used to answer payment challenges.
    pub fn with_payment_handler(mut self, handler: Arc<dyn PaymentHandler>) -> Self {
        self.payments = handler;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn wallet_address(&self) -> String {
        self.signer.address().to_string()
    }

    /// Sends one logical request, retrying transient failures.
    pub async fn send(&self, request: RequestSpec) -> Result<serde_json::Value> {
        self.send_with_cancel(request, &CancellationToken::new()).await
    }

    /// Sends one request and deserializes the JSON response into `T`.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestSpec) -> Result<T> {
        let value = self.send(request).await?;
        serde_json::from_value(value)
            .map_err(|err| MemVaultError::Decode(format!("unexpected response shape: {err}")))
    }

    /// Like [`MemVaultClient::send`], aborting the in-flight attempt or
    /// pending backoff as soon as `cancel` fires.
    pub async fn send_with_cancel(
        &self,
        request: RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value> {
        request.validate()?;
        let url = format!("{}{}", self.base_url, request.path);
        let body = request.body_bytes()?;
        let backoff = self.options.backoff();
        let max_retries = self.options.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                let delay = backoff.delay(attempt - 1);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    method = request.method.as_str(),
                    path = %request.path,
                    attempt,
                    "retrying request after {} ms",
                    delay.as_millis()
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(MemVaultError::Cancelled),
                    _ = sleep(delay) => {}
                }
            }

            match self
                .attempt(request.method, &url, body.as_deref(), cancel)
                .await?
            {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Transient(err) => {
                    if attempt < max_retries {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
            }
        }

        Err(last_error.unwrap_or(MemVaultError::RetriesExhausted))
    }

    async fn attempt(
        &self,
        method: Method,
        url: &str,
        body: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome> {
        let headers = self.request_headers(body.is_some())?;

        let response = match self
            .execute(method, url, headers.clone(), body, cancel)
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_retryable() => return Ok(AttemptOutcome::Transient(err)),
            Err(err) => return Err(err),
        };

        if response.status != 402 {
            return Self::classify(response);
        }

        let paid_headers = self.paid_headers(headers, &response)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(method = method.as_str(), "retrying request with payment");

        match self.execute(method, url, paid_headers, body, cancel).await {
            Ok(response) => Self::classify(response),
            Err(err) if err.is_retryable() => Ok(AttemptOutcome::Transient(err)),
            Err(err) => Err(err),
        }
    }

    fn classify(response: RawResponse) -> Result<AttemptOutcome> {
        if (200..300).contains(&response.status) {
            return decode_body(&response.body).map(AttemptOutcome::Success);
        }

        let err = MemVaultError::Http {
            status: response.status,
            body: response.body,
        };
        if is_transient_status(response.status) {
            Ok(AttemptOutcome::Transient(err))
        } else {
            Err(err)
        }
    }

    fn request_headers(&self, has_body: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if has_body {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        let auth = self.signer.auth_header(unix_timestamp())?;
        let auth = HeaderValue::from_str(&auth).map_err(|err| {
            MemVaultError::InvalidRequest(format!("invalid wallet auth header: {err}"))
        })?;
        headers.insert(HeaderName::from_static(WALLET_AUTH_HEADER), auth);
        Ok(headers)
    }

    /// Answers the challenge in `response` and merges the payment headers
    /// over `headers`.
    fn paid_headers(&self, mut headers: HeaderMap, response: &RawResponse) -> Result<HeaderMap> {
        let lookup = |name: &str| {
            response
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };
        let challenge = self.payments.build_challenge(&lookup, &response.body)?;
        let payload = self.payments.create_payload(&challenge)?;

        for (name, value) in self.payments.encode_headers(&payload)? {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                MemVaultError::PaymentChallenge(format!("invalid payment header name: {err}"))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|err| {
                MemVaultError::PaymentChallenge(format!("invalid payment header value: {err}"))
            })?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Performs one HTTP exchange under the per-attempt deadline.
    ///
    /// Dropping the exchange future on timeout or cancellation aborts the
    /// in-flight request.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<&[u8]>,
        cancel: &CancellationToken,
    ) -> Result<RawResponse> {
        let timeout_ms = self.options.timeout_ms;
        let mut builder = self.http.request(method.into(), url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        let exchange = async {
            let response = builder
                .send()
                .await
                .map_err(|err| transport_error(err, timeout_ms))?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response
                .text()
                .await
                .map_err(|err| transport_error(err, timeout_ms))?;
            Ok::<_, MemVaultError>(RawResponse {
                status,
                headers,
                body,
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(MemVaultError::Cancelled),
            result = timeout(Duration::from_millis(timeout_ms), exchange) => match result {
                Ok(response) => response,
                Err(_) => Err(MemVaultError::Timeout { timeout_ms }),
            },
        }
    }
}

fn transport_error(err: reqwest::Error, timeout_ms: u64) -> MemVaultError {
    if err.is_builder() {
        MemVaultError::InvalidRequest(err.to_string())
    } else if err.is_timeout() {
        MemVaultError::Timeout { timeout_ms }
    } else {
        MemVaultError::Transport(err)
    }
}

fn decode_body(body: &str) -> Result<serde_json::Value> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|err| {
        MemVaultError::Decode(format!("invalid response JSON: {err}; body: {body}"))
    })
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
