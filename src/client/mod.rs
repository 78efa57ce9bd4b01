//! Resilient outbound-call client.
//!
//! A single shared wrapper used for every adapter invocation. Two layers:
//! bounded retries with exponential backoff (network errors, timeouts and
//! HTTP 5xx only - a 4xx is the caller's mistake and is never retried),
//! and a process-wide circuit breaker shared by all concurrent callers.
//!
//! The retry/breaker core ([`ResilientClient::execute`]) is generic over
//! an async operation; [`ResilientClient::call_json`] layers reqwest and
//! central credential injection on top.

pub mod breaker;

pub use breaker::{BreakerState, CircuitBreaker};

use crate::adapter::HttpMethod;
use crate::config::{BreakerConfig, ProviderConfig, ProviderCredentials, RetryConfig};
use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A classified call failure, used for retry and breaker accounting.
#[derive(Debug, Clone)]
pub struct CallFailure {
    /// HTTP status, when the provider answered at all.
    pub status: Option<u16>,
    /// Whether the call exceeded its per-call timeout.
    pub timed_out: bool,
    /// Human-readable description, kept for the audit record.
    pub message: String,
}

impl CallFailure {
    /// A network-level failure (connect, TLS, reset).
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            timed_out: false,
            message: message.into(),
        }
    }

    /// An HTTP error status from the provider.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            timed_out: false,
            message: message.into(),
        }
    }

    /// A per-call timeout.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            status: None,
            timed_out: true,
            message: message.into(),
        }
    }

    /// Retryable failures: network errors, timeouts and server-side 5xx.
    /// Client errors (4xx) are never retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.timed_out || self.status.map_or(true, |s| s >= 500)
    }

    fn into_error(self) -> Error {
        if self.timed_out {
            Error::Timeout(self.message)
        } else if let Some(status) = self.status {
            Error::Provider(format!("HTTP {status}: {}", self.message))
        } else {
            Error::Provider(self.message)
        }
    }
}

/// Shared resilient call client: retry + circuit breaker + timeout.
pub struct ResilientClient {
    http: reqwest::Client,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
    call_timeout: Duration,
    credentials: ProviderCredentials,
}

impl ResilientClient {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(
        provider: &ProviderConfig,
        retry: RetryConfig,
        breaker: BreakerConfig,
        credentials: ProviderCredentials,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(provider.timeout())
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            breaker: Arc::new(CircuitBreaker::new(breaker)),
            retry,
            call_timeout: provider.timeout(),
            credentials,
        })
    }

    /// Override the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The shared breaker, for observation.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run an operation through the retry and breaker layers.
    ///
    /// Every attempt asks the breaker for permission and reports its
    /// outcome, so a timeout counts as a failure for both retry and
    /// breaker accounting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircuitOpen`] when the breaker rejects the call,
    /// otherwise the classified failure once retries are exhausted.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, CallFailure>>,
    {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            self.breaker.try_acquire()?;

            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(CallFailure::timeout(format!(
                    "no response within {:?}",
                    self.call_timeout
                ))),
            };

            match outcome {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(failure) => {
                    self.breaker.record_failure();
                    if !failure.is_transient() || attempt >= self.retry.max_attempts {
                        return Err(failure.into_error());
                    }
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        attempt,
                        ?delay,
                        "transient call failure, retrying: {}",
                        failure.message
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Make a resilient JSON call to a provider endpoint, injecting
    /// credentials centrally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CircuitOpen`] when the circuit is open, otherwise
    /// the classified provider failure once retries are exhausted.
    pub async fn call_json(
        &self,
        method: HttpMethod,
        url: &str,
        payload: &Value,
    ) -> Result<Value> {
        self.execute(|| async move { self.request_once(method, url, payload).await })
            .await
    }

    async fn request_once(
        &self,
        method: HttpMethod,
        url: &str,
        payload: &Value,
    ) -> std::result::Result<Value, CallFailure> {
        let mut request = match method {
            HttpMethod::Post => self.http.post(url).json(payload),
            HttpMethod::Get => self.http.get(url).query(&query_pairs(payload)),
        };
        if let Some(ref api_key) = self.credentials.api_key {
            request = request.header("apikey", api_key);
        }
        if let Some(ref token) = self.credentials.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CallFailure::timeout(e.to_string())
            } else {
                CallFailure::transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CallFailure::transport(e.to_string()))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));

        if status.is_success() {
            Ok(body)
        } else {
            warn!(status = status.as_u16(), url, "provider returned an error");
            Err(CallFailure::from_status(status.as_u16(), body.to_string()))
        }
    }
}

/// Flatten a JSON object into query pairs for GET endpoints.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    payload
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let value = v
                        .as_str()
                        .map_or_else(|| v.to_string(), ToString::to_string);
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default()
}
