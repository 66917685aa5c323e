//! Rate-limited request layer.
//!
//! Every outbound call to one external service passes through that
//! service's [`RateGate`]. The gate enforces a minimum interval between
//! dispatches which widens on HTTP 429 and slowly shrinks on success.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::metrics;

/// Errors from a single gated request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("Authentication failed (HTTP {status})")]
    Auth { status: u16 },

    #[error("Rate limited (HTTP 429)")]
    RateLimited,

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Not found (HTTP 404)")]
    NotFound,

    #[error("Client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("Server error (HTTP {status})")]
    Server { status: u16 },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl RequestError {
    /// Whether the retry wrapper should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RequestError::Transient(_) | RequestError::RateLimited)
    }

    /// Classify a non-success status code.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 => RequestError::Auth {
                status: status.as_u16(),
            },
            404 => RequestError::NotFound,
            429 => RequestError::RateLimited,
            503 | 504 => RequestError::Transient(format!("HTTP {}", status.as_u16())),
            code if code >= 500 => RequestError::Server { status: code },
            code => RequestError::Client {
                status: code,
                message: body.chars().take(200).collect(),
            },
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RequestError::Decode(err.to_string())
        } else {
            RequestError::Transient(err.to_string())
        }
    }
}

struct GateState {
    min_interval: Duration,
    last_request: Option<Instant>,
}

/// Per-service adaptive request gate.
pub struct RateGate {
    service: String,
    floor: Duration,
    ceiling: Duration,
    widen_factor: f64,
    shrink_factor: f64,
    state: Mutex<GateState>,
}

impl RateGate {
    pub fn new(service: impl Into<String>, config: &RateLimitConfig) -> Self {
        let floor = Duration::from_secs_f64(config.min_interval_secs.max(0.0));
        Self {
            service: service.into(),
            floor,
            ceiling: Duration::from_secs_f64(config.max_interval_secs.max(config.min_interval_secs)),
            widen_factor: config.widen_factor,
            shrink_factor: config.shrink_factor,
            state: Mutex::new(GateState {
                min_interval: floor,
                last_request: None,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Wait until the next dispatch is allowed and claim the slot.
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// behind each other instead of racing for the same slot.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_request {
            let ready_at = last + state.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        state.last_request = Some(Instant::now());
    }

    /// Widen the interval after a 429.
    pub async fn on_rate_limited(&self) {
        let mut state = self.state.lock().await;
        let widened = state.min_interval.mul_f64(self.widen_factor).min(self.ceiling);
        warn!(
            service = %self.service,
            from_secs = state.min_interval.as_secs_f64(),
            to_secs = widened.as_secs_f64(),
            "Rate limited, widening request interval"
        );
        state.min_interval = widened;
        metrics::RATE_LIMIT_WIDENINGS
            .with_label_values(&[&self.service])
            .inc();
    }

    /// Shrink the interval after a successful call.
    pub async fn on_success(&self) {
        let mut state = self.state.lock().await;
        state.min_interval = state.min_interval.mul_f64(self.shrink_factor).max(self.floor);
    }

    pub async fn current_interval(&self) -> Duration {
        self.state.lock().await.min_interval
    }
}

/// Body of a gated request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Form(Vec<(String, String)>),
    Bytes(Vec<u8>),
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_str(&self.body).map_err(|e| RequestError::Decode(e.to_string()))
    }
}

/// HTTP client bound to one service, its bearer token and its gate.
pub struct GatedClient {
    client: Client,
    base_url: String,
    api_key: String,
    gate: RateGate,
}

impl GatedClient {
    pub fn new(
        service: &str,
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        rate_limit: &RateLimitConfig,
    ) -> Result<Self, RequestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RequestError::Transient(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            gate: RateGate::new(service, rate_limit),
        })
    }

    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Dispatch one request through the gate.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        params: &[(&str, String)],
    ) -> Result<RawResponse, RequestError> {
        self.send(method, endpoint, body, params, None).await
    }

    /// Same as [`request`](Self::request) with a per-call timeout override.
    pub async fn request_with_timeout(
        &self,
        method: Method,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<RawResponse, RequestError> {
        self.send(method, endpoint, RequestBody::Empty, &[], Some(timeout))
            .await
    }

    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
        params: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<RawResponse, RequestError> {
        self.gate.acquire().await;

        let url = format!("{}{}", self.base_url, endpoint);
        debug!(service = %self.gate.service(), method = %method, url = %url, "Dispatching request");

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key);
        if !params.is_empty() {
            builder = builder.query(params);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Bytes(bytes) => builder.body(bytes),
        };

        let outcome = match builder.send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if status.is_success() {
                    Ok(RawResponse {
                        status: status.as_u16(),
                        body: text,
                    })
                } else {
                    Err(RequestError::from_status(status, &text))
                }
            }
            Err(e) => Err(RequestError::from(e)),
        };

        let label = match &outcome {
            Ok(_) => {
                self.gate.on_success().await;
                "ok"
            }
            Err(RequestError::RateLimited) => {
                self.gate.on_rate_limited().await;
                "rate_limited"
            }
            Err(RequestError::Auth { .. }) => "auth",
            Err(RequestError::Transient(_)) | Err(RequestError::Server { .. }) => "transient",
            Err(_) => "error",
        };
        metrics::DEBRID_REQUESTS
            .with_label_values(&[self.gate.service(), label])
            .inc();

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> RateGate {
        RateGate::new("test", &RateLimitConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_doubles_on_429_and_caps() {
        let gate = gate();
        let mut seen = vec![gate.current_interval().await.as_secs_f64()];
        for _ in 0..4 {
            gate.on_rate_limited().await;
            seen.push(gate.current_interval().await.as_secs_f64());
        }
        assert_eq!(seen, vec![0.5, 1.0, 2.0, 4.0, 5.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_shrinks_to_floor() {
        let gate = gate();
        gate.on_rate_limited().await;
        gate.on_success().await;
        let shrunk = gate.current_interval().await.as_secs_f64();
        assert!((shrunk - 0.95).abs() < 1e-9);

        for _ in 0..50 {
            gate.on_success().await;
        }
        assert_eq!(gate.current_interval().await, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_spaces_dispatches() {
        let gate = gate();
        let start = Instant::now();
        gate.acquire().await;
        gate.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));

        gate.on_rate_limited().await;
        let before = Instant::now();
        gate.acquire().await;
        assert!(before.elapsed() >= Duration::from_millis(1000));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(
            RequestError::from_status(StatusCode::UNAUTHORIZED, ""),
            RequestError::Auth { status: 401 }
        );
        assert_eq!(
            RequestError::from_status(StatusCode::FORBIDDEN, ""),
            RequestError::Auth { status: 403 }
        );
        assert_eq!(
            RequestError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            RequestError::RateLimited
        );
        assert!(RequestError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(RequestError::from_status(StatusCode::GATEWAY_TIMEOUT, "").is_retryable());
        assert!(!RequestError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_retryable());
        assert!(!RequestError::from_status(StatusCode::BAD_REQUEST, "bad").is_retryable());
        assert_eq!(
            RequestError::from_status(StatusCode::NOT_FOUND, ""),
            RequestError::NotFound
        );
    }
}
