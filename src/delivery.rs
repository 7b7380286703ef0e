//! Callback delivery with bounded retries and exponential backoff.
//!
//! A delivery succeeds only on HTTP 200. Any other status, or a transport
//! error, counts as a failed attempt. Between attempts the client sleeps
//! `base_delay * 2^attempt` (1, 2, 4, 8, ... units). Delivery failure is
//! reported as `false` and never escalated.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Per-attempt timeout for callback POSTs.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Request timeout: {0}")]
    Timeout(String),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Request failed: {0}")]
    Request(String),
}

/// Sends one JSON POST and reports the response status.
#[async_trait]
pub trait CallbackTransport: Send + Sync {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<u16, DeliveryError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build callback client ({}), using defaults", e);
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallbackTransport for HttpTransport {
    async fn post_json(&self, url: &str, payload: &Value) -> Result<u16, DeliveryError> {
        match self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(DeliveryError::Timeout(e.to_string())),
            Err(e) if e.is_connect() => Err(DeliveryError::Connect(e.to_string())),
            Err(e) => Err(DeliveryError::Request(e.to_string())),
        }
    }
}

/// Delay before retrying after the zero-based `attempt`.
pub fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base_delay.saturating_mul(factor)
}

pub struct DeliveryClient {
    transport: Arc<dyn CallbackTransport>,
}

impl Default for DeliveryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryClient {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn CallbackTransport>) -> Self {
        Self { transport }
    }

    /// POST `payload` to `url`, retrying up to `max_attempts` times in total.
    ///
    /// At least one attempt is always made. Returns `true` on the first 200
    /// response, `false` once every attempt has failed.
    pub async fn deliver<T: Serialize>(
        &self,
        url: &str,
        payload: &T,
        max_attempts: u32,
        base_delay: Duration,
    ) -> bool {
        let body = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("Failed to encode callback payload: {}", e);
                return false;
            }
        };

        let max_attempts = max_attempts.max(1);
        for attempt in 0..max_attempts {
            match self.transport.post_json(url, &body).await {
                Ok(200) => {
                    tracing::info!(url = %url, attempt = attempt + 1, "Delivered callback");
                    return true;
                }
                Ok(status) => {
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        "Callback returned status {}",
                        status
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        "Callback attempt failed: {}",
                        e
                    );
                }
            }

            if attempt + 1 < max_attempts {
                let delay = backoff_delay(base_delay, attempt);
                tracing::debug!("Retrying callback in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(url = %url, attempts = max_attempts, "Giving up on callback delivery");
        false
    }
}
