//! HTTP mail relay transport.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. The relay receives the [`MailMessage`] as a
//! JSON body and answers with a JSON object carrying the message id.

use std::time::Duration;

use async_trait::async_trait;

use super::{MailMessage, MailTransport, TransportError};

/// Default per-request timeout for relay calls.
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport that POSTs messages to an HTTP mail relay.
///
/// - `endpoint`: full URL of the relay's send endpoint
/// - `api_key`: sent as `Authorization: Bearer <key>` when present
pub struct HttpRelayTransport {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRelayTransport {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        HttpRelayTransport {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout: DEFAULT_RELAY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Pull the message id out of a relay reply: `messageId`, then `id`.
pub fn extract_message_id(reply: &serde_json::Value) -> Option<String> {
    reply
        .get("messageId")
        .or_else(|| reply.get("id"))
        .and_then(|v| v.as_str())
        .filter(|id| !id.is_empty())
        .map(|id| id.to_string())
}

#[async_trait]
impl MailTransport for HttpRelayTransport {
    async fn send(&self, message: &MailMessage) -> Result<String, TransportError> {
        let body = serde_json::to_value(message)
            .map_err(|e| TransportError::Request(format!("failed to encode message: {}", e)))?;
        let endpoint = self.endpoint.clone();
        let api_key = self.api_key.clone();
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();
            let mut request = agent.post(&endpoint);

            if let Some(ref key) = api_key {
                request = request.header("Authorization", &format!("Bearer {}", key));
            }

            let response = request.send_json(&body).map_err(|e| match e {
                ureq::Error::StatusCode(status) => TransportError::Rejected { status },
                other => TransportError::Request(other.to_string()),
            })?;

            let reply: serde_json::Value = response.into_body().read_json().map_err(|e| {
                TransportError::InvalidResponse(format!("failed to parse reply as JSON: {}", e))
            })?;

            extract_message_id(&reply).ok_or_else(|| {
                TransportError::InvalidResponse(format!("reply carries no message id: {}", reply))
            })
        })
        .await
        .map_err(|e| TransportError::Request(format!("task join error: {}", e)))?
    }

    fn transport_id(&self) -> &str {
        "http-relay"
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
