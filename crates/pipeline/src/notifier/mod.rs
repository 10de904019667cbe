//! Notification delivery over a pluggable mail transport.
//!
//! The [`Notifier`] never retries and never returns an error: every outcome,
//! including transport failure, is a [`Delivery`] value for the caller to log.

mod message;
#[cfg(feature = "relay")]
pub mod relay;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use message::{escape_html, LowStockMessage};

// ──────────────────────────────────────────────
// MailMessage / MailTransport
// ──────────────────────────────────────────────

/// One outbound message, addressed to every recipient at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Errors a mail transport can raise.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, connect, timeout).
    #[error("mail request failed: {0}")]
    Request(String),
    /// The transport answered with a non-success status.
    #[error("mail transport rejected the message with status {status}")]
    Rejected { status: u16 },
    /// The transport answered but the reply could not be understood.
    #[error("invalid mail transport response: {0}")]
    InvalidResponse(String),
}

/// Sends a [`MailMessage`] and returns the transport-assigned message id.
///
/// Implementations must be safe to share between concurrent tasks.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<String, TransportError>;

    /// Returns this transport's identifier (e.g. "http-relay").
    fn transport_id(&self) -> &str;
}

// ──────────────────────────────────────────────
// Delivery
// ──────────────────────────────────────────────

/// Why a notification was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoTransport,
    NoRecipients,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoTransport => "no-transport",
            SkipReason::NoRecipients => "no-recipients",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one [`Notifier::send`] call.
#[derive(Debug)]
pub enum Delivery {
    Delivered { message_id: String },
    Skipped(SkipReason),
    Failed(TransportError),
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}

// ──────────────────────────────────────────────
// Notifier
// ──────────────────────────────────────────────

/// Formats nothing itself; hands a finished message to the transport.
#[derive(Clone)]
pub struct Notifier {
    transport: Option<Arc<dyn MailTransport>>,
    from: String,
}

impl Notifier {
    pub fn new(transport: Option<Arc<dyn MailTransport>>, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
        }
    }

    /// A notifier with no transport; every send is skipped.
    pub fn disabled(from: impl Into<String>) -> Self {
        Self::new(None, from)
    }

    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Send one message to every address in `recipients`.
    pub async fn send(
        &self,
        recipients: &BTreeSet<String>,
        subject: &str,
        text: &str,
        html: &str,
    ) -> Delivery {
        let Some(transport) = &self.transport else {
            return Delivery::Skipped(SkipReason::NoTransport);
        };
        if recipients.is_empty() {
            return Delivery::Skipped(SkipReason::NoRecipients);
        }

        let message = MailMessage {
            from: self.from.clone(),
            to: recipients.iter().cloned().collect(),
            subject: subject.to_string(),
            text: text.to_string(),
            html: html.to_string(),
        };
        match transport.send(&message).await {
            Ok(message_id) => Delivery::Delivered { message_id },
            Err(err) => Delivery::Failed(err),
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field(
                "transport",
                &self.transport.as_ref().map(|t| t.transport_id().to_string()),
            )
            .field("from", &self.from)
            .finish()
    }
}
