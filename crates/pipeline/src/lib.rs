//! Inventory-change alerting and notification fan-out.
//!
//! The pipeline reacts to product writes published by a
//! [`StockStore`](stockwatch_storage::StockStore) change feed:
//!
//! 1. [`threshold`] decides whether a write crossed below the low-stock threshold.
//! 2. [`alerts`] records at most one unresolved alert per product.
//! 3. [`recipients`] builds the recipient set from the registry and a fallback list.
//! 4. [`notifier`] formats and sends one message to that set.
//!
//! [`orchestrator::Orchestrator`] wires the steps together and
//! [`dispatch`] runs each change event as an independent, deadline-bounded
//! task. Nothing in here ever fails the write that produced an event.

pub mod alerts;
pub mod config;
pub mod dispatch;
mod error;
pub mod notifier;
pub mod orchestrator;
pub mod recipients;
pub mod threshold;

pub use alerts::{AlertBook, AlertOverview, Creation};
pub use config::PipelineConfig;
pub use dispatch::{change_feed, run_dispatcher, spawn_dispatcher, DispatchConfig, DispatchStats};
pub use error::PipelineError;
pub use notifier::{Delivery, MailMessage, MailTransport, Notifier, SkipReason, TransportError};
pub use orchestrator::{EventOutcome, NotifyOutcome, Orchestrator, WriteOutcome};
pub use recipients::{RecipientSource, RegistryRecipients};
pub use threshold::{evaluate, Verdict, DEFAULT_LOW_STOCK_THRESHOLD};
