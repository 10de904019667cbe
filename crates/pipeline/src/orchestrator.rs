//! Change-trigger orchestration.
//!
//! Per product the pipeline moves between three states: no alert open,
//! alert open, and alert resolved (which behaves like no alert open). A
//! product write may open an alert; only an administrative resolve closes
//! it. Alert creation is a separate event: the notification for a new alert
//! is handled by [`Orchestrator::on_alert_created`], never inline with the
//! write that caused it.

use std::sync::Arc;

use stockwatch_storage::{AlertKind, AlertRecord, ChangeEvent, ProductDocument, StockStore};
use time::OffsetDateTime;

use crate::alerts::{AlertBook, Creation, UNNAMED_PRODUCT};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::notifier::{Delivery, LowStockMessage, MailTransport, Notifier};
use crate::recipients::{RecipientSource, RegistryRecipients};
use crate::threshold::{evaluate, inventory_of, product_name, Verdict};

/// Outcome of handling one product write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    NoCrossing,
    /// Crossed, but an unresolved alert already covers the product.
    Suppressed { existing: AlertRecord },
    Created(AlertRecord),
}

/// Outcome of handling one alert-created event.
#[derive(Debug)]
pub enum NotifyOutcome {
    /// The alert is not a low-stock alert.
    Ignored,
    /// A delivery was attempted; see the [`Delivery`] for how it went.
    Attempted {
        recipients: usize,
        delivery: Delivery,
    },
}

#[derive(Debug)]
pub enum EventOutcome {
    Write(WriteOutcome),
    Notify(NotifyOutcome),
}

/// Runs threshold detection, alert dedup, recipient resolution, and
/// notification for change events.
pub struct Orchestrator<S> {
    alerts: AlertBook<S>,
    recipients: Arc<dyn RecipientSource>,
    notifier: Notifier,
    config: PipelineConfig,
}

impl<S: StockStore> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        recipients: Arc<dyn RecipientSource>,
        notifier: Notifier,
        config: PipelineConfig,
    ) -> Self {
        Self {
            alerts: AlertBook::new(store),
            recipients,
            notifier,
            config,
        }
    }

    /// Build an orchestrator whose recipients come from the store's registry
    /// plus the configured fallback list.
    pub fn with_registry(
        store: Arc<S>,
        transport: Option<Arc<dyn MailTransport>>,
        config: PipelineConfig,
    ) -> Self {
        let recipients = Arc::new(RegistryRecipients::new(
            store.clone(),
            config.fallback_recipients.clone(),
        ));
        let notifier = Notifier::new(transport, config.mail_from.clone());
        Self::new(store, recipients, notifier, config)
    }

    pub fn alerts(&self) -> &AlertBook<S> {
        &self.alerts
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Route a change event to the matching handler.
    pub async fn handle(&self, event: ChangeEvent) -> Result<EventOutcome, PipelineError> {
        match event {
            ChangeEvent::ProductWritten {
                product_id,
                before,
                after,
            } => self
                .on_product_write(&product_id, before.as_ref(), after.as_ref())
                .await
                .map(EventOutcome::Write),
            ChangeEvent::AlertCreated(alert) => self
                .on_alert_created(&alert)
                .await
                .map(EventOutcome::Notify),
        }
    }

    /// React to a product write: open an alert on a fresh low-stock crossing.
    pub async fn on_product_write(
        &self,
        product_id: &str,
        before: Option<&ProductDocument>,
        after: Option<&ProductDocument>,
    ) -> Result<WriteOutcome, PipelineError> {
        if product_id.trim().is_empty() {
            return Err(PipelineError::Validation(
                "product write without a product id".to_string(),
            ));
        }

        let verdict = evaluate(
            before.and_then(inventory_of),
            after.and_then(inventory_of),
            self.config.low_stock_threshold,
        );
        let Verdict::Crossing { inventory } = verdict else {
            return Ok(WriteOutcome::NoCrossing);
        };

        let name = after.and_then(product_name).unwrap_or(UNNAMED_PRODUCT);
        match self.alerts.create_if_absent(product_id, name, inventory).await? {
            Creation::Created(alert) => {
                tracing::info!(
                    product_id,
                    alert_id = %alert.id,
                    inventory,
                    threshold = self.config.low_stock_threshold,
                    "low-stock alert created"
                );
                Ok(WriteOutcome::Created(alert))
            }
            Creation::Suppressed { existing } => {
                tracing::debug!(
                    product_id,
                    alert_id = %existing.id,
                    "low-stock alert already open; crossing suppressed"
                );
                Ok(WriteOutcome::Suppressed { existing })
            }
        }
    }

    /// React to a newly created alert: resolve recipients and notify them.
    ///
    /// Delivery problems are logged and reported in the outcome, never
    /// returned as errors. Only a failing recipient lookup is an error.
    pub async fn on_alert_created(
        &self,
        alert: &AlertRecord,
    ) -> Result<NotifyOutcome, PipelineError> {
        if alert.kind != AlertKind::LowStock {
            tracing::debug!(alert_id = %alert.id, kind = alert.kind.as_str(), "alert ignored");
            return Ok(NotifyOutcome::Ignored);
        }

        let recipients = self.recipients.resolve().await?;
        if recipients.is_empty() {
            tracing::warn!(alert_id = %alert.id, "no recipients for low-stock alert");
        }

        let message =
            LowStockMessage::render(alert, &self.config.store_name, OffsetDateTime::now_utc());
        let delivery = self
            .notifier
            .send(&recipients, &message.subject, &message.text, &message.html)
            .await;

        match &delivery {
            Delivery::Delivered { message_id } => tracing::info!(
                alert_id = %alert.id,
                recipients = recipients.len(),
                message_id = %message_id,
                "low-stock notification sent"
            ),
            Delivery::Skipped(reason) => tracing::warn!(
                alert_id = %alert.id,
                reason = reason.as_str(),
                "low-stock notification skipped"
            ),
            Delivery::Failed(error) => tracing::error!(
                alert_id = %alert.id,
                recipients = recipients.len(),
                error = %error,
                "low-stock notification failed"
            ),
        }

        Ok(NotifyOutcome::Attempted {
            recipients: recipients.len(),
            delivery,
        })
    }
}
