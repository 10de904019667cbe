//! Alert record management: guarded creation, resolution, listings.

use std::sync::Arc;

use serde::Serialize;
use stockwatch_storage::{AlertInsert, AlertKind, AlertRecord, NewAlert, StockStore};
use time::OffsetDateTime;

use crate::error::PipelineError;

/// Number of resolved alerts shown next to the unresolved ones.
pub const RECENT_RESOLVED_LIMIT: usize = 5;

/// Name recorded for products without one.
pub const UNNAMED_PRODUCT: &str = "(unnamed)";

/// Outcome of [`AlertBook::create_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum Creation {
    Created(AlertRecord),
    /// An unresolved alert already exists for the product; nothing was written.
    Suppressed { existing: AlertRecord },
}

/// Unresolved alerts plus a short tail of resolved ones, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertOverview {
    pub unresolved: Vec<AlertRecord>,
    pub recent_resolved: Vec<AlertRecord>,
}

/// Low-stock alert operations over a [`StockStore`].
pub struct AlertBook<S> {
    store: Arc<S>,
}

impl<S> Clone for AlertBook<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: StockStore> AlertBook<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Record a low-stock alert for `product_id` unless one is already open.
    ///
    /// Goes through [`StockStore::insert_alert_unless_open`], so whether the
    /// lookup and insert are atomic depends on the backend.
    pub async fn create_if_absent(
        &self,
        product_id: &str,
        product_name: &str,
        inventory: i64,
    ) -> Result<Creation, PipelineError> {
        let product_name = match product_name.trim() {
            "" => UNNAMED_PRODUCT,
            _ => product_name,
        };
        let alert = NewAlert {
            kind: AlertKind::LowStock,
            product_id: product_id.to_string(),
            product_name: product_name.to_string(),
            inventory,
            created_at: OffsetDateTime::now_utc(),
        };
        match self.store.insert_alert_unless_open(alert).await? {
            AlertInsert::Inserted(record) => Ok(Creation::Created(record)),
            AlertInsert::AlreadyOpen(existing) => Ok(Creation::Suppressed { existing }),
        }
    }

    /// Mark an alert resolved. Resolving a resolved alert is a no-op.
    pub async fn resolve(&self, alert_id: &str) -> Result<AlertRecord, PipelineError> {
        let alert = self
            .store
            .mark_alert_resolved(alert_id, OffsetDateTime::now_utc())
            .await?;
        tracing::info!(alert_id, product_id = %alert.product_id, "alert resolved");
        Ok(alert)
    }

    /// Unresolved alerts, newest first.
    pub async fn list_unresolved(&self) -> Result<Vec<AlertRecord>, PipelineError> {
        Ok(self.store.list_alerts(false, 0).await?)
    }

    /// At most `limit` resolved alerts, newest first.
    pub async fn list_recently_resolved(
        &self,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, PipelineError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.list_alerts(true, limit).await?)
    }

    pub async fn overview(&self) -> Result<AlertOverview, PipelineError> {
        Ok(AlertOverview {
            unresolved: self.list_unresolved().await?,
            recent_resolved: self.list_recently_resolved(RECENT_RESOLVED_LIMIT).await?,
        })
    }
}
