use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{
    AlertInsert, AlertKind, AlertRecord, NewAlert, ProductDocument, RecipientRecord,
};

/// The document store consumed by the alerting pipeline.
///
/// A `StockStore` holds three collections: product documents owned by the
/// catalog, alert records owned by the pipeline, and the notification
/// recipient registry owned by the administrative surface.
///
/// ## Consistency
///
/// Each call is a single point read or write. The store serializes writes
/// per document but the trait makes no promise of atomicity across calls,
/// which is why [`StockStore::insert_alert_unless_open`] is advisory by
/// default. Backends with a transactional check-and-set should override it.
///
/// ## Ordering
///
/// Listing methods return records newest first by creation time. A `limit`
/// of 0 means no limit.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared between
/// pipeline tasks and axum application state.
#[async_trait]
pub trait StockStore: Send + Sync + 'static {
    // ── Products ─────────────────────────────────────────────────────────────

    /// Read a product document, `None` if it does not exist.
    async fn get_product(&self, product_id: &str)
        -> Result<Option<ProductDocument>, StorageError>;

    /// Insert a new product document under a store-assigned id.
    async fn create_product(&self, document: ProductDocument) -> Result<String, StorageError>;

    /// Insert several product documents in one atomic batch.
    ///
    /// Either every document is written or none is.
    async fn create_products(
        &self,
        documents: Vec<ProductDocument>,
    ) -> Result<Vec<String>, StorageError>;

    /// Merge `patch` into a product document, creating it if missing.
    ///
    /// Top-level fields in `patch` replace the stored ones; other fields are
    /// kept. Returns the document after the write.
    async fn merge_product(
        &self,
        product_id: &str,
        patch: ProductDocument,
    ) -> Result<ProductDocument, StorageError>;

    /// Delete a product document. Returns whether it existed.
    async fn delete_product(&self, product_id: &str) -> Result<bool, StorageError>;

    // ── Alerts ───────────────────────────────────────────────────────────────

    /// Find an unresolved alert of `kind` for `product_id`.
    async fn find_open_alert(
        &self,
        kind: AlertKind,
        product_id: &str,
    ) -> Result<Option<AlertRecord>, StorageError>;

    /// Insert an alert unconditionally.
    async fn insert_alert(&self, alert: NewAlert) -> Result<AlertRecord, StorageError>;

    /// Insert an alert only if no unresolved alert of the same kind exists
    /// for the same product.
    ///
    /// The default implementation is a lookup followed by an insert. Two
    /// concurrent callers can both pass the lookup and write duplicates;
    /// resolving either one still leaves the product alert-free eventually.
    async fn insert_alert_unless_open(
        &self,
        alert: NewAlert,
    ) -> Result<AlertInsert, StorageError> {
        if let Some(existing) = self.find_open_alert(alert.kind, &alert.product_id).await? {
            return Ok(AlertInsert::AlreadyOpen(existing));
        }
        Ok(AlertInsert::Inserted(self.insert_alert(alert).await?))
    }

    /// Read an alert by id.
    ///
    /// Returns `Err(StorageError::AlertNotFound)` if no such alert exists.
    async fn get_alert(&self, alert_id: &str) -> Result<AlertRecord, StorageError>;

    /// Mark an alert resolved at `at`.
    ///
    /// One-way and idempotent: an alert that is already resolved is returned
    /// unchanged, keeping its original `resolved_at`.
    ///
    /// Returns `Err(StorageError::AlertNotFound)` if no such alert exists.
    async fn mark_alert_resolved(
        &self,
        alert_id: &str,
        at: OffsetDateTime,
    ) -> Result<AlertRecord, StorageError>;

    /// List alerts with the given `resolved` flag, newest first.
    async fn list_alerts(
        &self,
        resolved: bool,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StorageError>;

    // ── Recipient registry ───────────────────────────────────────────────────

    /// List registry entries, newest first. With `notify_only`, entries
    /// that have not opted in are skipped.
    async fn list_recipients(&self, notify_only: bool)
        -> Result<Vec<RecipientRecord>, StorageError>;

    /// Read a registry entry.
    ///
    /// Returns `Err(StorageError::RecipientNotFound)` if it does not exist.
    async fn get_recipient(&self, recipient_id: &str) -> Result<RecipientRecord, StorageError>;

    /// Create or update a registry entry with `email` and `notify`.
    ///
    /// `created_at` is only set when the entry is first created.
    async fn upsert_recipient(
        &self,
        recipient_id: &str,
        email: &str,
        notify: bool,
        at: OffsetDateTime,
    ) -> Result<RecipientRecord, StorageError>;

    /// Set the `notify` flag of a registry entry, creating a bare entry
    /// (empty email) if none exists.
    async fn set_recipient_notify(
        &self,
        recipient_id: &str,
        notify: bool,
        at: OffsetDateTime,
    ) -> Result<RecipientRecord, StorageError>;
}
