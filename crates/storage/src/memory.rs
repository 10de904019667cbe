//! In-memory `StockStore` backend with an optional change feed.
//!
//! Used for tests and for `stockwatch serve` in local setups. All state
//! lives behind one synchronous mutex; the guard is always dropped before
//! an event is published. Publishing never waits on the consumer.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::error::StorageError;
use crate::event::ChangeEvent;
use crate::record::{
    AlertInsert, AlertKind, AlertRecord, NewAlert, ProductDocument, RecipientRecord,
};
use crate::traits::StockStore;

/// Length of generated document ids.
const ID_LEN: usize = 20;

#[derive(Default)]
struct Inner {
    products: BTreeMap<String, ProductDocument>,
    /// Alerts in insertion order.
    alerts: Vec<AlertRecord>,
    recipients: BTreeMap<String, RecipientRecord>,
}

/// A `StockStore` kept entirely in process memory.
///
/// [`MemoryStore::insert_alert_unless_open`] performs its lookup and insert
/// under a single lock acquisition, so it never writes duplicate open alerts.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    feed: Option<mpsc::UnboundedSender<ChangeEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that publishes a [`ChangeEvent`] after every product
    /// write and every alert insert.
    ///
    /// The feed is unbounded: the consumer may itself write to this store
    /// while handling an event, so a write must never wait for it. If the
    /// receiver is gone the event is dropped with a warning and the write
    /// still succeeds.
    pub fn with_change_feed(feed: mpsc::UnboundedSender<ChangeEvent>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            feed: Some(feed),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StorageError> {
        self.inner
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }

    fn publish(&self, event: ChangeEvent) {
        let Some(feed) = &self.feed else {
            return;
        };
        let label = event.label();
        if feed.send(event).is_err() {
            tracing::warn!(event = label, "change feed closed; event dropped");
        }
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

fn unused_id<V>(taken: &BTreeMap<String, V>) -> String {
    loop {
        let id = generate_id();
        if !taken.contains_key(&id) {
            return id;
        }
    }
}

fn unused_alert_id(alerts: &[AlertRecord]) -> String {
    loop {
        let id = generate_id();
        if !alerts.iter().any(|a| a.id == id) {
            return id;
        }
    }
}

fn is_open(alert: &AlertRecord, kind: AlertKind, product_id: &str) -> bool {
    !alert.resolved && alert.kind == kind && alert.product_id == product_id
}

fn apply_limit<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    if limit > 0 {
        items.truncate(limit);
    }
    items
}

#[async_trait]
impl StockStore for MemoryStore {
    async fn get_product(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductDocument>, StorageError> {
        Ok(self.lock()?.products.get(product_id).cloned())
    }

    async fn create_product(&self, document: ProductDocument) -> Result<String, StorageError> {
        let id = {
            let mut inner = self.lock()?;
            let id = unused_id(&inner.products);
            inner.products.insert(id.clone(), document.clone());
            id
        };
        self.publish(ChangeEvent::ProductWritten {
            product_id: id.clone(),
            before: None,
            after: Some(document),
        });
        Ok(id)
    }

    async fn create_products(
        &self,
        documents: Vec<ProductDocument>,
    ) -> Result<Vec<String>, StorageError> {
        let written: Vec<(String, ProductDocument)> = {
            let mut inner = self.lock()?;
            let mut written = Vec::with_capacity(documents.len());
            for document in documents {
                let id = unused_id(&inner.products);
                inner.products.insert(id.clone(), document.clone());
                written.push((id, document));
            }
            written
        };

        let mut ids = Vec::with_capacity(written.len());
        for (id, document) in written {
            ids.push(id.clone());
            self.publish(ChangeEvent::ProductWritten {
                product_id: id,
                before: None,
                after: Some(document),
            });
        }
        Ok(ids)
    }

    async fn merge_product(
        &self,
        product_id: &str,
        patch: ProductDocument,
    ) -> Result<ProductDocument, StorageError> {
        let (before, after) = {
            let mut inner = self.lock()?;
            let before = inner.products.get(product_id).cloned();
            let mut after = before.clone().unwrap_or_default();
            after.extend(patch);
            inner.products.insert(product_id.to_string(), after.clone());
            (before, after)
        };
        self.publish(ChangeEvent::ProductWritten {
            product_id: product_id.to_string(),
            before,
            after: Some(after.clone()),
        });
        Ok(after)
    }

    async fn delete_product(&self, product_id: &str) -> Result<bool, StorageError> {
        let before = self.lock()?.products.remove(product_id);
        let existed = before.is_some();
        if existed {
            self.publish(ChangeEvent::ProductWritten {
                product_id: product_id.to_string(),
                before,
                after: None,
            });
        }
        Ok(existed)
    }

    async fn find_open_alert(
        &self,
        kind: AlertKind,
        product_id: &str,
    ) -> Result<Option<AlertRecord>, StorageError> {
        Ok(self
            .lock()?
            .alerts
            .iter()
            .find(|a| is_open(a, kind, product_id))
            .cloned())
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<AlertRecord, StorageError> {
        let record = {
            let mut inner = self.lock()?;
            let record = alert.into_record(unused_alert_id(&inner.alerts));
            inner.alerts.push(record.clone());
            record
        };
        self.publish(ChangeEvent::AlertCreated(record.clone()));
        Ok(record)
    }

    async fn insert_alert_unless_open(
        &self,
        alert: NewAlert,
    ) -> Result<AlertInsert, StorageError> {
        let record = {
            let mut inner = self.lock()?;
            if let Some(existing) = inner
                .alerts
                .iter()
                .find(|a| is_open(a, alert.kind, &alert.product_id))
            {
                return Ok(AlertInsert::AlreadyOpen(existing.clone()));
            }
            let record = alert.into_record(unused_alert_id(&inner.alerts));
            inner.alerts.push(record.clone());
            record
        };
        self.publish(ChangeEvent::AlertCreated(record.clone()));
        Ok(AlertInsert::Inserted(record))
    }

    async fn get_alert(&self, alert_id: &str) -> Result<AlertRecord, StorageError> {
        self.lock()?
            .alerts
            .iter()
            .find(|a| a.id == alert_id)
            .cloned()
            .ok_or_else(|| StorageError::AlertNotFound {
                alert_id: alert_id.to_string(),
            })
    }

    async fn mark_alert_resolved(
        &self,
        alert_id: &str,
        at: OffsetDateTime,
    ) -> Result<AlertRecord, StorageError> {
        let mut inner = self.lock()?;
        let alert = inner
            .alerts
            .iter_mut()
            .find(|a| a.id == alert_id)
            .ok_or_else(|| StorageError::AlertNotFound {
                alert_id: alert_id.to_string(),
            })?;
        if !alert.resolved {
            alert.resolved = true;
            alert.resolved_at = Some(at);
        }
        Ok(alert.clone())
    }

    async fn list_alerts(
        &self,
        resolved: bool,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let inner = self.lock()?;
        // Reverse insertion order first so equal timestamps stay newest first.
        let mut alerts: Vec<AlertRecord> = inner
            .alerts
            .iter()
            .rev()
            .filter(|a| a.resolved == resolved)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| Reverse(a.created_at));
        Ok(apply_limit(alerts, limit))
    }

    async fn list_recipients(
        &self,
        notify_only: bool,
    ) -> Result<Vec<RecipientRecord>, StorageError> {
        let inner = self.lock()?;
        let mut recipients: Vec<RecipientRecord> = inner
            .recipients
            .values()
            .filter(|r| !notify_only || r.notify)
            .cloned()
            .collect();
        recipients.sort_by_key(|r| Reverse(r.created_at));
        Ok(recipients)
    }

    async fn get_recipient(&self, recipient_id: &str) -> Result<RecipientRecord, StorageError> {
        self.lock()?
            .recipients
            .get(recipient_id)
            .cloned()
            .ok_or_else(|| StorageError::RecipientNotFound {
                recipient_id: recipient_id.to_string(),
            })
    }

    async fn upsert_recipient(
        &self,
        recipient_id: &str,
        email: &str,
        notify: bool,
        at: OffsetDateTime,
    ) -> Result<RecipientRecord, StorageError> {
        let mut inner = self.lock()?;
        let entry = inner
            .recipients
            .entry(recipient_id.to_string())
            .or_insert_with(|| RecipientRecord {
                id: recipient_id.to_string(),
                email: String::new(),
                notify: false,
                created_at: Some(at),
                updated_at: None,
            });
        entry.email = email.to_string();
        entry.notify = notify;
        entry.created_at.get_or_insert(at);
        entry.updated_at = Some(at);
        Ok(entry.clone())
    }

    async fn set_recipient_notify(
        &self,
        recipient_id: &str,
        notify: bool,
        at: OffsetDateTime,
    ) -> Result<RecipientRecord, StorageError> {
        let mut inner = self.lock()?;
        let entry = inner
            .recipients
            .entry(recipient_id.to_string())
            .or_insert_with(|| RecipientRecord {
                id: recipient_id.to_string(),
                email: String::new(),
                notify: false,
                created_at: None,
                updated_at: None,
            });
        entry.notify = notify;
        entry.updated_at = Some(at);
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::macros::datetime;

    use super::*;

    fn low_stock(product_id: &str, inventory: i64) -> NewAlert {
        NewAlert {
            kind: AlertKind::LowStock,
            product_id: product_id.to_string(),
            product_name: "Argan Oil".to_string(),
            inventory,
            created_at: datetime!(2026-03-01 12:00 UTC),
        }
    }

    fn doc(value: serde_json::Value) -> ProductDocument {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn guarded_insert_is_atomic_under_contention() {
        let store = Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.insert_alert_unless_open(low_stock("p-1", i)).await
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if let AlertInsert::Inserted(_) = handle.await.unwrap().unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.list_alerts(false, 0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn feed_reports_before_and_after_documents() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = MemoryStore::with_change_feed(tx);

        let id = store
            .create_product(doc(serde_json::json!({"name": "Shampoo", "inventory": 10})))
            .await
            .unwrap();
        store
            .merge_product(&id, doc(serde_json::json!({"inventory": 3})))
            .await
            .unwrap();

        let created = rx.recv().await.unwrap();
        assert!(matches!(
            created,
            ChangeEvent::ProductWritten { before: None, .. }
        ));

        match rx.recv().await.unwrap() {
            ChangeEvent::ProductWritten {
                product_id,
                before,
                after,
            } => {
                assert_eq!(product_id, id);
                assert_eq!(before.unwrap()["inventory"], 10);
                let after = after.unwrap();
                assert_eq!(after["inventory"], 3);
                assert_eq!(after["name"], "Shampoo");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn feed_reports_alert_inserts_but_not_suppressed_ones() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = MemoryStore::with_change_feed(tx);

        store
            .insert_alert_unless_open(low_stock("p-1", 3))
            .await
            .unwrap();
        store
            .insert_alert_unless_open(low_stock("p-1", 2))
            .await
            .unwrap();
        drop(store);

        let mut created = 0;
        while let Some(event) = rx.recv().await {
            if let ChangeEvent::AlertCreated(alert) = event {
                assert_eq!(alert.inventory, 3);
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn closed_feed_does_not_fail_writes() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let store = MemoryStore::with_change_feed(tx);

        let id = store
            .create_product(doc(serde_json::json!({"inventory": 1})))
            .await
            .unwrap();
        assert!(store.get_product(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn writes_do_not_wait_for_an_idle_consumer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = MemoryStore::with_change_feed(tx);

        let burst = async {
            for i in 0..500 {
                store
                    .create_product(doc(serde_json::json!({"inventory": i})))
                    .await
                    .unwrap();
                store
                    .insert_alert_unless_open(low_stock(&format!("p-{i}"), 1))
                    .await
                    .unwrap();
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(2), burst)
            .await
            .expect("writes stalled on the change feed");

        drop(store);
        let mut events = 0;
        while rx.recv().await.is_some() {
            events += 1;
        }
        assert_eq!(events, 1000);
    }

    #[tokio::test]
    async fn deleting_missing_product_publishes_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = MemoryStore::with_change_feed(tx);

        assert!(!store.delete_product("nope").await.unwrap());
        drop(store);
        assert!(rx.recv().await.is_none());
    }
}
