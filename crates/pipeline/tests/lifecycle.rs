//! End-to-end alert lifecycle against an in-memory store and its change feed.
//!
//! The feed is pumped by hand so each step's events are handled before the
//! next write happens.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use stockwatch_pipeline::{
    Delivery, EventOutcome, MailMessage, MailTransport, NotifyOutcome, Orchestrator,
    PipelineConfig, SkipReason, TransportError, WriteOutcome,
};
use stockwatch_storage::{ChangeEvent, MemoryStore, ProductDocument, StockStore};
use time::OffsetDateTime;
use tokio::sync::mpsc;

// ──────────────────────────────────────────────
// Harness
// ──────────────────────────────────────────────

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<MailMessage>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: &MailMessage) -> Result<String, TransportError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(format!("<{}@relay.test>", sent.len()))
    }

    fn transport_id(&self) -> &str {
        "recording"
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    feed: mpsc::UnboundedReceiver<ChangeEvent>,
    orch: Orchestrator<MemoryStore>,
    transport: Arc<RecordingTransport>,
}

impl Harness {
    fn new(config: PipelineConfig, with_transport: bool) -> Self {
        let (tx, feed) = mpsc::unbounded_channel();
        let store = Arc::new(MemoryStore::with_change_feed(tx));
        let transport = Arc::new(RecordingTransport::default());
        let shared: Arc<dyn MailTransport> = transport.clone();
        let shared = with_transport.then_some(shared);
        let orch = Orchestrator::with_registry(store.clone(), shared, config);
        Self {
            store,
            feed,
            orch,
            transport,
        }
    }

    fn with_fallback(csv: &str) -> Self {
        Self::new(PipelineConfig::default().with_fallback_csv(csv), true)
    }

    /// Handle every queued event, including ones published while handling.
    async fn pump(&mut self) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(event) = self.feed.try_recv() {
            outcomes.push(self.orch.handle(event).await.unwrap());
        }
        outcomes
    }

    async fn set_inventory(&mut self, product_id: &str, inventory: i64) -> Vec<EventOutcome> {
        self.store
            .merge_product(product_id, doc(json!({ "inventory": inventory })))
            .await
            .unwrap();
        self.pump().await
    }
}

fn doc(value: serde_json::Value) -> ProductDocument {
    value.as_object().cloned().unwrap_or_default()
}

fn writes(outcomes: &[EventOutcome]) -> Vec<&WriteOutcome> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            EventOutcome::Write(w) => Some(w),
            EventOutcome::Notify(_) => None,
        })
        .collect()
}

fn deliveries(outcomes: &[EventOutcome]) -> Vec<&Delivery> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            EventOutcome::Notify(NotifyOutcome::Attempted { delivery, .. }) => Some(delivery),
            _ => None,
        })
        .collect()
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_alerts_once_per_episode() {
    let mut h = Harness::with_fallback("ops@salon.test");
    let product_id = h
        .store
        .create_product(doc(json!({ "name": "Argan Oil", "inventory": 10 })))
        .await
        .unwrap();
    let created = h.pump().await;
    assert_eq!(writes(&created), vec![&WriteOutcome::NoCrossing]);

    // 10 -> 3: alert and one notification.
    let outcomes = h.set_inventory(&product_id, 3).await;
    let first = match writes(&outcomes).as_slice() {
        [WriteOutcome::Created(alert)] => alert.clone(),
        other => panic!("expected one Created, got {other:?}"),
    };
    assert_eq!(first.inventory, 3);
    assert_eq!(first.product_name, "Argan Oil");
    assert!(deliveries(&outcomes)[0].is_delivered());
    assert_eq!(h.transport.sent().len(), 1);

    // 3 -> 2: suppressed, nothing sent.
    let outcomes = h.set_inventory(&product_id, 2).await;
    match writes(&outcomes).as_slice() {
        [WriteOutcome::Suppressed { existing }] => assert_eq!(existing.id, first.id),
        other => panic!("expected Suppressed, got {other:?}"),
    }
    assert!(deliveries(&outcomes).is_empty());
    assert_eq!(h.transport.sent().len(), 1);

    // Resolve, then 2 -> 1: a fresh alert.
    h.orch.alerts().resolve(&first.id).await.unwrap();
    let outcomes = h.set_inventory(&product_id, 1).await;
    let second = match writes(&outcomes).as_slice() {
        [WriteOutcome::Created(alert)] => alert.clone(),
        other => panic!("expected Created, got {other:?}"),
    };
    assert_ne!(second.id, first.id);
    assert_eq!(h.transport.sent().len(), 2);

    let overview = h.orch.alerts().overview().await.unwrap();
    assert_eq!(overview.unresolved.len(), 1);
    assert_eq!(overview.unresolved[0].id, second.id);
    assert_eq!(overview.recent_resolved.len(), 1);
    assert_eq!(overview.recent_resolved[0].id, first.id);
}

#[tokio::test]
async fn notification_carries_subject_and_recipients() {
    let mut h = Harness::with_fallback("ops@salon.test, owner@salon.test");
    h.store
        .upsert_recipient("uid-1", "ops@salon.test", true, OffsetDateTime::now_utc())
        .await
        .unwrap();
    h.store
        .create_product(doc(json!({ "name": "Shea Butter", "inventory": 4 })))
        .await
        .unwrap();
    h.pump().await;

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Low stock: Shea Butter (4 left)");
    assert_eq!(sent[0].to, vec!["ops@salon.test", "owner@salon.test"]);
    assert_eq!(sent[0].from, PipelineConfig::default().mail_from);
}

#[tokio::test]
async fn registry_and_fallback_overlap_sends_to_one_address() {
    let mut h = Harness::with_fallback("a@x.com");
    h.store
        .upsert_recipient("uid-1", "a@x.com", true, OffsetDateTime::now_utc())
        .await
        .unwrap();
    h.store
        .create_product(doc(json!({ "name": "Gel", "inventory": 0 })))
        .await
        .unwrap();
    let outcomes = h.pump().await;

    match outcomes.last() {
        Some(EventOutcome::Notify(NotifyOutcome::Attempted { recipients, .. })) => {
            assert_eq!(*recipients, 1)
        }
        other => panic!("expected a notification attempt, got {other:?}"),
    }
    assert_eq!(h.transport.sent()[0].to, vec!["a@x.com"]);
}

#[tokio::test]
async fn without_transport_alert_stays_open_and_send_is_skipped() {
    let mut h = Harness::new(
        PipelineConfig::default().with_fallback_csv("ops@salon.test"),
        false,
    );
    h.store
        .create_product(doc(json!({ "name": "Gel", "inventory": 2 })))
        .await
        .unwrap();
    let outcomes = h.pump().await;

    assert!(matches!(
        deliveries(&outcomes).as_slice(),
        [Delivery::Skipped(SkipReason::NoTransport)]
    ));
    let open = h.orch.alerts().list_unresolved().await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(!open[0].resolved);
}

#[tokio::test]
async fn empty_recipient_set_is_skipped() {
    let mut h = Harness::new(PipelineConfig::default(), true);
    h.store
        .create_product(doc(json!({ "name": "Gel", "inventory": 2 })))
        .await
        .unwrap();
    let outcomes = h.pump().await;

    assert!(matches!(
        deliveries(&outcomes).as_slice(),
        [Delivery::Skipped(SkipReason::NoRecipients)]
    ));
    assert!(h.transport.sent().is_empty());
}

#[tokio::test]
async fn renaming_does_not_refresh_open_alert_name() {
    let mut h = Harness::with_fallback("ops@salon.test");
    let product_id = h
        .store
        .create_product(doc(json!({ "name": "Old Name", "inventory": 1 })))
        .await
        .unwrap();
    h.pump().await;

    h.store
        .merge_product(&product_id, doc(json!({ "name": "New Name" })))
        .await
        .unwrap();
    let outcomes = h.pump().await;
    assert_eq!(writes(&outcomes), vec![&WriteOutcome::NoCrossing]);

    let open = h.orch.alerts().list_unresolved().await.unwrap();
    assert_eq!(open[0].product_name, "Old Name");
}

#[tokio::test]
async fn custom_threshold_and_deletion() {
    let config = PipelineConfig {
        low_stock_threshold: 20,
        ..PipelineConfig::default()
    }
    .with_fallback_csv("ops@salon.test");
    let mut h = Harness::new(config, true);
    let product_id = h
        .store
        .create_product(doc(json!({ "name": "Comb", "inventory": 25 })))
        .await
        .unwrap();
    h.pump().await;

    let outcomes = h.set_inventory(&product_id, 19).await;
    assert!(matches!(
        writes(&outcomes).as_slice(),
        [WriteOutcome::Created(_)]
    ));

    h.store.delete_product(&product_id).await.unwrap();
    let outcomes = h.pump().await;
    assert_eq!(writes(&outcomes), vec![&WriteOutcome::NoCrossing]);
}

#[tokio::test]
async fn redelivered_write_event_is_suppressed() {
    let mut h = Harness::with_fallback("ops@salon.test");
    let before = doc(json!({ "name": "Gel", "inventory": 10 }));
    let after = doc(json!({ "name": "Gel", "inventory": 3 }));
    let event = ChangeEvent::ProductWritten {
        product_id: "p-1".to_string(),
        before: Some(before),
        after: Some(after),
    };

    let first = h.orch.handle(event.clone()).await.unwrap();
    let second = h.orch.handle(event).await.unwrap();
    assert!(matches!(first, EventOutcome::Write(WriteOutcome::Created(_))));
    assert!(matches!(
        second,
        EventOutcome::Write(WriteOutcome::Suppressed { .. })
    ));
    h.pump().await;
    assert_eq!(h.transport.sent().len(), 1);
}
