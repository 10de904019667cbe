//! The store's change feed wired straight into the dispatcher, as
//! `stockwatch serve` runs it. Alert inserts made by dispatched tasks are
//! published back into the same feed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use stockwatch_pipeline::{
    change_feed, spawn_dispatcher, DispatchConfig, DispatchStats, MailMessage, MailTransport,
    Orchestrator, PipelineConfig, TransportError,
};
use stockwatch_storage::{MemoryStore, ProductDocument, StockStore};
use tokio::task::JoinHandle;

/// Transport that takes a little time per send and counts subjects.
#[derive(Default)]
struct CountingTransport {
    subjects: Mutex<HashMap<String, usize>>,
}

impl CountingTransport {
    fn total(&self) -> usize {
        self.subjects.lock().unwrap().values().sum()
    }

    fn counts(&self) -> HashMap<String, usize> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for CountingTransport {
    async fn send(&self, message: &MailMessage) -> Result<String, TransportError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut subjects = self.subjects.lock().unwrap();
        *subjects.entry(message.subject.clone()).or_default() += 1;
        Ok(format!("<{}@relay.test>", subjects.len()))
    }

    fn transport_id(&self) -> &str {
        "counting"
    }
}

/// A tiny in-flight cap and a short deadline, so a stalled feed shows up as
/// slow writes and timed-out tasks.
const TIGHT: DispatchConfig = DispatchConfig {
    max_in_flight: 2,
    task_deadline: Duration::from_secs(3),
};

struct Pipeline {
    store: Arc<MemoryStore>,
    transport: Arc<CountingTransport>,
    dispatcher: JoinHandle<DispatchStats>,
}

impl Pipeline {
    fn start(config: DispatchConfig) -> Self {
        let (feed, events) = change_feed();
        let store = Arc::new(MemoryStore::with_change_feed(feed));
        let transport = Arc::new(CountingTransport::default());
        let shared: Arc<dyn MailTransport> = transport.clone();
        let orch = Arc::new(Orchestrator::with_registry(
            store.clone(),
            Some(shared),
            PipelineConfig::default().with_fallback_csv("ops@salon.test"),
        ));
        Self {
            store,
            transport,
            dispatcher: spawn_dispatcher(orch, events, config),
        }
    }

    /// Wait until `expected` messages were sent, then give stragglers a
    /// moment to show up.
    async fn settle(&self, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.transport.total() < expected && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

fn product(name: &str, inventory: i64) -> ProductDocument {
    json!({ "name": name, "inventory": inventory })
        .as_object()
        .cloned()
        .unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn burst_of_low_stock_creates_notifies_each_alert_once() {
    let pipeline = Pipeline::start(TIGHT);

    let started = Instant::now();
    for i in 0..40 {
        pipeline
            .store
            .create_product(product(&format!("Item {i}"), 1))
            .await
            .unwrap();
    }
    let writes_took = started.elapsed();
    assert!(
        writes_took < Duration::from_secs(1),
        "product writes waited on the dispatcher for {writes_took:?}"
    );

    pipeline.settle(40).await;

    let alerts = pipeline.store.list_alerts(false, 0).await.unwrap();
    assert_eq!(alerts.len(), 40);
    let counts = pipeline.transport.counts();
    assert_eq!(counts.len(), 40, "every alert gets a message");
    assert!(
        counts.values().all(|&n| n == 1),
        "no alert is notified twice: {counts:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn seeded_catalog_dropping_below_threshold_is_fully_delivered() {
    let pipeline = Pipeline::start(TIGHT);

    let docs = (0..25).map(|i| product(&format!("Tonic {i}"), 10)).collect();
    let ids = pipeline.store.create_products(docs).await.unwrap();

    let started = Instant::now();
    for id in &ids {
        pipeline
            .store
            .merge_product(id, product_patch(2))
            .await
            .unwrap();
    }
    assert!(started.elapsed() < Duration::from_secs(1));
    pipeline.settle(25).await;
    assert_eq!(pipeline.transport.total(), 25);

    // Still below the threshold: suppressed, nothing new is sent.
    for id in &ids {
        pipeline
            .store
            .merge_product(id, product_patch(1))
            .await
            .unwrap();
    }
    pipeline.settle(25).await;
    assert_eq!(pipeline.transport.total(), 25);
    assert_eq!(pipeline.store.list_alerts(false, 0).await.unwrap().len(), 25);
}

fn product_patch(inventory: i64) -> ProductDocument {
    json!({ "inventory": inventory })
        .as_object()
        .cloned()
        .unwrap_or_default()
}
