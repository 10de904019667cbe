//! Behavioural checks any `StockStore` backend must pass.
//!
//! Categories:
//!
//! - `products`: create, merge, delete, batch create
//! - `alerts`: insert, open-alert lookup, guarded insert, newest-first listing
//! - `resolve`: one-way, idempotent resolution and not-found errors
//! - `recipients`: registry upsert, notify toggling, opt-in filtering
//! - `concurrent`: parallel writes from independent tasks
//!
//! ```ignore
//! use stockwatch_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn firestore_store_conforms() {
//!     let report = run_conformance_suite(|| async { test_firestore_store().await }).await;
//!     assert!(report.is_clean(), "{report}");
//! }
//! ```

mod alerts;
mod concurrent;
mod products;
mod recipients;
mod resolve;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;

use crate::record::{AlertKind, NewAlert, ProductDocument};
use crate::StockStore;

/// Outcome of one conformance check.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Area of the store under test: "products", "alerts", "resolve", ...
    pub category: &'static str,
    pub name: &'static str,
    /// `Err` carries what the backend got wrong.
    pub outcome: Result<(), String>,
}

impl TestResult {
    fn new(category: &'static str, name: &'static str, outcome: Result<(), String>) -> Self {
        Self {
            category,
            name,
            outcome,
        }
    }

    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Every check from one [`run_conformance_suite`] call.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
}

impl ConformanceReport {
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed())
    }

    pub fn is_clean(&self) -> bool {
        !self.results.is_empty() && self.failures().next().is_none()
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        writeln!(f, "{} checks, {} failed", self.results.len(), failed)?;
        for r in self.failures() {
            if let Err(why) = &r.outcome {
                writeln!(f, "  {}/{}: {}", r.category, r.name, why)?;
            }
        }
        Ok(())
    }
}

/// Run every check against a storage backend.
///
/// `factory` is called once per check and must return an empty store.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.extend(products::run_product_tests(&factory).await);
    results.extend(alerts::run_alert_tests(&factory).await);
    results.extend(resolve::run_resolve_tests(&factory).await);
    results.extend(recipients::run_recipient_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    ConformanceReport { results }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Fixed base instant; tests offset from it so ordering is deterministic.
const T0: OffsetDateTime = datetime!(2026-01-01 09:00 UTC);

fn at_minute(minute: i64) -> OffsetDateTime {
    T0 + time::Duration::minutes(minute)
}

fn make_alert(product_id: &str, inventory: i64, minute: i64) -> NewAlert {
    NewAlert {
        kind: AlertKind::LowStock,
        product_id: product_id.to_string(),
        product_name: format!("Product {product_id}"),
        inventory,
        created_at: at_minute(minute),
    }
}

fn make_product(name: &str, inventory: i64) -> ProductDocument {
    let mut doc = ProductDocument::new();
    doc.insert("name".to_string(), serde_json::json!(name));
    doc.insert("inventory".to_string(), serde_json::json!(inventory));
    doc
}
