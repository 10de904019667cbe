use std::future::Future;

use super::{make_alert, TestResult};
use crate::record::{AlertInsert, AlertKind};
use crate::StockStore;

pub(super) async fn run_alert_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::new(
            "alerts",
            "insert_assigns_id_and_starts_unresolved",
            insert_assigns_id_and_starts_unresolved(factory).await,
        ),
        TestResult::new(
            "alerts",
            "find_open_alert_matches_product_and_kind",
            find_open_alert_matches_product_and_kind(factory).await,
        ),
        TestResult::new(
            "alerts",
            "guarded_insert_suppresses_open_alert",
            guarded_insert_suppresses_open_alert(factory).await,
        ),
        TestResult::new(
            "alerts",
            "guarded_insert_allowed_after_resolve",
            guarded_insert_allowed_after_resolve(factory).await,
        ),
        TestResult::new(
            "alerts",
            "list_alerts_newest_first",
            list_alerts_newest_first(factory).await,
        ),
        TestResult::new(
            "alerts",
            "list_alerts_respects_limit",
            list_alerts_respects_limit(factory).await,
        ),
    ]
}

async fn insert_assigns_id_and_starts_unresolved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let alert = store
        .insert_alert(make_alert("p-1", 3, 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    if alert.id.is_empty() {
        return Err("store assigned an empty id".to_string());
    }
    if alert.resolved || alert.resolved_at.is_some() {
        return Err(format!("new alert should be unresolved: {alert:?}"));
    }
    let fetched = store
        .get_alert(&alert.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if fetched != alert {
        return Err(format!("fetched {fetched:?} != inserted {alert:?}"));
    }
    Ok(())
}

async fn find_open_alert_matches_product_and_kind<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let mut other = make_alert("p-1", 0, 0);
    other.kind = AlertKind::Other;
    store
        .insert_alert(other)
        .await
        .map_err(|e| format!("insert other: {e}"))?;
    store
        .insert_alert(make_alert("p-2", 1, 1))
        .await
        .map_err(|e| format!("insert p-2: {e}"))?;

    let found = store
        .find_open_alert(AlertKind::LowStock, "p-1")
        .await
        .map_err(|e| format!("find: {e}"))?;
    if let Some(alert) = found {
        return Err(format!("expected no low_stock alert for p-1, got {alert:?}"));
    }

    let found = store
        .find_open_alert(AlertKind::LowStock, "p-2")
        .await
        .map_err(|e| format!("find: {e}"))?
        .ok_or("expected open alert for p-2")?;
    if found.product_id != "p-2" {
        return Err(format!("wrong product: {}", found.product_id));
    }
    Ok(())
}

async fn guarded_insert_suppresses_open_alert<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let first = match store
        .insert_alert_unless_open(make_alert("p-1", 3, 0))
        .await
        .map_err(|e| format!("first insert: {e}"))?
    {
        AlertInsert::Inserted(alert) => alert,
        AlertInsert::AlreadyOpen(alert) => {
            return Err(format!("empty store reported open alert {alert:?}"))
        }
    };

    match store
        .insert_alert_unless_open(make_alert("p-1", 2, 1))
        .await
        .map_err(|e| format!("second insert: {e}"))?
    {
        AlertInsert::AlreadyOpen(existing) if existing.id == first.id => {}
        other => return Err(format!("expected AlreadyOpen({}), got {other:?}", first.id)),
    }

    let open = store
        .list_alerts(false, 0)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if open.len() != 1 {
        return Err(format!("expected 1 open alert, got {}", open.len()));
    }
    Ok(())
}

async fn guarded_insert_allowed_after_resolve<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let first = store
        .insert_alert(make_alert("p-1", 3, 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    store
        .mark_alert_resolved(&first.id, super::at_minute(5))
        .await
        .map_err(|e| format!("resolve: {e}"))?;

    match store
        .insert_alert_unless_open(make_alert("p-1", 1, 10))
        .await
        .map_err(|e| format!("guarded insert: {e}"))?
    {
        AlertInsert::Inserted(alert) if alert.id != first.id => Ok(()),
        other => Err(format!("expected a fresh insert, got {other:?}")),
    }
}

async fn list_alerts_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for (product, minute) in [("p-a", 2), ("p-b", 0), ("p-c", 1)] {
        store
            .insert_alert(make_alert(product, 1, minute))
            .await
            .map_err(|e| format!("insert {product}: {e}"))?;
    }

    let listed: Vec<String> = store
        .list_alerts(false, 0)
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|a| a.product_id)
        .collect();
    if listed != ["p-a", "p-c", "p-b"] {
        return Err(format!("expected [p-a, p-c, p-b], got {listed:?}"));
    }

    let resolved = store
        .list_alerts(true, 0)
        .await
        .map_err(|e| format!("list resolved: {e}"))?;
    if !resolved.is_empty() {
        return Err(format!("expected no resolved alerts, got {}", resolved.len()));
    }
    Ok(())
}

async fn list_alerts_respects_limit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for minute in 0..7 {
        let alert = store
            .insert_alert(make_alert(&format!("p-{minute}"), 0, minute))
            .await
            .map_err(|e| format!("insert: {e}"))?;
        store
            .mark_alert_resolved(&alert.id, super::at_minute(minute + 30))
            .await
            .map_err(|e| format!("resolve: {e}"))?;
    }

    let tail = store
        .list_alerts(true, 5)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if tail.len() != 5 {
        return Err(format!("expected 5 alerts, got {}", tail.len()));
    }
    if tail[0].product_id != "p-6" {
        return Err(format!("expected newest p-6 first, got {}", tail[0].product_id));
    }
    Ok(())
}
