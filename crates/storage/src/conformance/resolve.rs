use std::future::Future;

use super::{at_minute, make_alert, TestResult};
use crate::{StockStore, StorageError};

pub(super) async fn run_resolve_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::new(
            "resolve",
            "resolve_sets_flag_and_timestamp",
            resolve_sets_flag_and_timestamp(factory).await,
        ),
        TestResult::new(
            "resolve",
            "resolve_twice_keeps_first_timestamp",
            resolve_twice_keeps_first_timestamp(factory).await,
        ),
        TestResult::new(
            "resolve",
            "resolve_unknown_alert_not_found",
            resolve_unknown_alert_not_found(factory).await,
        ),
        TestResult::new(
            "resolve",
            "get_unknown_alert_not_found",
            get_unknown_alert_not_found(factory).await,
        ),
    ]
}

async fn resolve_sets_flag_and_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let alert = store
        .insert_alert(make_alert("p-1", 2, 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let resolved = store
        .mark_alert_resolved(&alert.id, at_minute(10))
        .await
        .map_err(|e| format!("resolve: {e}"))?;
    if !resolved.resolved || resolved.resolved_at != Some(at_minute(10)) {
        return Err(format!("resolve did not stick: {resolved:?}"));
    }

    // The snapshot fields must not change on resolution.
    if resolved.inventory != alert.inventory || resolved.created_at != alert.created_at {
        return Err(format!("resolve altered snapshot fields: {resolved:?}"));
    }

    let open = store
        .find_open_alert(alert.kind, "p-1")
        .await
        .map_err(|e| format!("find: {e}"))?;
    if open.is_some() {
        return Err("resolved alert still reported open".to_string());
    }
    Ok(())
}

async fn resolve_twice_keeps_first_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let alert = store
        .insert_alert(make_alert("p-1", 2, 0))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let first = store
        .mark_alert_resolved(&alert.id, at_minute(10))
        .await
        .map_err(|e| format!("first resolve: {e}"))?;
    let second = store
        .mark_alert_resolved(&alert.id, at_minute(20))
        .await
        .map_err(|e| format!("second resolve: {e}"))?;

    if first != second {
        return Err(format!("second resolve changed the record: {second:?}"));
    }
    Ok(())
}

async fn resolve_unknown_alert_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.mark_alert_resolved("missing", at_minute(0)).await {
        Err(StorageError::AlertNotFound { alert_id }) if alert_id == "missing" => Ok(()),
        other => Err(format!("expected AlertNotFound(missing), got {other:?}")),
    }
}

async fn get_unknown_alert_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_alert("missing").await {
        Err(StorageError::AlertNotFound { .. }) => Ok(()),
        other => Err(format!("expected AlertNotFound, got {other:?}")),
    }
}
