use std::future::Future;

use super::{at_minute, TestResult};
use crate::{StockStore, StorageError};

pub(super) async fn run_recipient_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::new(
            "recipients",
            "upsert_then_get",
            upsert_then_get(factory).await,
        ),
        TestResult::new(
            "recipients",
            "upsert_keeps_created_at",
            upsert_keeps_created_at(factory).await,
        ),
        TestResult::new(
            "recipients",
            "toggle_unknown_creates_bare_entry",
            toggle_unknown_creates_bare_entry(factory).await,
        ),
        TestResult::new(
            "recipients",
            "list_notify_only_filters_opted_out",
            list_notify_only_filters_opted_out(factory).await,
        ),
        TestResult::new(
            "recipients",
            "get_unknown_recipient_not_found",
            get_unknown_recipient_not_found(factory).await,
        ),
    ]
}

async fn upsert_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .upsert_recipient("uid-1", "ops@salon.test", true, at_minute(0))
        .await
        .map_err(|e| format!("upsert: {e}"))?;

    let entry = store
        .get_recipient("uid-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if entry.email != "ops@salon.test" || !entry.notify {
        return Err(format!("unexpected entry: {entry:?}"));
    }
    Ok(())
}

async fn upsert_keeps_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .upsert_recipient("uid-1", "old@salon.test", true, at_minute(0))
        .await
        .map_err(|e| format!("first upsert: {e}"))?;
    let entry = store
        .upsert_recipient("uid-1", "new@salon.test", false, at_minute(9))
        .await
        .map_err(|e| format!("second upsert: {e}"))?;

    if entry.created_at != Some(at_minute(0)) {
        return Err(format!("created_at overwritten: {entry:?}"));
    }
    if entry.updated_at != Some(at_minute(9)) || entry.email != "new@salon.test" {
        return Err(format!("update not applied: {entry:?}"));
    }
    Ok(())
}

async fn toggle_unknown_creates_bare_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let entry = store
        .set_recipient_notify("uid-9", true, at_minute(3))
        .await
        .map_err(|e| format!("toggle: {e}"))?;
    if !entry.notify || !entry.email.is_empty() {
        return Err(format!("expected bare opted-in entry, got {entry:?}"));
    }
    Ok(())
}

async fn list_notify_only_filters_opted_out<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .upsert_recipient("uid-1", "a@salon.test", true, at_minute(0))
        .await
        .map_err(|e| format!("upsert 1: {e}"))?;
    store
        .upsert_recipient("uid-2", "b@salon.test", true, at_minute(1))
        .await
        .map_err(|e| format!("upsert 2: {e}"))?;
    store
        .set_recipient_notify("uid-2", false, at_minute(2))
        .await
        .map_err(|e| format!("toggle: {e}"))?;

    let all = store
        .list_recipients(false)
        .await
        .map_err(|e| format!("list all: {e}"))?;
    let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
    if ids != ["uid-2", "uid-1"] {
        return Err(format!("expected newest first [uid-2, uid-1], got {ids:?}"));
    }

    let opted_in = store
        .list_recipients(true)
        .await
        .map_err(|e| format!("list notify: {e}"))?;
    if opted_in.len() != 1 || opted_in[0].id != "uid-1" {
        return Err(format!("expected only uid-1, got {opted_in:?}"));
    }
    Ok(())
}

async fn get_unknown_recipient_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_recipient("missing").await {
        Err(StorageError::RecipientNotFound { recipient_id }) if recipient_id == "missing" => {
            Ok(())
        }
        other => Err(format!("expected RecipientNotFound(missing), got {other:?}")),
    }
}
