use std::future::Future;

use super::{make_product, TestResult};
use crate::record::ProductDocument;
use crate::StockStore;

pub(super) async fn run_product_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::new(
            "products",
            "create_then_get",
            create_then_get(factory).await,
        ),
        TestResult::new(
            "products",
            "get_missing_is_none",
            get_missing_is_none(factory).await,
        ),
        TestResult::new(
            "products",
            "merge_keeps_unpatched_fields",
            merge_keeps_unpatched_fields(factory).await,
        ),
        TestResult::new(
            "products",
            "merge_creates_missing_document",
            merge_creates_missing_document(factory).await,
        ),
        TestResult::new(
            "products",
            "delete_reports_existence",
            delete_reports_existence(factory).await,
        ),
        TestResult::new(
            "products",
            "batch_create_assigns_distinct_ids",
            batch_create_assigns_distinct_ids(factory).await,
        ),
    ]
}

async fn create_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let id = store
        .create_product(make_product("Conditioner", 12))
        .await
        .map_err(|e| format!("create: {e}"))?;
    if id.is_empty() {
        return Err("store assigned an empty id".to_string());
    }
    let doc = store
        .get_product(&id)
        .await
        .map_err(|e| format!("get: {e}"))?
        .ok_or("created product not found")?;
    if doc.get("inventory") != Some(&serde_json::json!(12)) {
        return Err(format!("expected inventory 12, got {:?}", doc.get("inventory")));
    }
    Ok(())
}

async fn get_missing_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_product("missing").await {
        Ok(None) => Ok(()),
        Ok(Some(doc)) => Err(format!("expected None, got {doc:?}")),
        Err(e) => Err(format!("get: {e}")),
    }
}

async fn merge_keeps_unpatched_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let id = store
        .create_product(make_product("Hair Gel", 8))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut patch = ProductDocument::new();
    patch.insert("inventory".to_string(), serde_json::json!(2));
    let after = store
        .merge_product(&id, patch)
        .await
        .map_err(|e| format!("merge: {e}"))?;

    if after.get("name") != Some(&serde_json::json!("Hair Gel")) {
        return Err(format!("name lost in merge: {after:?}"));
    }
    if after.get("inventory") != Some(&serde_json::json!(2)) {
        return Err(format!("inventory not patched: {after:?}"));
    }
    Ok(())
}

async fn merge_creates_missing_document<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .merge_product("p-new", make_product("Comb", 1))
        .await
        .map_err(|e| format!("merge: {e}"))?;
    store
        .get_product("p-new")
        .await
        .map_err(|e| format!("get: {e}"))?
        .ok_or("merged product not found")?;
    Ok(())
}

async fn delete_reports_existence<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let id = store
        .create_product(make_product("Brush", 4))
        .await
        .map_err(|e| format!("create: {e}"))?;

    if !store
        .delete_product(&id)
        .await
        .map_err(|e| format!("delete: {e}"))?
    {
        return Err("first delete reported missing document".to_string());
    }
    if store
        .delete_product(&id)
        .await
        .map_err(|e| format!("delete again: {e}"))?
    {
        return Err("second delete reported existing document".to_string());
    }
    Ok(())
}

async fn batch_create_assigns_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: StockStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let ids = store
        .create_products(vec![
            make_product("A", 1),
            make_product("B", 2),
            make_product("C", 3),
        ])
        .await
        .map_err(|e| format!("batch: {e}"))?;

    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    if ids.len() != 3 || unique.len() != 3 {
        return Err(format!("expected 3 distinct ids, got {ids:?}"));
    }
    for id in &ids {
        store
            .get_product(id)
            .await
            .map_err(|e| format!("get {id}: {e}"))?
            .ok_or_else(|| format!("batch product {id} not found"))?;
    }
    Ok(())
}
