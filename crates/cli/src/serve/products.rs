//! Product catalog handlers. Every write here lands in the store's change
//! feed and so drives the low-stock pipeline.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use stockwatch_storage::{ProductDocument, StockStore};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::handlers::storage_error;
use super::json_error;
use super::state::AppState;

const DEFAULT_CATEGORY: &str = "Hair Care";

/// POST /admin/products
pub(crate) async fn handle_create_product(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let Some(input) = body.as_object() else {
        return json_error(StatusCode::BAD_REQUEST, "expected a JSON object").into_response();
    };
    let has_name = input
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.trim().is_empty());
    let has_price = input.get("priceCents").is_some_and(Value::is_number);
    if !has_name || !has_price {
        return json_error(StatusCode::BAD_REQUEST, "name & priceCents required").into_response();
    }

    let document = normalize_product(input, OffsetDateTime::now_utc());
    match state.store.create_product(document.clone()).await {
        Ok(id) => {
            tracing::info!(product_id = %id, "product created");
            (StatusCode::OK, Json(with_id(id, document))).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// PUT /admin/products/{id}
///
/// Shallow merge; `createdAt` in the body is ignored.
pub(crate) async fn handle_update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Value::Object(mut patch) = body else {
        return json_error(StatusCode::BAD_REQUEST, "expected a JSON object").into_response();
    };
    patch.remove("createdAt");
    patch.remove("id");

    match state.store.merge_product(&id, patch).await {
        Ok(document) => (StatusCode::OK, Json(with_id(id, document))).into_response(),
        Err(e) => storage_error(e),
    }
}

/// DELETE /admin/products/{id}
pub(crate) async fn handle_delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.store.delete_product(&id).await {
        Ok(existed) => {
            tracing::info!(product_id = %id, existed, "product deleted");
            (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// POST /admin/seed  body: `{ "products": [...] }`
pub(crate) async fn handle_seed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    let products = match body.get("products").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => list,
        _ => return json_error(StatusCode::BAD_REQUEST, "No products provided").into_response(),
    };

    match seed_products(&state, products).await {
        Ok(ids) => {
            let response = serde_json::json!({ "ok": true, "count": ids.len(), "ids": ids });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// Normalize and batch-create `products`. Non-object entries are skipped.
pub(crate) async fn seed_products(
    state: &AppState,
    products: &[Value],
) -> Result<Vec<String>, stockwatch_storage::StorageError> {
    let now = OffsetDateTime::now_utc();
    let documents: Vec<ProductDocument> = products
        .iter()
        .filter_map(Value::as_object)
        .map(|input| normalize_product(input, now))
        .collect();
    let ids = state.store.create_products(documents).await?;
    tracing::info!(count = ids.len(), "catalog seeded");
    Ok(ids)
}

/// Build a catalog document from loosely typed input, filling defaults.
pub(crate) fn normalize_product(
    input: &Map<String, Value>,
    created_at: OffsetDateTime,
) -> ProductDocument {
    let string_or = |key: &str, default: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };
    let array = |key: &str| match input.get(key) {
        Some(Value::Array(items)) => Value::Array(items.clone()),
        _ => Value::Array(Vec::new()),
    };
    let in_stock = match input.get("inStock") {
        None | Some(Value::Null) => true,
        flag => super::handlers::is_truthy(flag),
    };
    let created_at = created_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| created_at.unix_timestamp().to_string());

    let mut doc = Map::new();
    doc.insert("name".to_string(), Value::String(string_or("name", "")));
    doc.insert(
        "description".to_string(),
        Value::String(string_or("description", "")),
    );
    doc.insert("priceCents".to_string(), coerce_number(input.get("priceCents")));
    doc.insert("images".to_string(), array("images"));
    doc.insert(
        "category".to_string(),
        Value::String(string_or("category", DEFAULT_CATEGORY)),
    );
    doc.insert("tags".to_string(), array("tags"));
    doc.insert("inStock".to_string(), Value::Bool(in_stock));
    doc.insert("inventory".to_string(), coerce_number(input.get("inventory")));
    doc.insert("createdAt".to_string(), Value::String(created_at));
    doc
}

/// Numbers pass through, numeric strings are parsed, anything else is 0.
fn coerce_number(value: Option<&Value>) -> Value {
    let parsed = match value {
        Some(Value::Number(n)) => return Value::Number(n.clone()),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(Value::Bool(true)) => Some(1.0),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() && f.fract() == 0.0 => Value::from(f as i64),
        Some(f) if f.is_finite() => Value::from(f),
        _ => Value::from(0),
    }
}

fn with_id(id: String, document: ProductDocument) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::String(id));
    out.extend(document);
    Value::Object(out)
}
