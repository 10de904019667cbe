//! Core HTTP route handlers: health, identity, alerts, recipient registry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use stockwatch_pipeline::PipelineError;
use stockwatch_storage::{StockStore, StorageError};
use time::OffsetDateTime;

use super::auth::AdminIdentity;
use super::json_error;
use super::state::AppState;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "Not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /admin/me
pub(crate) async fn handle_me(Extension(identity): Extension<AdminIdentity>) -> impl IntoResponse {
    Json(serde_json::json!({
        "admin": identity.is_admin(),
        "uid": identity.uid,
        "email": identity.email,
    }))
}

/// GET /admin/alerts
pub(crate) async fn handle_list_alerts(State(state): State<Arc<AppState>>) -> Response {
    match state.alerts.overview().await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(e) => pipeline_error(e),
    }
}

/// POST /admin/alerts/{id}/resolve
pub(crate) async fn handle_resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.alerts.resolve(&id).await {
        Ok(alert) => {
            let response = serde_json::json!({ "ok": true, "alert": alert });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => pipeline_error(e),
    }
}

/// GET /admin/admins
pub(crate) async fn handle_list_admins(State(state): State<Arc<AppState>>) -> Response {
    match state.store.list_recipients(false).await {
        Ok(admins) => {
            (StatusCode::OK, Json(serde_json::json!({ "admins": admins }))).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// POST /admin/admins/{uid}/notify
pub(crate) async fn handle_set_notify(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let notify = is_truthy(body.get("notify"));
    match state
        .store
        .set_recipient_notify(&uid, notify, OffsetDateTime::now_utc())
        .await
    {
        Ok(entry) => {
            tracing::info!(uid = %entry.id, notify, "recipient preference updated");
            (StatusCode::OK, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => storage_error(e),
    }
}

/// POST /admin/grant
///
/// Guarded by the `x-setup-secret` header instead of a bearer token. Adds
/// the user to the recipient registry with notifications on.
pub(crate) async fn handle_grant(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let presented = headers
        .get("x-setup-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let authorized = matches!(&state.setup_secret, Some(secret) if secret == presented);
    if !authorized {
        return json_error(StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let email = match non_blank(body.get("email")) {
        Some(email) => email,
        None => return json_error(StatusCode::BAD_REQUEST, "email required").into_response(),
    };
    let uid = match non_blank(body.get("uid")) {
        Some(uid) => uid,
        None => return json_error(StatusCode::BAD_REQUEST, "uid required").into_response(),
    };

    match state
        .store
        .upsert_recipient(uid, email, true, OffsetDateTime::now_utc())
        .await
    {
        Ok(entry) => {
            tracing::info!(uid = %entry.id, "recipient granted");
            let response = serde_json::json!({ "ok": true, "uid": entry.id });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => storage_error(e),
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

pub(crate) fn pipeline_error(err: PipelineError) -> Response {
    match err {
        PipelineError::AlertNotFound { .. } => {
            json_error(StatusCode::NOT_FOUND, &err.to_string()).into_response()
        }
        PipelineError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, &err.to_string()).into_response()
        }
        PipelineError::Storage(e) => storage_error(e),
    }
}

pub(crate) fn storage_error(err: StorageError) -> Response {
    let status = match err {
        StorageError::ProductNotFound { .. }
        | StorageError::AlertNotFound { .. }
        | StorageError::RecipientNotFound { .. } => StatusCode::NOT_FOUND,
        StorageError::InvalidDocument(_) => StatusCode::BAD_REQUEST,
        StorageError::Backend(_) => {
            tracing::error!(error = %err, "storage backend failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, &err.to_string()).into_response()
}

/// JavaScript-style truthiness for loosely typed flags.
pub(crate) fn is_truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn non_blank(value: Option<&serde_json::Value>) -> Option<&str> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
