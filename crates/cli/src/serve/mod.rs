//! `stockwatch serve` -- admin HTTP API plus the running alert pipeline.
//!
//! Starts an in-memory store whose change feed is consumed by the
//! dispatcher, and exposes the catalog and alert administration over
//! `axum` + `tokio`.
//!
//! Endpoints:
//! - GET    /health                        - Server status (no auth)
//! - POST   /admin/grant                   - Register a recipient (setup secret)
//! - GET    /admin/me                      - Identity behind the bearer token
//! - GET    /admin/alerts                  - Unresolved + recently resolved alerts
//! - POST   /admin/alerts/{id}/resolve     - Resolve an alert
//! - GET    /admin/admins                  - Recipient registry
//! - POST   /admin/admins/{uid}/notify     - Toggle a recipient's notify flag
//! - POST   /admin/products                - Create a product
//! - PUT    /admin/products/{id}           - Merge-update a product
//! - DELETE /admin/products/{id}           - Delete a product
//! - POST   /admin/seed                    - Batch-create products
//!
//! All responses use Content-Type: application/json.

mod auth;
mod handlers;
mod middleware;
mod products;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{middleware as axum_middleware, Json, Router};
use stockwatch_pipeline::{change_feed, spawn_dispatcher, AlertBook, Orchestrator};
use stockwatch_storage::MemoryStore;
use tower_http::cors::{Any, CorsLayer};

use self::auth::StaticTokenGate;
use self::handlers::{
    handle_grant, handle_health, handle_list_admins, handle_list_alerts, handle_me,
    handle_not_found, handle_resolve_alert, handle_set_notify,
};
use self::middleware::require_admin;
use self::products::{
    handle_create_product, handle_delete_product, handle_seed, handle_update_product,
    seed_products,
};
use self::state::AppState;
use crate::config::StockwatchConfig;

/// Maximum request body size: 2 MB.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the router over `state`.
fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let admin = Router::new()
        .route("/admin/me", get(handle_me))
        .route("/admin/alerts", get(handle_list_alerts))
        .route("/admin/alerts/{id}/resolve", post(handle_resolve_alert))
        .route("/admin/admins", get(handle_list_admins))
        .route("/admin/admins/{uid}/notify", post(handle_set_notify))
        .route("/admin/products", post(handle_create_product))
        .route(
            "/admin/products/{id}",
            put(handle_update_product).delete(handle_delete_product),
        )
        .route("/admin/seed", post(handle_seed))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    Router::new()
        .route("/health", get(handle_health))
        .route("/admin/grant", post(handle_grant))
        .merge(admin)
        .fallback(handle_not_found)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Start the pipeline and the HTTP server on the given port.
///
/// When TLS cert/key paths are provided, the server listens over HTTPS
/// using `axum-server` with rustls. Otherwise it uses plain HTTP.
pub(crate) async fn start_server(
    port: u16,
    config: StockwatchConfig,
    seed: Option<PathBuf>,
    _tls_cert: Option<PathBuf>,
    _tls_key: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dispatch = config.dispatch_config();
    let (feed, events) = change_feed();
    let store = Arc::new(MemoryStore::with_change_feed(feed));

    let transport = config.transport();
    if transport.is_none() {
        tracing::warn!("no mail relay configured; notifications will be skipped");
    }
    let orchestrator = Arc::new(Orchestrator::with_registry(
        store.clone(),
        transport,
        config.pipeline_config(),
    ));
    let dispatcher = spawn_dispatcher(orchestrator, events, dispatch);

    let gate = StaticTokenGate::from_entries(&config.admins);
    if gate.is_empty() {
        tracing::warn!("no [[admins]] configured; every /admin route will be refused");
    }
    if config.server.setup_secret.is_none() {
        tracing::info!("no setup secret configured; /admin/grant is disabled");
    }

    let state = Arc::new(AppState {
        alerts: AlertBook::new(store.clone()),
        store,
        gate: Arc::new(gate),
        setup_secret: config.server.setup_secret.clone(),
    });

    if let Some(path) = seed {
        let products = read_seed_file(&path)?;
        seed_products(&state, &products).await?;
    }

    let app = router(state);
    let addr = format!("0.0.0.0:{}", port);

    // TLS support via axum-server + rustls (requires `tls` feature)
    #[cfg(feature = "tls")]
    if let (Some(cert_path), Some(key_path)) = (&_tls_cert, &_tls_key) {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert_path, key_path).await?;
        let socket_addr: SocketAddr = addr.parse()?;
        tracing::info!(port, "stockwatch listening on https");
        axum_server::bind_rustls(socket_addr, tls)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await?;
        dispatcher.abort();
        return Ok(());
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(port, "stockwatch listening on http");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The store keeps the feed open, so the dispatcher never drains on its own.
    dispatcher.abort();
    tracing::info!("server shut down");
    Ok(())
}

/// Read a seed file: either a JSON array of products or `{ "products": [...] }`.
fn read_seed_file(path: &Path) -> Result<Vec<serde_json::Value>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read seed file '{}': {}", path.display(), e))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("failed to parse seed file '{}': {}", path.display(), e))?;
    match value {
        serde_json::Value::Array(items) => Ok(items),
        serde_json::Value::Object(mut obj) => match obj.remove("products") {
            Some(serde_json::Value::Array(items)) => Ok(items),
            _ => Err(format!("seed file '{}' has no products array", path.display()).into()),
        },
        _ => Err(format!("seed file '{}' has no products array", path.display()).into()),
    }
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
