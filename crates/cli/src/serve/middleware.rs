//! HTTP middleware: admin authorization.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::auth::authorize;
use super::state::AppState;

/// Reject the request unless it carries an admin bearer token.
///
/// On success the verified [`AdminIdentity`](super::auth::AdminIdentity)
/// is stored in the request extensions.
pub(crate) async fn require_admin(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match authorize(state.gate.as_ref(), header.as_deref()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(
                peer = %addr,
                path = request.uri().path(),
                reason = %err,
                "admin request denied"
            );
            super::json_error(err.status(), &err.to_string()).into_response()
        }
    }
}
