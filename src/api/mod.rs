use std::sync::Arc;

use axum::{
    extract::{RawQuery, Request},
    http::StatusCode,
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::headers;
use crate::middleware::metrics;
use crate::AppState;

pub mod handlers;

/// Build the gateway router.
///
/// User-management routes are fixed. Each configured webhook gets its own
/// route whose handler is built here, once, with its forwarder and the
/// authorizer already bound.
pub fn router(state: Arc<AppState>) -> Router {
    let native = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/newToken", any(handlers::new_token))
        .route("/deleteUser", any(handlers::delete_user))
        .route("/promoteUser", any(handlers::promote_user))
        .layer(middleware::from_fn(headers::security_headers));

    let mut forwarding = Router::new();
    for (name, forwarder) in state.routes.iter() {
        tracing::debug!(
            route = name,
            target_host = ?forwarder.target().host_str(),
            "registered forwarding route"
        );
        let authorizer = state.authorizer.clone();
        let forwarder = forwarder.clone();
        forwarding = forwarding.route(
            &format!("/{}", name),
            any(
                move |RawQuery(query): RawQuery, req: Request| async move {
                    let params = handlers::ForwardParams::from_query(query.as_deref());
                    handlers::forward(&authorizer, &forwarder, params, req).await
                },
            ),
        );
    }

    native
        .merge(forwarding)
        .route_layer(middleware::from_fn(metrics::track))
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(headers::request_id))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
