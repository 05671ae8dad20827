//! Router assembly.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::middleware as axum_mw;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{ban_guard, session_layer};
use crate::routes;
use crate::state::AppState;

/// Concurrent sign-in requests allowed; each one calls out to Google.
const AUTH_CONCURRENCY: usize = 10;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Sign-in is concurrency-limited to bound outbound calls.
    let auth_routes = routes::auth::router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(AUTH_CONCURRENCY));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(auth_routes)
        .merge(routes::account::router())
        .merge(routes::catalog::router())
        .merge(routes::comments::router())
        .merge(routes::cart::router())
        .merge(routes::checkout::router())
        .merge(routes::contact::router())
        .merge(routes::bans::router())
        .nest("/api/admin", routes::admin::router())
        .merge(routes::pages::router())
        .fallback(routes::pages::fallback)
        // Layers run bottom-up: the session is loaded before the ban guard.
        .layer(axum_mw::from_fn_with_state(Arc::clone(&state), ban_guard))
        .layer(axum_mw::from_fn_with_state(Arc::clone(&state), session_layer))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .with_state(state)
}
