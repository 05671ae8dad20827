//! HTML pages, static assets, and the not-found fallback.
//!
//! Pages are only reachable through their clean routes; a direct request for
//! any `*.html` file gets the 404 page.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::state::AppState;

const NOT_FOUND_HTML: &str =
    "<!doctype html><html><head><title>Not found</title></head><body><h1>404</h1><p>Page not found.</p></body></html>";

/// Build the page router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/home", get(index))
        .route("/login", get(login))
        .route("/contact", get(contact))
        .route("/product", get(product))
        .route("/products", get(products))
        .route("/checkout", get(checkout))
        .route("/admin", get(admin))
        .route("/admin.html", get(admin))
        .route("/admin/product-editor", get(product_editor))
}

/// Serve `name` from the public directory.
///
/// A missing file gets a minimal inline page so a bare deployment still
/// answers.
pub(crate) async fn serve_page(state: &AppState, name: &str) -> Response {
    match tokio::fs::read_to_string(state.public_dir.join(name)).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            debug!(page = name, error = %e, "page file unavailable");
            let title = name.trim_end_matches(".html");
            Html(format!(
                "<!doctype html><html><head><title>{title}</title></head><body><h1>{title}</h1></body></html>"
            ))
            .into_response()
        }
    }
}

/// The 404 page with a 404 status.
pub(crate) async fn not_found_page(state: &AppState) -> Response {
    let html = match tokio::fs::read_to_string(state.public_dir.join("404.html")).await {
        Ok(html) => html,
        Err(_) => NOT_FOUND_HTML.to_owned(),
    };
    (StatusCode::NOT_FOUND, Html(html)).into_response()
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "index.html").await
}

async fn login(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "login.html").await
}

async fn contact(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "contact.html").await
}

async fn product(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "product.html").await
}

async fn products(State(state): State<Arc<AppState>>) -> Response {
    serve_page(&state, "products.html").await
}

#[derive(Debug, Deserialize)]
struct CheckoutQuery {
    q: Option<String>,
}

/// `GET /checkout?q=<token>`: only with the token minted for this session.
async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<CheckoutQuery>,
) -> Response {
    let expected = viewer.session.as_ref().and_then(|s| s.checkout_token.as_deref());
    match (expected, query.q.as_deref()) {
        (Some(expected), Some(given)) if expected == given => {
            serve_page(&state, "checkout.html").await
        }
        _ => not_found_page(&state).await,
    }
}

async fn admin(State(state): State<Arc<AppState>>, Extension(viewer): Extension<Viewer>) -> Response {
    if viewer.require_admin().is_err() {
        return not_found_page(&state).await;
    }
    serve_page(&state, "admin.html").await
}

async fn product_editor(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    if viewer.require_admin().is_err() {
        return not_found_page(&state).await;
    }
    serve_page(&state, "admin-product-editor.html").await
}

/// Everything without a route: API misses get JSON, `*.html` gets the 404
/// page, and the rest is looked up in the public directory.
pub async fn fallback(State(state): State<Arc<AppState>>, req: Request) -> Response {
    let path = req.uri().path().to_owned();
    if path == "/api" || path.starts_with("/api/") {
        return AppError::NotFound("Not found".to_owned()).into_response();
    }
    if path.to_ascii_lowercase().ends_with(".html") {
        return not_found_page(&state).await;
    }

    let served = match ServeDir::new(&state.public_dir).oneshot(req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!(path = %path, error = %e, "static file service failed");
            return not_found_page(&state).await;
        }
    };
    if served.status() == StatusCode::NOT_FOUND {
        return not_found_page(&state).await;
    }
    served.map(axum::body::Body::new).into_response()
}
