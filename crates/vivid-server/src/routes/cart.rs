//! Cart routes. The cart lives on the user document.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Deserialize;

use vivid_core::cart::{CartInput, CartSummary};
use vivid_core::events::Event;
use vivid_core::user::CartLine;

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::state::AppState;

/// Build the cart router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cart", get(get_cart).post(save_cart).delete(clear_cart))
        .route("/api/checkout/summary", get(summary))
}

#[derive(Debug, Deserialize)]
struct SaveCart {
    #[serde(default)]
    items: Vec<CartInput>,
}

/// `GET /api/cart`
async fn get_cart(Extension(viewer): Extension<Viewer>) -> Result<Json<Vec<CartLine>>, AppError> {
    let user = viewer.require_user()?;
    Ok(Json(user.cart.clone()))
}

/// `POST /api/cart`: replace the stored cart.
async fn save_cart(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(body): Json<SaveCart>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = viewer.require_user()?;
    let kept = state.cart.save(&user.id, body.items).await?;
    state.record(
        Event::new("CART", "CART_SAVE")
            .actor(user)
            .meta(serde_json::json!({ "lines": kept })),
    );
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `DELETE /api/cart`
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = viewer.require_user()?;
    state.cart.clear(&user.id).await?;
    state.record(Event::new("CART", "CART_CLEAR").actor(user));
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/checkout/summary`: the cart priced against the catalog.
async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<CartSummary>, AppError> {
    let user = viewer.require_user()?;
    Ok(Json(state.cart.summary(user).await?))
}
