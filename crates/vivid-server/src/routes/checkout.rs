//! Checkout routes.
//!
//! `GET /api/checkout-session` mints a one-time token stored in the session;
//! the checkout page and `POST /api/orders` must present it.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use vivid_core::checkout::OrderDetails;
use vivid_core::events::Event;
use vivid_core::session::generate_token;

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::state::AppState;

/// Build the checkout router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/checkout-session", get(checkout_session))
        .route("/api/orders", post(place_order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceOrder {
    #[serde(flatten)]
    details: OrderDetails,
    #[serde(default)]
    checkout_token: Option<String>,
    #[serde(default, alias = "g-recaptcha-response")]
    recaptcha_response: Option<String>,
}

/// `GET /api/checkout-session`: mint a checkout token for this session.
async fn checkout_session(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Json<serde_json::Value>, AppError> {
    viewer.require_user()?;
    let (Some(token), Some(mut session)) = (viewer.token, viewer.session) else {
        return Err(AppError::Unauthorized("Not logged in".to_owned()));
    };

    let checkout = generate_token();
    session.checkout_token = Some(checkout.clone());
    state.sessions.save(&token, &session).await?;

    Ok(Json(serde_json::json!({ "token": checkout })))
}

/// `POST /api/orders`: place a cash-on-delivery order from the cart.
async fn place_order(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Json(body): Json<PlaceOrder>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = viewer.require_user()?;

    let expected = viewer.session.as_ref().and_then(|s| s.checkout_token.as_deref());
    if expected.is_none() || expected != body.checkout_token.as_deref() {
        return Err(AppError::Forbidden(
            "Invalid or expired checkout session.".to_owned(),
        ));
    }

    let captcha_failed =
        || AppError::BadRequest("CAPTCHA verification failed. Please try again.".to_owned());
    let response = body
        .recaptcha_response
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(captcha_failed)?;
    match state.captcha.verify(response).await {
        Ok(true) => {}
        Ok(false) => return Err(captcha_failed()),
        Err(e) => {
            return Err(AppError::Internal(format!("captcha verification error: {e}")));
        }
    }

    let order = state
        .checkout
        .place_order(user, body.details, Utc::now())
        .await?;

    if let (Some(token), Some(mut session)) = (viewer.token.as_deref(), viewer.session.clone()) {
        session.checkout_token = None;
        if let Err(e) = state.sessions.save(token, &session).await {
            warn!(error = %e, "failed to clear checkout token");
        }
    }

    info!(order_id = %order.id, user_id = %user.id, total = order.total, "order placed");
    state.record(
        Event::new("ORDER", "ORDER_PLACED")
            .actor(user)
            .meta(serde_json::json!({
                "orderId": order.id,
                "total": order.total,
                "items": order.items.len(),
            })),
    );

    Ok(Json(serde_json::json!({ "success": true, "orderId": order.id })))
}
