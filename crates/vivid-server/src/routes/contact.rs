//! Contact form relay.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::warn;

use crate::error::AppError;
use crate::notify::contact_message;
use crate::state::AppState;

/// Build the contact router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/contact", post(contact))
}

#[derive(Debug, Deserialize)]
struct ContactForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    message: String,
}

/// `POST /api/contact`: forward the message to the webhook.
async fn contact(
    State(state): State<Arc<AppState>>,
    Json(form): Json<ContactForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    let name = form.name.trim();
    let email = form.email.trim();
    let message = form.message.trim();
    if name.is_empty() || email.is_empty() || message.is_empty() {
        return Err(AppError::BadRequest("Missing required fields".to_owned()));
    }

    let notifier = state
        .notifier
        .as_ref()
        .ok_or_else(|| AppError::Internal("Webhook missing".to_owned()))?;

    let content = contact_message(
        name,
        email,
        form.phone.as_deref().map(str::trim),
        form.subject.as_deref().map(str::trim),
        message,
    );
    if let Err(e) = notifier.send(&content).await {
        warn!(error = %e, "contact webhook failed");
        return Err(AppError::Internal("Webhook failed".to_owned()));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}
