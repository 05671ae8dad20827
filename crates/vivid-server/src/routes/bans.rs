//! Visitor-facing ban routes: ban details, appeals, and the banned page.
//!
//! These stay reachable for banned visitors; the ban guard exempts them.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vivid_core::ban::{BanRecord, BanType};
use vivid_core::events::{Actor, Event};
use vivid_core::session::BanNotice;

use crate::error::AppError;
use crate::middleware::Viewer;
use crate::notify::appeal_message;
use crate::routes::pages::{not_found_page, serve_page};
use crate::state::AppState;

/// Build the ban router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ban-info", get(ban_info))
        .route("/api/ban-appeal", post(ban_appeal))
        .route("/banned", get(banned_page))
}

/// Body of `GET /api/ban-info`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct BanInfo {
    is_banned: bool,
    reason: Option<String>,
    banned_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    ban_type: Option<BanType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    banned_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
}

impl BanInfo {
    fn from_record(record: BanRecord, fallback_email: Option<&str>) -> Self {
        let email = Some(record.user.email)
            .filter(|e| !e.is_empty())
            .or_else(|| fallback_email.map(str::to_owned));
        Self {
            is_banned: true,
            reason: Some(record.reason),
            banned_at: Some(record.banned_at),
            expires_at: record.expires_at,
            ban_type: Some(record.ban_type),
            banned_by: Some(record.banned_by),
            email,
        }
    }

    fn from_notice(notice: &BanNotice) -> Self {
        Self {
            is_banned: true,
            reason: Some(notice.reason.clone()),
            banned_at: Some(notice.banned_at),
            expires_at: notice.expires_at,
            ban_type: Some(notice.ban_type),
            banned_by: None,
            email: Some(notice.email.clone()).filter(|e| !e.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BanInfoQuery {
    email: Option<String>,
}

/// The ban that applies to this visitor: by the queried email, else by the
/// session notice's email, else the session notice itself.
async fn lookup_ban(
    state: &AppState,
    viewer: &Viewer,
    email: Option<&str>,
) -> Result<BanInfo, AppError> {
    let now = Utc::now();
    let notice = viewer.ban_notice().filter(|n| n.is_active_at(now));
    let email = email
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .or_else(|| viewer.ban_notice().map(|n| n.email.as_str()))
        .filter(|e| !e.is_empty());

    if let Some(email) = email {
        if let Some(record) = state.bans.find_active_by_email(email, now).await? {
            return Ok(BanInfo::from_record(record, Some(email)));
        }
    }
    Ok(notice.map(BanInfo::from_notice).unwrap_or_default())
}

/// `GET /api/ban-info?email=`
async fn ban_info(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<BanInfoQuery>,
) -> Json<BanInfo> {
    match lookup_ban(&state, &viewer, query.email.as_deref()).await {
        Ok(info) => Json(info),
        Err(e) => {
            warn!(error = %e, "ban info lookup failed");
            Json(BanInfo::default())
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppealForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    message: String,
}

/// `POST /api/ban-appeal`
async fn ban_appeal(
    State(state): State<Arc<AppState>>,
    Json(form): Json<AppealForm>,
) -> Result<Json<serde_json::Value>, AppError> {
    if form.email.trim().is_empty() || form.message.trim().is_empty() {
        return Err(AppError::BadRequest("Email and message required".to_owned()));
    }

    let record = state
        .bans
        .submit_appeal(&form.email, &form.message, Utc::now())
        .await?;

    if let Some(ref notifier) = state.notifier {
        let content = appeal_message(&record.user.email, &record.reason, form.message.trim());
        if let Err(e) = notifier.send(&content).await {
            warn!(ban_id = %record.id, error = %e, "appeal notification failed");
        }
    }

    state.record(
        Event::new("BAN", "APPEAL_SUBMITTED")
            .actor(Actor {
                id: Some(record.original_user_id.clone()).filter(|id| !id.is_empty()),
                email: Some(record.user.email.clone()),
                name: Some(record.user.name.clone()).filter(|n| !n.is_empty()),
            })
            .meta(serde_json::json!({ "banId": record.id })),
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Appeal submitted successfully",
    })))
}

/// `GET /banned`: only shown to visitors who are actually banned.
async fn banned_page(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    let now = Utc::now();
    let email = viewer
        .user
        .as_ref()
        .map(|u| u.email.as_str())
        .or_else(|| viewer.ban_notice().map(|n| n.email.as_str()))
        .filter(|e| !e.is_empty());

    let mut banned = false;
    if let Some(email) = email {
        match state.bans.find_active_by_email(email, now).await {
            Ok(found) => banned = found.is_some(),
            Err(e) => warn!(error = %e, "ban check for banned page failed"),
        }
    }

    if !banned {
        if let (Some(token), Some(mut session)) = (viewer.token.as_deref(), viewer.session.clone())
        {
            match session.ban_notice.as_ref().map(|n| n.is_active_at(now)) {
                Some(true) => banned = true,
                Some(false) => {
                    // Expired notice: forget it.
                    session.ban_notice = None;
                    if let Err(e) = state.sessions.save(token, &session).await {
                        warn!(error = %e, "failed to clear expired ban notice");
                    }
                }
                None => {}
            }
        }
    }

    if banned {
        info!("banned page served");
        serve_page(&state, "banned.html").await
    } else {
        not_found_page(&state).await.into_response()
    }
}
