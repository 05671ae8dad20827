//! Product comment routes.
//!
//! Posting is where auto-moderation happens: a comment with a link or
//! profanity bans its author on the spot, ends their session, and answers
//! 403 with the ban's expiry.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, warn};

use vivid_core::ban::BanType;
use vivid_core::comment::{CommentView, CommentViewer};
use vivid_core::error::CommentError;
use vivid_core::events::Event;

use crate::error::AppError;
use crate::middleware::{Viewer, clear_session_cookie};
use crate::state::AppState;

/// Build the comments router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/products/{id}/comments",
            get(list_comments).post(post_comment),
        )
        .route(
            "/api/products/{id}/comments/{comment_id}",
            delete(delete_comment),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewComment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    parent_comment_id: Option<String>,
}

/// `GET /api/products/{id}/comments`
async fn list_comments(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<CommentView>>, AppError> {
    let as_viewer = CommentViewer {
        user_id: viewer.user.as_ref().map(|u| u.id.as_str()),
        is_admin: viewer.is_admin,
    };
    Ok(Json(state.comments.thread(&product_id, as_viewer).await?))
}

/// `POST /api/products/{id}/comments`
async fn post_comment(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path(product_id): Path<String>,
    Json(body): Json<NewComment>,
) -> Result<Response, AppError> {
    let user = viewer.require_user()?;
    let now = Utc::now();

    let result = state
        .comments
        .post(
            &product_id,
            user,
            viewer.is_admin,
            &body.text,
            body.parent_comment_id.as_deref().filter(|p| !p.is_empty()),
            now,
        )
        .await;

    let comment = match result {
        Ok(comment) => comment,
        Err(CommentError::Violation { violation }) => {
            let record = match state.moderator.enforce(&user.id, violation, now).await {
                Ok(record) => record,
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "auto-moderation failed");
                    return Err(AppError::Forbidden("Comment blocked by moderation.".to_owned()));
                }
            };
            if let Some(ref token) = viewer.token {
                if let Err(e) = state.sessions.destroy(token).await {
                    warn!(error = %e, "failed to end banned user's session");
                }
            }
            state.record(
                Event::new("MODERATION", "AUTO_BAN")
                    .actor(user)
                    .meta(serde_json::json!({
                        "productId": product_id,
                        "violation": violation,
                        "banId": record.id,
                    })),
            );

            let err = AppError::Forbidden(
                "Your account has been temporarily banned for violating community rules."
                    .to_owned(),
            )
            .with_fields(serde_json::json!({
                "banType": BanType::Temporary,
                "expiresAt": record.expires_at,
            }));
            return Ok((
                [(header::SET_COOKIE, clear_session_cookie())],
                err.into_response(),
            )
                .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    state.record(
        Event::new("COMMENT", "COMMENT_CREATE")
            .actor(user)
            .meta(serde_json::json!({
                "productId": product_id,
                "text": comment.text,
                "isAdmin": viewer.is_admin,
                "parentCommentId": comment.parent_id,
            })),
    );

    let view = CommentView {
        avatar_url: format!("/avatar/user/{}", comment.user_id),
        can_delete: true,
        can_reply: viewer.is_admin,
        comment,
    };
    Ok(Json(view).into_response())
}

/// `DELETE /api/products/{id}/comments/{comment_id}`
async fn delete_comment(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    Path((product_id, comment_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = viewer.require_user()?;
    let removed = state
        .comments
        .delete(&product_id, &comment_id, &user.id, viewer.is_admin)
        .await?;

    state.record(
        Event::new("COMMENT", "COMMENT_DELETE")
            .actor(user)
            .meta(serde_json::json!({
                "productId": product_id,
                "commentId": comment_id,
                "isAdmin": viewer.is_admin,
                "removed": removed,
            })),
    );

    Ok(Json(serde_json::json!({ "ok": true })))
}
