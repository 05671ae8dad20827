//! Current-user routes: `/api/me` and the avatar proxies.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use tracing::debug;

use crate::middleware::Viewer;
use crate::state::AppState;

/// Fallback image for missing or unreachable profile pictures.
const DEFAULT_AVATAR: &str = "default-user.jpeg";

/// Build the account router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route("/avatar", get(own_avatar))
        .route("/avatar/user/{id}", get(user_avatar))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeUser {
    name: String,
    email: String,
    is_admin: bool,
    picture: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<MeUser>,
}

/// `GET /api/me`
async fn me(Extension(viewer): Extension<Viewer>) -> Json<MeResponse> {
    let user = viewer.user.as_ref().map(|u| MeUser {
        name: u.name.clone(),
        email: u.email.clone(),
        is_admin: viewer.is_admin,
        picture: u.picture.clone(),
    });
    Json(MeResponse {
        logged_in: user.is_some(),
        user,
    })
}

async fn default_avatar(state: &AppState) -> Response {
    match tokio::fs::read(state.public_dir.join(DEFAULT_AVATAR)).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Fetch a remote picture, falling back to the default image on any failure.
async fn proxy_picture(state: &AppState, picture: Option<&str>) -> Response {
    let Some(url) = picture.filter(|p| !p.is_empty()) else {
        return default_avatar(state).await;
    };

    let fetched = match state.http.get(url).send().await {
        Ok(resp) if resp.status().is_success() => resp.bytes().await.ok(),
        Ok(resp) => {
            debug!(status = resp.status().as_u16(), "avatar fetch rejected");
            None
        }
        Err(e) => {
            debug!(error = %e, "avatar fetch failed");
            None
        }
    };

    match fetched {
        Some(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        None => default_avatar(state).await,
    }
}

/// `GET /avatar`: the signed-in user's picture.
async fn own_avatar(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    let picture = viewer.user.as_ref().and_then(|u| u.picture.as_deref());
    proxy_picture(&state, picture).await
}

/// `GET /avatar/user/{id}`: any user's picture, used by comment threads.
async fn user_avatar(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let user = state.users.find(&id).await.ok().flatten();
    proxy_picture(&state, user.as_ref().and_then(|u| u.picture.as_deref())).await
}
