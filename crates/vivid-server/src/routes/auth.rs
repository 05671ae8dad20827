//! Sign-in routes: `/auth/*` and `/api/auth/logout`.
//!
//! The Google callback is where banned accounts are caught at the door: an
//! active ban deletes the freshly upserted account and sends the browser to
//! `/banned` with the ban details in a new anonymous session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Query, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use vivid_core::events::Event;
use vivid_core::session::{BanNotice, generate_token};

use crate::error::AppError;
use crate::middleware::{Viewer, clear_session_cookie, found, session_cookie};
use crate::state::AppState;

/// Build the sign-in router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/logout", get(logout_redirect))
        .route("/api/auth/logout", post(logout_json))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn with_cookie(mut response: Response, cookie: axum::http::HeaderValue) -> Response {
    response.headers_mut().append(header::SET_COOKIE, cookie);
    response
}

/// `GET /auth/google`: redirect to Google.
async fn google_login(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, AppError> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_owned()))?;

    let csrf = generate_token();
    let (token, mut session) = match (viewer.token, viewer.session) {
        (Some(token), Some(session)) => (token, session),
        _ => state.sessions.create(None, Utc::now()).await?,
    };
    session.oauth_state = Some(csrf.clone());
    state.sessions.save(&token, &session).await?;

    Ok(with_cookie(
        found(&oauth.authorize_url(&csrf)),
        session_cookie(&token, state.session_ttl_secs, state.secure_cookies),
    ))
}

/// `GET /auth/google/callback`: finish sign-in.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
    req: Request,
) -> Response {
    let (parts, _body) = req.into_parts();
    match finish_login(&state, viewer, &parts).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "google sign-in failed");
            found("/login")
        }
    }
}

async fn finish_login(
    state: &AppState,
    viewer: Viewer,
    req: &Parts,
) -> Result<Response, AppError> {
    let Query(query) = Query::<CallbackQuery>::try_from_uri(&req.uri)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    if let Some(err) = query.error {
        return Err(AppError::BadRequest(format!("provider error: {err}")));
    }
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_owned()))?;

    let expected = viewer.session.as_ref().and_then(|s| s.oauth_state.as_deref());
    if expected.is_none() || expected != query.state.as_deref() {
        return Err(AppError::BadRequest("oauth state mismatch".to_owned()));
    }
    let oauth = state
        .oauth
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Google sign-in is not configured".to_owned()))?;

    let identity = oauth
        .exchange(&code)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let now = Utc::now();
    let env_admin = identity
        .email
        .as_deref()
        .is_some_and(|e| state.access.is_super_admin(e));
    let user = state
        .users
        .upsert_from_identity(&identity, env_admin, now)
        .await?;

    let peer = req
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    if let Err(e) = state
        .users
        .record_login(&user.id, client_ip(&req.headers, peer).as_deref(), now)
        .await
    {
        warn!(user_id = %user.id, error = %e, "failed to record login");
    }

    // The pre-login session is replaced either way.
    if let Some(ref old) = viewer.token {
        state.sessions.destroy(old).await?;
    }

    let ban = match state
        .bans
        .find_active(Some(&user.email), Some(&user.google_id), now)
        .await
    {
        Ok(ban) => ban,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "ban check at sign-in failed");
            None
        }
    };

    if let Some(record) = ban {
        state.users.delete(&user.id).await?;
        let (token, mut session) = state.sessions.create(None, now).await?;
        session.ban_notice = Some(BanNotice::from_record(&record, &user.email));
        state.sessions.save(&token, &session).await?;

        info!(ban_id = %record.id, "banned account refused at sign-in");
        state.record(
            Event::new("AUTH", "LOGIN_BLOCKED")
                .actor(&user)
                .meta(serde_json::json!({ "banId": record.id })),
        );
        return Ok(with_cookie(
            found("/banned"),
            session_cookie(&token, state.session_ttl_secs, state.secure_cookies),
        ));
    }

    let (token, _) = state.sessions.create(Some(user.id.clone()), now).await?;
    info!(user_id = %user.id, "user signed in");
    state.record(Event::new("AUTH", "LOGIN").actor(&user));

    let target = if state.access.is_admin(&user) { "/admin" } else { "/" };
    Ok(with_cookie(
        found(target),
        session_cookie(&token, state.session_ttl_secs, state.secure_cookies),
    ))
}

async fn end_session(state: &AppState, viewer: &Viewer) {
    if let Some(ref token) = viewer.token {
        if let Err(e) = state.sessions.destroy(token).await {
            warn!(error = %e, "failed to destroy session");
        }
    }
    if let Some(ref user) = viewer.user {
        state.record(Event::new("AUTH", "LOGOUT").actor(user));
    }
}

/// `GET /auth/logout`: end the session and go home.
async fn logout_redirect(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    end_session(&state, &viewer).await;
    with_cookie(found("/"), clear_session_cookie())
}

/// `POST /api/auth/logout`: end the session.
async fn logout_json(
    State(state): State<Arc<AppState>>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    end_session(&state, &viewer).await;
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer = Some(SocketAddr::from(([127, 0, 0, 1], 9000)));
        assert_eq!(client_ip(&headers, peer).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), peer).as_deref(), Some("127.0.0.1"));
        assert!(client_ip(&HeaderMap::new(), None).is_none());
    }
}
