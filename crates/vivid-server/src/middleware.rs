//! Session and ban middleware.
//!
//! [`session_layer`] reads the `vivid.sid` cookie, loads the session and the
//! signed-in user, and injects a [`Viewer`] into the request extensions for
//! every handler. [`ban_guard`] then keeps banned accounts out of the API and
//! the admin pages.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{info, warn};

use vivid_core::session::{BanNotice, Session};
use vivid_core::user::User;

use crate::error::AppError;
use crate::state::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "vivid.sid";

/// Who is making the request.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    /// Raw session token from the cookie, when the session is live.
    pub token: Option<String>,
    pub session: Option<Session>,
    pub user: Option<User>,
    /// Stored flag or `ADMIN_EMAILS` membership.
    pub is_admin: bool,
}

impl Viewer {
    /// The signed-in user, or 401.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] for anonymous requests.
    pub fn require_user(&self) -> Result<&User, AppError> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Not logged in".to_owned()))
    }

    /// The signed-in admin. Anonymous requests get 401; non-admins get 404
    /// so admin routes look absent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] or [`AppError::NotFound`].
    pub fn require_admin(&self) -> Result<&User, AppError> {
        let user = self
            .user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Not authenticated".to_owned()))?;
        if self.is_admin {
            Ok(user)
        } else {
            Err(AppError::NotFound("Not found".to_owned()))
        }
    }

    /// Ban notice stored in the session, if any.
    #[must_use]
    pub fn ban_notice(&self) -> Option<&BanNotice> {
        self.session.as_ref().and_then(|s| s.ban_notice.as_ref())
    }
}

/// Extract the session token from the `Cookie` header.
#[must_use]
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value that stores `token`.
#[must_use]
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> HeaderValue {
    let secure = if secure { "; Secure" } else { "" };
    let value = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}{secure}"
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| clear_session_cookie())
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("vivid.sid=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// `302 Found` redirect.
#[must_use]
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Load the session and user for every request.
pub async fn session_layer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = match session_token(req.headers()) {
        Some(token) => load_viewer(&state, token).await,
        None => Viewer::default(),
    };
    req.extensions_mut().insert(viewer);
    next.run(req).await
}

async fn load_viewer(state: &AppState, token: String) -> Viewer {
    let now = Utc::now();
    let session = match state.sessions.lookup(&token, now).await {
        Ok(Some(session)) => session,
        Ok(None) => return Viewer::default(),
        Err(e) => {
            warn!(error = %e, "session lookup failed");
            return Viewer::default();
        }
    };

    let user = match session.user_id.as_deref() {
        Some(id) => match state.users.find(id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "session user lookup failed");
                None
            }
        },
        None => None,
    };
    let is_admin = user.as_ref().is_some_and(|u| state.access.is_admin(u));

    Viewer {
        token: Some(token),
        session: Some(session),
        user,
        is_admin,
    }
}

fn ban_guard_applies(path: &str) -> bool {
    let guarded = path.starts_with("/api/") || path == "/api" || path.starts_with("/admin");
    let exempt = path == "/banned"
        || path == "/api/ban-info"
        || path.starts_with("/auth/")
        || path.starts_with("/api/auth/");
    guarded && !exempt
}

/// Redirect signed-in users with an active ban to `/banned`.
///
/// The ban details are written into the session so the banned page can show
/// them. Lookup failures let the request through.
pub async fn ban_guard(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if !ban_guard_applies(req.uri().path()) {
        return next.run(req).await;
    }
    let Some(viewer) = req.extensions().get::<Viewer>().cloned() else {
        return next.run(req).await;
    };
    let Some(user) = viewer.user.as_ref() else {
        return next.run(req).await;
    };

    let now = Utc::now();
    let record = match state
        .bans
        .find_active(Some(&user.email), Some(&user.google_id), now)
        .await
    {
        Ok(Some(record)) => record,
        Ok(None) => return next.run(req).await,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "ban check failed, allowing request");
            return next.run(req).await;
        }
    };

    if let (Some(token), Some(mut session)) = (viewer.token, viewer.session) {
        session.ban_notice = Some(BanNotice::from_record(&record, &user.email));
        if let Err(e) = state.sessions.save(&token, &session).await {
            warn!(error = %e, "failed to store ban notice in session");
        }
    }
    info!(user_id = %user.id, ban_id = %record.id, "banned user redirected");
    found("/banned")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; vivid.sid=abc123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn empty_cookie_is_no_session() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("vivid.sid="));
        assert!(session_token(&headers).is_none());
        assert!(session_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn guard_covers_api_and_admin_with_exemptions() {
        assert!(ban_guard_applies("/api/cart"));
        assert!(ban_guard_applies("/admin"));
        assert!(ban_guard_applies("/admin/product-editor"));
        assert!(!ban_guard_applies("/api/ban-info"));
        assert!(!ban_guard_applies("/api/auth/logout"));
        assert!(!ban_guard_applies("/banned"));
        assert!(!ban_guard_applies("/products"));
    }

    #[test]
    fn cookie_flags() {
        let cookie = session_cookie("tok", 60, true);
        let text = cookie.to_str().unwrap_or_default();
        assert!(text.starts_with("vivid.sid=tok; Path=/; HttpOnly"));
        assert!(text.ends_with("Max-Age=60; Secure"));
    }
}
