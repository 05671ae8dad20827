//! Google OAuth 2.0 sign-in.
//!
//! Authorization Code flow: redirect to Google with a random `state` kept in
//! the session, exchange the returned code for an access token, then read
//! the profile from the userinfo endpoint.

use serde::Deserialize;
use tracing::warn;

use vivid_core::user::Identity;

use crate::config::GoogleOAuthConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Sign-in failures. All of them send the browser back to `/login`.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The request to Google failed.
    #[error("google request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Google rejected the code exchange.
    #[error("token exchange rejected with status {status}")]
    Exchange { status: u16 },

    /// The userinfo endpoint rejected the token.
    #[error("userinfo rejected with status {status}")]
    UserInfo { status: u16 },
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google OAuth client.
#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    client: reqwest::Client,
}

impl GoogleOAuth {
    #[must_use]
    pub fn new(config: GoogleOAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// URL to send the browser to, carrying `state` for CSRF protection.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{AUTHORIZE_URL}?response_type=code\
             &client_id={}\
             &redirect_uri={}\
             &scope={}\
             &state={}",
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.callback_url),
            urlencoding::encode("profile email"),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for the user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError`] if either call to Google fails.
    pub async fn exchange(&self, code: &str) -> Result<Identity, OAuthError> {
        let token_resp = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !token_resp.status().is_success() {
            let status = token_resp.status().as_u16();
            let body = token_resp.text().await.unwrap_or_default();
            warn!(status, body = %body, "google token exchange failed");
            return Err(OAuthError::Exchange { status });
        }
        let tokens: TokenResponse = token_resp.json().await?;

        let info_resp = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await?;
        if !info_resp.status().is_success() {
            return Err(OAuthError::UserInfo {
                status: info_resp.status().as_u16(),
            });
        }
        let info: UserInfo = info_resp.json().await?;

        Ok(Identity {
            google_id: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_encodes_parameters() {
        let oauth = GoogleOAuth::new(
            GoogleOAuthConfig {
                client_id: "client id".to_owned(),
                client_secret: "secret".to_owned(),
                callback_url: "https://shop.example/auth/google/callback".to_owned(),
            },
            reqwest::Client::new(),
        );
        let url = oauth.authorize_url("abc123");
        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fshop.example%2Fauth%2Fgoogle%2Fcallback"));
        assert!(url.contains("scope=profile%20email"));
        assert!(url.contains("state=abc123"));
        assert!(!url.contains("secret"));
    }
}
