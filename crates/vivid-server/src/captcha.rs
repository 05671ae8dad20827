//! reCAPTCHA verification for checkout.

use serde::Deserialize;
use tracing::warn;

const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

#[derive(Debug, Deserialize)]
struct SiteVerify {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies captcha responses against Google's `siteverify`.
///
/// Without a secret only the presence of a response is checked, which keeps
/// local development usable.
#[derive(Debug, Clone)]
pub struct Captcha {
    secret: Option<String>,
    client: reqwest::Client,
}

impl Captcha {
    #[must_use]
    pub fn new(secret: Option<String>, client: reqwest::Client) -> Self {
        Self { secret, client }
    }

    /// Whether a secret is configured.
    #[must_use]
    pub fn is_enforced(&self) -> bool {
        self.secret.is_some()
    }

    /// Check a captcha response token.
    ///
    /// # Errors
    ///
    /// Returns the transport error if Google could not be reached.
    pub async fn verify(&self, response: &str) -> Result<bool, reqwest::Error> {
        if response.trim().is_empty() {
            return Ok(false);
        }
        let Some(secret) = self.secret.as_deref() else {
            return Ok(true);
        };

        let result: SiteVerify = self
            .client
            .post(SITEVERIFY_URL)
            .form(&[("secret", secret), ("response", response)])
            .send()
            .await?
            .json()
            .await?;

        if !result.success {
            warn!(error_codes = ?result.error_codes, "recaptcha verification failed");
        }
        Ok(result.success)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_captcha_only_requires_a_response() {
        let captcha = Captcha::new(None, reqwest::Client::new());
        assert!(!captcha.is_enforced());
        assert!(captcha.verify("token").await.unwrap());
        assert!(!captcha.verify("  ").await.unwrap());
    }
}
