//! Server-side sessions.
//!
//! The browser holds an opaque token; the store holds only its SHA-256 hash
//! at `sessions/<hash>`, so a leaked store dump cannot be replayed as a
//! cookie. Besides the logged-in user, a session carries short-lived state:
//! the checkout token, the OAuth `state` value, and the notice shown to a
//! banned visitor after their account is removed.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ban::{BanRecord, BanType};
use crate::error::SessionError;
use crate::store::DocumentStore;

/// Storage prefix for sessions.
pub const SESSION_PREFIX: &str = "sessions/";

/// Ban details remembered in the session of a banned visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanNotice {
    pub reason: String,
    pub banned_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub ban_type: BanType,
    pub email: String,
}

impl BanNotice {
    /// Notice for `email` describing `record`.
    #[must_use]
    pub fn from_record(record: &BanRecord, email: &str) -> Self {
        Self {
            reason: record.reason.clone(),
            banned_at: record.banned_at,
            expires_at: record.expires_at,
            ban_type: record.ban_type,
            email: email.to_owned(),
        }
    }

    /// Whether the notice still describes an active ban.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// A stored session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Option<String>,
    pub ban_notice: Option<BanNotice>,
    pub checkout_token: Option<String>,
    pub oauth_state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has outlived its TTL.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// SHA-256 hex digest of a session token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a fresh session token: 32 bytes from the OS CSPRNG as 64 hex chars.
#[must_use]
pub fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn session_key(token: &str) -> String {
    format!("{SESSION_PREFIX}{}", hash_token(token))
}

/// Session persistence.
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: DocumentStore,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(store: DocumentStore, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Start a new session. Returns the token for the cookie and the
    /// session itself.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage fails.
    pub async fn create(
        &self,
        user_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(String, Session), SessionError> {
        let token = generate_token();
        let session = Session {
            user_id,
            ban_notice: None,
            checkout_token: None,
            oauth_state: None,
            created_at: now,
            expires_at: now + self.ttl,
        };
        self.store.put(&session_key(&token), &session).await?;

        debug!(has_user = session.user_id.is_some(), "session created");

        Ok((token, session))
    }

    /// Load a session by token. Expired sessions are deleted and treated as
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage fails.
    pub async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, SessionError> {
        let key = session_key(token);
        let Some(session) = self.store.get::<Session>(&key).await? else {
            return Ok(None);
        };
        if session.is_expired_at(now) {
            self.store.delete(&key).await?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    /// Write back a modified session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage fails.
    pub async fn save(&self, token: &str, session: &Session) -> Result<(), SessionError> {
        self.store.put(&session_key(token), session).await?;
        Ok(())
    }

    /// End a session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if storage fails.
    pub async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        self.store.delete(&session_key(token)).await?;
        Ok(())
    }

    /// Delete every expired session. Returns how many were removed.
    ///
    /// Unreadable session documents are removed too.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if listing fails.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut removed: usize = 0;
        for key in self.store.keys(SESSION_PREFIX).await? {
            let expired = match self.store.get::<Session>(&key).await {
                Ok(Some(session)) => session.is_expired_at(now),
                Ok(None) => false,
                Err(e) => {
                    warn!(key = %key, error = %e, "dropping unreadable session");
                    true
                }
            };
            if expired {
                match self.store.delete(&key).await {
                    Ok(()) => removed = removed.saturating_add(1),
                    Err(e) => warn!(key = %key, error = %e, "failed to delete expired session"),
                }
            }
        }
        Ok(removed)
    }
}
