//! Shopper and admin accounts.
//!
//! Accounts are created on first Google sign-in and refreshed on every later
//! one. Users are stored at `users/<id>`; the cart lives on the user
//! document (see [`crate::cart`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::UserError;
use crate::store::DocumentStore;

/// Storage prefix for user documents.
pub const USER_PREFIX: &str = "users/";

/// A single cart line stored on the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub google_id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub last_ip: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cart: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile returned by the identity provider after sign-in.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    pub google_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// One page of a user listing.
#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub total: usize,
    pub items: Vec<User>,
}

fn user_key(id: &str) -> String {
    format!("{USER_PREFIX}{id}")
}

/// Account persistence.
#[derive(Debug, Clone)]
pub struct UserStore {
    store: DocumentStore,
}

impl UserStore {
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Create or refresh the account behind a Google identity.
    ///
    /// A new account takes its admin flag from `env_admin`. An existing
    /// account gets name, email, and picture refreshed when the provider
    /// sent them, and is promoted when `env_admin` is set. A manually
    /// granted admin flag is never cleared here.
    ///
    /// # Errors
    ///
    /// - [`UserError::MissingEmail`] when creating an account without an email.
    /// - [`UserError::Store`] if storage fails.
    pub async fn upsert_from_identity(
        &self,
        identity: &Identity,
        env_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<User, UserError> {
        if let Some(mut user) = self.find_by_google_id(&identity.google_id).await? {
            if let Some(name) = identity.name.as_ref().filter(|n| !n.is_empty()) {
                user.name.clone_from(name);
            }
            if let Some(email) = identity.email.as_ref().filter(|e| !e.is_empty()) {
                user.email.clone_from(email);
            }
            if let Some(picture) = identity.picture.as_ref().filter(|p| !p.is_empty()) {
                user.picture = Some(picture.clone());
            }
            if env_admin {
                user.is_admin = true;
            }
            user.updated_at = now;
            self.store.put(&user_key(&user.id), &user).await?;
            return Ok(user);
        }

        let email = identity
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| UserError::MissingEmail {
                google_id: identity.google_id.clone(),
            })?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            google_id: identity.google_id.clone(),
            email,
            name: identity.name.clone().unwrap_or_default(),
            picture: identity.picture.clone(),
            is_admin: env_admin,
            last_ip: None,
            last_login_at: None,
            cart: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.store.put(&user_key(&user.id), &user).await?;

        info!(user_id = %user.id, is_admin = user.is_admin, "user account created");

        Ok(user)
    }

    /// Fetch a user by ID.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if no such user.
    /// - [`UserError::Store`] if storage fails.
    pub async fn get(&self, id: &str) -> Result<User, UserError> {
        self.find(id).await?.ok_or_else(|| UserError::NotFound {
            user_id: id.to_owned(),
        })
    }

    /// Fetch a user by ID, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn find(&self, id: &str) -> Result<Option<User>, UserError> {
        Ok(self.store.get(&user_key(id)).await?)
    }

    /// Persist a modified user.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn save(&self, user: &User) -> Result<(), UserError> {
        self.store.put(&user_key(&user.id), user).await?;
        Ok(())
    }

    /// Delete a user document. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn delete(&self, id: &str) -> Result<(), UserError> {
        self.store.delete(&user_key(id)).await?;
        info!(user_id = %id, "user account deleted");
        Ok(())
    }

    /// Find a user by email, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let users: Vec<User> = self.store.scan(USER_PREFIX).await?;
        Ok(users
            .into_iter()
            .find(|u| u.email.eq_ignore_ascii_case(email)))
    }

    /// Find a user by Google account ID.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, UserError> {
        let users: Vec<User> = self.store.scan(USER_PREFIX).await?;
        Ok(users.into_iter().find(|u| u.google_id == google_id))
    }

    /// Stamp the client IP and login time on an account.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if no such user.
    /// - [`UserError::Store`] if storage fails.
    pub async fn record_login(
        &self,
        id: &str,
        ip: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<User, UserError> {
        let mut user = self.get(id).await?;
        if let Some(ip) = ip {
            user.last_ip = Some(ip.to_owned());
        }
        user.last_login_at = Some(at);
        user.updated_at = at;
        self.save(&user).await?;
        Ok(user)
    }

    /// Grant or revoke the stored admin flag.
    ///
    /// # Errors
    ///
    /// - [`UserError::NotFound`] if no such user.
    /// - [`UserError::Store`] if storage fails.
    pub async fn set_admin(&self, id: &str, is_admin: bool) -> Result<User, UserError> {
        let mut user = self.get(id).await?;
        user.is_admin = is_admin;
        user.updated_at = chrono::Utc::now();
        self.save(&user).await?;

        info!(user_id = %id, is_admin, "admin flag changed");

        Ok(user)
    }

    /// List users newest first, optionally filtered by a case-insensitive
    /// substring of name or email.
    ///
    /// `page` and `limit` are clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: usize,
        limit: usize,
    ) -> Result<UserPage, UserError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut users: Vec<User> = self.store.scan(USER_PREFIX).await?;
        if let Some(needle) = &needle {
            users.retain(|u| {
                u.name.to_lowercase().contains(needle.as_str())
                    || u.email.to_lowercase().contains(needle.as_str())
            });
        }
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = users.len();
        let skip = (page - 1).saturating_mul(limit);
        let items = users.into_iter().skip(skip).take(limit).collect();

        Ok(UserPage { total, items })
    }

    /// Number of stored users.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn count(&self) -> Result<usize, UserError> {
        Ok(self.store.keys(USER_PREFIX).await?.len())
    }

    /// Number of users created at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn count_created_since(&self, since: DateTime<Utc>) -> Result<usize, UserError> {
        let users: Vec<User> = self.store.scan(USER_PREFIX).await?;
        Ok(users.iter().filter(|u| u.created_at >= since).count())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use vivid_storage::MemoryBackend;

    fn make_users() -> UserStore {
        UserStore::new(DocumentStore::new(Arc::new(MemoryBackend::new())))
    }

    fn identity(google_id: &str, email: &str, name: &str) -> Identity {
        Identity {
            google_id: google_id.to_owned(),
            email: Some(email.to_owned()),
            name: Some(name.to_owned()),
            picture: None,
        }
    }

    #[tokio::test]
    async fn first_login_creates_account() {
        let users = make_users();
        let now = Utc::now();
        let user = users
            .upsert_from_identity(&identity("g1", "ana@example.com", "Ana"), false, now)
            .await
            .unwrap();
        assert_eq!(user.email, "ana@example.com");
        assert!(!user.is_admin);
        assert_eq!(users.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_email_rejects_new_account() {
        let users = make_users();
        let ident = Identity {
            google_id: "g1".to_owned(),
            ..Identity::default()
        };
        let err = users.upsert_from_identity(&ident, false, Utc::now()).await.unwrap_err();
        assert!(matches!(err, UserError::MissingEmail { .. }));
    }

    #[tokio::test]
    async fn later_login_refreshes_profile_and_keeps_manual_admin() {
        let users = make_users();
        let now = Utc::now();
        let user = users
            .upsert_from_identity(&identity("g1", "ana@example.com", "Ana"), false, now)
            .await
            .unwrap();
        users.set_admin(&user.id, true).await.unwrap();

        let again = users
            .upsert_from_identity(&identity("g1", "ana@example.com", "Ana B"), false, now)
            .await
            .unwrap();
        assert_eq!(again.id, user.id);
        assert_eq!(again.name, "Ana B");
        assert!(again.is_admin);
    }

    #[tokio::test]
    async fn env_admin_promotes_existing_account() {
        let users = make_users();
        let now = Utc::now();
        users
            .upsert_from_identity(&identity("g1", "boss@example.com", "Boss"), false, now)
            .await
            .unwrap();
        let again = users
            .upsert_from_identity(&identity("g1", "boss@example.com", "Boss"), true, now)
            .await
            .unwrap();
        assert!(again.is_admin);
    }

    #[tokio::test]
    async fn find_by_email_ignores_case() {
        let users = make_users();
        users
            .upsert_from_identity(&identity("g1", "Ana@Example.com", "Ana"), false, Utc::now())
            .await
            .unwrap();
        let found = users.find_by_email("ana@example.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn record_login_stamps_ip() {
        let users = make_users();
        let now = Utc::now();
        let user = users
            .upsert_from_identity(&identity("g1", "ana@example.com", "Ana"), false, now)
            .await
            .unwrap();
        let user = users.record_login(&user.id, Some("10.0.0.1"), now).await.unwrap();
        assert_eq!(user.last_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(user.last_login_at, Some(now));
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let users = make_users();
        let base = Utc::now();
        for (i, name) in ["Alpha", "Beta", "Alphonse"].iter().enumerate() {
            let at = base + Duration::minutes(i64::try_from(i).unwrap());
            users
                .upsert_from_identity(
                    &identity(&format!("g{i}"), &format!("{}@example.com", name.to_lowercase()), name),
                    false,
                    at,
                )
                .await
                .unwrap();
        }

        let page = users.list(Some("alph"), 1, 1).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Alphonse");

        let page2 = users.list(Some("ALPH"), 2, 1).await.unwrap();
        assert_eq!(page2.items[0].name, "Alpha");

        let clamped = users.list(None, 0, 0).await.unwrap();
        assert_eq!(clamped.total, 3);
        assert_eq!(clamped.items.len(), 1);
    }

    #[tokio::test]
    async fn count_created_since_counts_recent_accounts() {
        let users = make_users();
        let now = Utc::now();
        users
            .upsert_from_identity(&identity("old", "old@example.com", "Old"), false, now - Duration::days(10))
            .await
            .unwrap();
        users
            .upsert_from_identity(&identity("new", "new@example.com", "New"), false, now)
            .await
            .unwrap();
        let recent = users.count_created_since(now - Duration::days(7)).await.unwrap();
        assert_eq!(recent, 1);
    }

    #[tokio::test]
    async fn get_missing_user_is_not_found() {
        let users = make_users();
        let err = users.get("nope").await.unwrap_err();
        assert!(matches!(err, UserError::NotFound { .. }));
    }
}
