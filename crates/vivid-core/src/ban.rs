//! Ban records and the appeal workflow.
//!
//! A ban is a denylist entry keyed by the banned account's email and Google
//! ID, so it outlives the account itself (which is deleted when the ban is
//! issued). Temporary bans carry an `expires_at`; permanent bans carry none.
//!
//! Expired temporary bans are removed two ways: lazily, when a lookup trips
//! over one, and in bulk by [`BanStore::sweep_expired`], which the server
//! runs on a timer.
//!
//! Records live at `bans/<id>`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::comment::Comment;
use crate::error::BanError;
use crate::order::Order;
use crate::store::DocumentStore;
use crate::user::{CartLine, User, UserStore};

/// Storage prefix for ban records.
pub const BAN_PREFIX: &str = "bans/";

/// Reason recorded when an admin gives none.
pub const DEFAULT_REASON: &str = "Violation of terms";

/// Temporary or permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanType {
    Temporary,
    #[default]
    Permanent,
}

impl std::fmt::Display for BanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temporary => f.write_str("temporary"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// State of a ban appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

/// Admin decision on an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealDecision {
    Approve,
    Reject,
}

/// Identity fields copied from the banned account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedIdentity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub google_id: String,
    #[serde(default)]
    pub picture: Option<String>,
}

impl From<&User> for BannedIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            google_id: user.google_id.clone(),
            picture: user.picture.clone(),
        }
    }
}

/// A denylist entry plus the data snapshotted when it was issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BanRecord {
    pub id: String,
    #[serde(default)]
    pub original_user_id: String,
    pub user: BannedIdentity,
    pub reason: String,
    pub banned_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ban_type: BanType,
    pub banned_by: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub carts: Vec<CartLine>,
    #[serde(default)]
    pub orders: Vec<Order>,
    #[serde(default)]
    pub appeal_status: Option<AppealStatus>,
    #[serde(default)]
    pub appeal_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BanRecord {
    /// Whether the ban still applies at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|exp| exp > now)
    }

    fn matches(&self, email: Option<&str>, google_id: Option<&str>) -> bool {
        let by_email = email.is_some_and(|e| {
            !e.is_empty() && !self.user.email.is_empty() && self.user.email.eq_ignore_ascii_case(e)
        });
        let by_google = google_id
            .is_some_and(|g| !g.is_empty() && self.user.google_id == g);
        by_email || by_google
    }
}

/// Admin ban parameters.
#[derive(Debug, Clone, Default)]
pub struct BanRequest {
    pub reason: Option<String>,
    pub ban_type: Option<BanType>,
    pub duration_hours: Option<i64>,
}

/// Snapshot handed over by the moderator for an auto-ban.
#[derive(Debug)]
pub struct AutoBan<'a> {
    pub user_id: &'a str,
    pub user: Option<&'a User>,
    pub comments: Vec<Comment>,
    pub carts: Vec<CartLine>,
    pub reason: &'a str,
    pub expires_at: DateTime<Utc>,
}

fn ban_key(id: &str) -> String {
    format!("{BAN_PREFIX}{id}")
}

/// Ban persistence and lifecycle.
#[derive(Debug, Clone)]
pub struct BanStore {
    store: DocumentStore,
    users: UserStore,
}

impl BanStore {
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        let users = UserStore::new(store.clone());
        Self { store, users }
    }

    async fn all(&self) -> Result<Vec<BanRecord>, BanError> {
        Ok(self.store.scan(BAN_PREFIX).await?)
    }

    async fn save(&self, record: &BanRecord) -> Result<(), BanError> {
        self.store.put(&ban_key(&record.id), record).await?;
        Ok(())
    }

    /// Find an active ban matching the email (ignoring case) or Google ID.
    ///
    /// Matching records that have expired are deleted on the way.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if storage fails.
    pub async fn find_active(
        &self,
        email: Option<&str>,
        google_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, BanError> {
        let mut active = None;
        for record in self.all().await? {
            if !record.matches(email, google_id) {
                continue;
            }
            if record.is_active_at(now) {
                if active.is_none() {
                    active = Some(record);
                }
            } else {
                self.store.delete(&ban_key(&record.id)).await?;
                info!(ban_id = %record.id, "expired ban removed on lookup");
            }
        }
        Ok(active)
    }

    /// [`find_active`](Self::find_active) by email only.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if storage fails.
    pub async fn find_active_by_email(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BanRecord>, BanError> {
        self.find_active(Some(email), None, now).await
    }

    /// Ban a user on an admin's behalf and delete their account.
    ///
    /// An existing record for the same email is updated in place. A
    /// temporary ban with a positive duration expires `duration_hours` from
    /// `now`; any other ban has no expiry.
    ///
    /// # Errors
    ///
    /// - [`BanError::Invalid`] if the duration runs past the representable
    ///   date range.
    /// - [`BanError::Store`] if storage fails.
    pub async fn ban_user(
        &self,
        user: &User,
        request: BanRequest,
        banned_by: &str,
        now: DateTime<Utc>,
    ) -> Result<BanRecord, BanError> {
        let ban_type = request.ban_type.unwrap_or_default();
        let expires_at = match (ban_type, request.duration_hours) {
            (BanType::Temporary, Some(hours)) if hours > 0 => Some(
                Duration::try_hours(hours)
                    .and_then(|d| now.checked_add_signed(d))
                    .ok_or_else(|| BanError::Invalid {
                        reason: format!("ban duration of {hours} hours is too long"),
                    })?,
            ),
            _ => None,
        };
        let reason = request
            .reason
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REASON.to_owned());

        let existing = self
            .all()
            .await?
            .into_iter()
            .find(|r| !user.email.is_empty() && r.user.email.eq_ignore_ascii_case(&user.email));

        let record = match existing {
            Some(mut record) => {
                record.user = BannedIdentity::from(user);
                record.original_user_id.clone_from(&user.id);
                record.reason = reason;
                record.banned_at = now;
                record.expires_at = expires_at;
                record.ban_type = ban_type;
                record.banned_by = banned_by.to_owned();
                record.updated_at = now;
                record
            }
            None => BanRecord {
                id: uuid::Uuid::new_v4().to_string(),
                original_user_id: user.id.clone(),
                user: BannedIdentity::from(user),
                reason,
                banned_at: now,
                expires_at,
                ban_type,
                banned_by: banned_by.to_owned(),
                comments: Vec::new(),
                carts: Vec::new(),
                orders: Vec::new(),
                appeal_status: None,
                appeal_message: None,
                created_at: now,
                updated_at: now,
            },
        };
        self.save(&record).await?;

        if let Err(e) = self.users.delete(&user.id).await {
            warn!(user_id = %user.id, error = %e, "failed to delete banned account");
        }

        info!(
            ban_id = %record.id,
            user_id = %user.id,
            ban_type = %record.ban_type,
            banned_by = %banned_by,
            "user banned"
        );

        Ok(record)
    }

    /// Write a temporary auto-moderation ban.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if storage fails.
    pub async fn auto_ban(&self, ban: AutoBan<'_>, now: DateTime<Utc>) -> Result<BanRecord, BanError> {
        let user = ban.user.map(BannedIdentity::from).unwrap_or_else(|| BannedIdentity {
            id: ban.user_id.to_owned(),
            ..BannedIdentity::default()
        });
        let record = BanRecord {
            id: uuid::Uuid::new_v4().to_string(),
            original_user_id: ban.user_id.to_owned(),
            user,
            reason: ban.reason.to_owned(),
            banned_at: now,
            expires_at: Some(ban.expires_at),
            ban_type: BanType::Temporary,
            banned_by: crate::moderation::AUTO_MODERATOR.to_owned(),
            comments: ban.comments,
            carts: ban.carts,
            orders: Vec::new(),
            appeal_status: None,
            appeal_message: None,
            created_at: now,
            updated_at: now,
        };
        self.save(&record).await?;
        Ok(record)
    }

    /// Fetch a record by ID.
    ///
    /// # Errors
    ///
    /// - [`BanError::NotFound`] if absent.
    /// - [`BanError::Store`] if storage fails.
    pub async fn get(&self, ban_id: &str) -> Result<BanRecord, BanError> {
        self.store
            .get(&ban_key(ban_id))
            .await?
            .ok_or_else(|| BanError::NotFound {
                ban_id: ban_id.to_owned(),
            })
    }

    /// Lift a ban. Returns the removed record.
    ///
    /// # Errors
    ///
    /// - [`BanError::NotFound`] if absent.
    /// - [`BanError::Store`] if storage fails.
    pub async fn unban(&self, ban_id: &str) -> Result<BanRecord, BanError> {
        let record = self.get(ban_id).await?;
        self.store.delete(&ban_key(ban_id)).await?;

        info!(ban_id = %ban_id, email = %record.user.email, "ban lifted");

        Ok(record)
    }

    /// All records, most recently banned first.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if storage fails.
    pub async fn list(&self) -> Result<Vec<BanRecord>, BanError> {
        let mut records = self.all().await?;
        records.sort_by(|a, b| b.banned_at.cmp(&a.banned_at));
        Ok(records)
    }

    /// File an appeal against any ban recorded for `email`.
    ///
    /// # Errors
    ///
    /// - [`BanError::Invalid`] if email or message is empty.
    /// - [`BanError::NoBanForEmail`] if no record matches.
    /// - [`BanError::Store`] if storage fails.
    pub async fn submit_appeal(
        &self,
        email: &str,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<BanRecord, BanError> {
        let email = email.trim();
        let message = message.trim();
        if email.is_empty() || message.is_empty() {
            return Err(BanError::Invalid {
                reason: "email and message required".to_owned(),
            });
        }

        let mut record = self
            .all()
            .await?
            .into_iter()
            .find(|r| r.user.email.eq_ignore_ascii_case(email))
            .ok_or_else(|| BanError::NoBanForEmail {
                email: email.to_owned(),
            })?;

        record.appeal_status = Some(AppealStatus::Pending);
        record.appeal_message = Some(message.to_owned());
        record.updated_at = now;
        self.save(&record).await?;

        info!(ban_id = %record.id, "ban appeal submitted");

        Ok(record)
    }

    /// Resolve a pending appeal. Approval lifts the ban; rejection keeps it
    /// and marks the appeal rejected.
    ///
    /// # Errors
    ///
    /// - [`BanError::NotFound`] if absent.
    /// - [`BanError::Store`] if storage fails.
    pub async fn resolve_appeal(
        &self,
        ban_id: &str,
        decision: AppealDecision,
        now: DateTime<Utc>,
    ) -> Result<BanRecord, BanError> {
        let mut record = self.get(ban_id).await?;
        record.updated_at = now;

        match decision {
            AppealDecision::Approve => {
                record.appeal_status = Some(AppealStatus::Approved);
                self.store.delete(&ban_key(ban_id)).await?;
                info!(ban_id = %ban_id, "appeal approved, ban lifted");
            }
            AppealDecision::Reject => {
                record.appeal_status = Some(AppealStatus::Rejected);
                self.save(&record).await?;
                info!(ban_id = %ban_id, "appeal rejected");
            }
        }

        Ok(record)
    }

    /// Delete every temporary ban that has expired by `now`.
    ///
    /// Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if listing fails. Individual delete
    /// failures are logged and skipped.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, BanError> {
        let mut removed: usize = 0;
        for record in self.all().await? {
            let expired = record.ban_type == BanType::Temporary
                && record.expires_at.is_some_and(|exp| exp <= now);
            if !expired {
                continue;
            }
            match self.store.delete(&ban_key(&record.id)).await {
                Ok(()) => removed = removed.saturating_add(1),
                Err(e) => warn!(ban_id = %record.id, error = %e, "failed to delete expired ban"),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::user::Identity;
    use std::sync::Arc;
    use vivid_storage::MemoryBackend;

    struct Fixture {
        bans: BanStore,
        users: UserStore,
    }

    fn fixture() -> Fixture {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        Fixture {
            bans: BanStore::new(store.clone()),
            users: UserStore::new(store),
        }
    }

    async fn make_user(users: &UserStore, google_id: &str, email: &str) -> User {
        users
            .upsert_from_identity(
                &Identity {
                    google_id: google_id.to_owned(),
                    email: Some(email.to_owned()),
                    name: Some("Someone".to_owned()),
                    picture: None,
                },
                false,
                Utc::now(),
            )
            .await
            .unwrap()
    }

    fn temporary(hours: i64) -> BanRequest {
        BanRequest {
            reason: Some("spam".to_owned()),
            ban_type: Some(BanType::Temporary),
            duration_hours: Some(hours),
        }
    }

    #[tokio::test]
    async fn admin_ban_defaults_to_permanent_and_deletes_account() {
        let f = fixture();
        let now = Utc::now();
        let user = make_user(&f.users, "g1", "a@example.com").await;

        let record = f
            .bans
            .ban_user(&user, BanRequest::default(), "admin@example.com", now)
            .await
            .unwrap();
        assert_eq!(record.ban_type, BanType::Permanent);
        assert!(record.expires_at.is_none());
        assert_eq!(record.reason, DEFAULT_REASON);
        assert!(f.users.find(&user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn temporary_ban_without_duration_has_no_expiry() {
        let f = fixture();
        let user = make_user(&f.users, "g1", "a@example.com").await;
        let record = f
            .bans
            .ban_user(&user, temporary(0), "admin", Utc::now())
            .await
            .unwrap();
        assert_eq!(record.ban_type, BanType::Temporary);
        assert!(record.expires_at.is_none());
    }

    #[tokio::test]
    async fn ban_upserts_by_email() {
        let f = fixture();
        let now = Utc::now();
        let user = make_user(&f.users, "g1", "a@example.com").await;
        let first = f.bans.ban_user(&user, temporary(2), "admin", now).await.unwrap();
        let second = f
            .bans
            .ban_user(&user, BanRequest::default(), "admin", now)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(f.bans.list().await.unwrap().len(), 1);
        assert_eq!(second.ban_type, BanType::Permanent);
    }

    #[tokio::test]
    async fn oversized_duration_is_invalid() {
        let f = fixture();
        let user = make_user(&f.users, "g1", "a@example.com").await;

        for hours in [10_000_000_000, i64::MAX] {
            let err = f
                .bans
                .ban_user(&user, temporary(hours), "admin", Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, BanError::Invalid { .. }), "{hours}: {err}");
        }
        assert!(f.bans.list().await.unwrap().is_empty());
        assert!(f.users.find(&user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn emailless_ban_does_not_overwrite_another_emailless_record() {
        let f = fixture();
        let now = Utc::now();
        let ghost = f
            .bans
            .auto_ban(
                AutoBan {
                    user_id: "gone",
                    user: None,
                    comments: Vec::new(),
                    carts: Vec::new(),
                    reason: "Posted a link in comments",
                    expires_at: now + Duration::hours(5),
                },
                now,
            )
            .await
            .unwrap();

        let mut user = make_user(&f.users, "g2", "b@example.com").await;
        user.email = String::new();
        let admin_ban = f
            .bans
            .ban_user(&user, BanRequest::default(), "admin", now)
            .await
            .unwrap();

        assert_ne!(ghost.id, admin_ban.id);
        assert_eq!(f.bans.list().await.unwrap().len(), 2);
        assert_eq!(f.bans.get(&ghost.id).await.unwrap().reason, "Posted a link in comments");
    }

    #[tokio::test]
    async fn find_active_matches_email_or_google_id() {
        let f = fixture();
        let now = Utc::now();
        let user = make_user(&f.users, "g-123", "a@example.com").await;
        f.bans.ban_user(&user, BanRequest::default(), "admin", now).await.unwrap();

        assert!(f.bans.find_active(Some("A@EXAMPLE.COM"), None, now).await.unwrap().is_some());
        assert!(f.bans.find_active(Some("new@example.com"), Some("g-123"), now).await.unwrap().is_some());
        assert!(f.bans.find_active(Some("other@example.com"), Some("g-9"), now).await.unwrap().is_none());
        assert!(f.bans.find_active(Some(""), Some(""), now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_ban_is_removed_on_lookup() {
        let f = fixture();
        let now = Utc::now();
        let user = make_user(&f.users, "g1", "a@example.com").await;
        f.bans.ban_user(&user, temporary(1), "admin", now).await.unwrap();

        let later = now + Duration::hours(1);
        assert!(f.bans.find_active_by_email("a@example.com", later).await.unwrap().is_none());
        assert!(f.bans.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn active_until_strictly_after_expiry() {
        let now = Utc::now();
        let record = BanRecord {
            id: "b".to_owned(),
            original_user_id: String::new(),
            user: BannedIdentity::default(),
            reason: String::new(),
            banned_at: now,
            expires_at: Some(now + Duration::hours(1)),
            ban_type: BanType::Temporary,
            banned_by: String::new(),
            comments: Vec::new(),
            carts: Vec::new(),
            orders: Vec::new(),
            appeal_status: None,
            appeal_message: None,
            created_at: now,
            updated_at: now,
        };
        assert!(record.is_active_at(now));
        assert!(!record.is_active_at(now + Duration::hours(1)));
    }

    #[tokio::test]
    async fn unban_missing_is_not_found() {
        let f = fixture();
        assert!(matches!(f.bans.unban("nope").await.unwrap_err(), BanError::NotFound { .. }));
    }

    #[tokio::test]
    async fn appeal_then_reject_then_approve() {
        let f = fixture();
        let now = Utc::now();
        let user = make_user(&f.users, "g1", "a@example.com").await;
        let record = f.bans.ban_user(&user, BanRequest::default(), "admin", now).await.unwrap();

        let appealed = f.bans.submit_appeal("a@example.com", "sorry", now).await.unwrap();
        assert_eq!(appealed.appeal_status, Some(AppealStatus::Pending));
        assert_eq!(appealed.appeal_message.as_deref(), Some("sorry"));

        let rejected = f
            .bans
            .resolve_appeal(&record.id, AppealDecision::Reject, now)
            .await
            .unwrap();
        assert_eq!(rejected.appeal_status, Some(AppealStatus::Rejected));
        assert!(f.bans.find_active_by_email("a@example.com", now).await.unwrap().is_some());

        f.bans
            .resolve_appeal(&record.id, AppealDecision::Approve, now)
            .await
            .unwrap();
        assert!(f.bans.find_active_by_email("a@example.com", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn appeal_without_ban_or_message_fails() {
        let f = fixture();
        let now = Utc::now();
        assert!(matches!(
            f.bans.submit_appeal("x@example.com", "hi", now).await.unwrap_err(),
            BanError::NoBanForEmail { .. }
        ));
        assert!(matches!(
            f.bans.submit_appeal("x@example.com", "  ", now).await.unwrap_err(),
            BanError::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_temporary_bans() {
        let f = fixture();
        let now = Utc::now();
        let a = make_user(&f.users, "g1", "a@example.com").await;
        let b = make_user(&f.users, "g2", "b@example.com").await;
        let c = make_user(&f.users, "g3", "c@example.com").await;
        f.bans.ban_user(&a, temporary(1), "admin", now).await.unwrap();
        f.bans.ban_user(&b, temporary(10), "admin", now).await.unwrap();
        f.bans.ban_user(&c, BanRequest::default(), "admin", now).await.unwrap();

        let removed = f.bans.sweep_expired(now + Duration::hours(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(f.bans.list().await.unwrap().len(), 2);
    }
}
