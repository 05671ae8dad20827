//! Site-wide announcement banners, stored at `announcements/<id>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AnnouncementError;
use crate::store::DocumentStore;

/// Storage prefix for announcements.
pub const ANNOUNCEMENT_PREFIX: &str = "announcements/";

/// Banner style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementKind {
    #[default]
    Info,
    Warning,
    Success,
    Danger,
}

/// An announcement banner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: AnnouncementKind,
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for a new announcement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<AnnouncementKind>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn announcement_key(id: &str) -> String {
    format!("{ANNOUNCEMENT_PREFIX}{id}")
}

/// Announcement persistence.
#[derive(Debug, Clone)]
pub struct AnnouncementBoard {
    store: DocumentStore,
}

impl AnnouncementBoard {
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Every announcement, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncementError::Store`] if storage fails.
    pub async fn list(&self) -> Result<Vec<Announcement>, AnnouncementError> {
        let mut all: Vec<Announcement> = self.store.scan(ANNOUNCEMENT_PREFIX).await?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    /// Active announcements, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AnnouncementError::Store`] if storage fails.
    pub async fn active(&self) -> Result<Vec<Announcement>, AnnouncementError> {
        let mut all = self.list().await?;
        all.retain(|a| a.is_active);
        Ok(all)
    }

    /// Publish a new announcement. Active unless the draft says otherwise.
    ///
    /// # Errors
    ///
    /// - [`AnnouncementError::Invalid`] if title or message is blank.
    /// - [`AnnouncementError::Store`] if storage fails.
    pub async fn create(
        &self,
        draft: AnnouncementDraft,
        created_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Announcement, AnnouncementError> {
        let title = draft.title.trim();
        let message = draft.message.trim();
        if title.is_empty() || message.is_empty() {
            return Err(AnnouncementError::Invalid {
                reason: "title and message are required".to_owned(),
            });
        }

        let announcement = Announcement {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_owned(),
            message: message.to_owned(),
            kind: draft.kind.unwrap_or_default(),
            is_active: draft.is_active.unwrap_or(true),
            created_by: created_by.map(str::to_owned),
            created_at: now,
            updated_at: now,
        };
        self.store
            .put(&announcement_key(&announcement.id), &announcement)
            .await?;

        info!(announcement_id = %announcement.id, "announcement created");

        Ok(announcement)
    }

    /// Show or hide an announcement.
    ///
    /// # Errors
    ///
    /// - [`AnnouncementError::NotFound`] if absent.
    /// - [`AnnouncementError::Store`] if storage fails.
    pub async fn set_active(
        &self,
        id: &str,
        is_active: bool,
        now: DateTime<Utc>,
    ) -> Result<Announcement, AnnouncementError> {
        let key = announcement_key(id);
        let mut announcement: Announcement =
            self.store
                .get(&key)
                .await?
                .ok_or_else(|| AnnouncementError::NotFound {
                    announcement_id: id.to_owned(),
                })?;
        announcement.is_active = is_active;
        announcement.updated_at = now;
        self.store.put(&key, &announcement).await?;
        Ok(announcement)
    }

    /// Remove an announcement.
    ///
    /// # Errors
    ///
    /// - [`AnnouncementError::NotFound`] if absent.
    /// - [`AnnouncementError::Store`] if storage fails.
    pub async fn delete(&self, id: &str) -> Result<(), AnnouncementError> {
        let key = announcement_key(id);
        if !self.store.exists(&key).await? {
            return Err(AnnouncementError::NotFound {
                announcement_id: id.to_owned(),
            });
        }
        self.store.delete(&key).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;
    use vivid_storage::MemoryBackend;

    fn board() -> AnnouncementBoard {
        AnnouncementBoard::new(DocumentStore::new(Arc::new(MemoryBackend::new())))
    }

    fn draft(title: &str) -> AnnouncementDraft {
        AnnouncementDraft {
            title: title.to_owned(),
            message: "body".to_owned(),
            ..AnnouncementDraft::default()
        }
    }

    #[tokio::test]
    async fn active_lists_newest_visible_first() {
        let board = board();
        let now = Utc::now();
        let old = board.create(draft("old"), None, now).await.unwrap();
        let hidden = board
            .create(draft("hidden"), None, now + Duration::minutes(1))
            .await
            .unwrap();
        board.create(draft("new"), Some("u1"), now + Duration::minutes(2)).await.unwrap();
        board.set_active(&hidden.id, false, now).await.unwrap();

        let titles: Vec<_> = board.active().await.unwrap().into_iter().map(|a| a.title).collect();
        assert_eq!(titles, vec!["new", "old"]);
        assert_eq!(old.kind, AnnouncementKind::Info);
    }

    #[tokio::test]
    async fn blank_title_is_invalid() {
        let err = board().create(draft(" "), None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AnnouncementError::Invalid { .. }));
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let board = board();
        assert!(matches!(
            board.delete("nope").await.unwrap_err(),
            AnnouncementError::NotFound { .. }
        ));
        let a = board.create(draft("x"), None, Utc::now()).await.unwrap();
        board.delete(&a.id).await.unwrap();
        assert!(board.list().await.unwrap().is_empty());
    }

    #[test]
    fn kind_uses_type_field() {
        let d: AnnouncementDraft =
            serde_json::from_str(r#"{"title":"t","message":"m","type":"danger"}"#).unwrap();
        assert_eq!(d.kind, Some(AnnouncementKind::Danger));
    }
}
