//! Admin dashboard counters.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::comment::CommentStore;
use crate::error::StatsError;
use crate::user::UserStore;

/// Window for the "recent users" counter.
pub const RECENT_USER_DAYS: i64 = 7;

/// Dashboard statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub users_count: usize,
    pub products_count: usize,
    pub comments_count: usize,
    /// Users created within the last seven days.
    pub recent_users: usize,
}

/// Collect dashboard statistics as of `now`.
///
/// # Errors
///
/// Returns [`StatsError`] if any of the underlying stores fails.
pub async fn collect(
    users: &UserStore,
    catalog: &Catalog,
    comments: &CommentStore,
    now: DateTime<Utc>,
) -> Result<Statistics, StatsError> {
    Ok(Statistics {
        users_count: users.count().await?,
        products_count: catalog.count_products().await?,
        comments_count: comments.count().await?,
        recent_users: users
            .count_created_since(now - Duration::days(RECENT_USER_DAYS))
            .await?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::moderation::ContentFilter;
    use crate::store::DocumentStore;
    use crate::user::Identity;
    use std::sync::Arc;
    use vivid_storage::MemoryBackend;

    #[tokio::test]
    async fn counts_recent_users_within_a_week() {
        let store = DocumentStore::new(Arc::new(MemoryBackend::new()));
        let users = UserStore::new(store.clone());
        let catalog = Catalog::new(store.clone());
        let comments = CommentStore::new(store, catalog.clone(), ContentFilter::new().unwrap());
        let now = Utc::now();

        for (gid, created) in [("g1", now - Duration::days(30)), ("g2", now - Duration::days(1))] {
            users
                .upsert_from_identity(
                    &Identity {
                        google_id: gid.to_owned(),
                        email: Some(format!("{gid}@example.com")),
                        ..Identity::default()
                    },
                    false,
                    created,
                )
                .await
                .unwrap();
        }

        let stats = collect(&users, &catalog, &comments, now).await.unwrap();
        assert_eq!(
            stats,
            Statistics {
                users_count: 2,
                products_count: 0,
                comments_count: 0,
                recent_users: 1,
            }
        );
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["recentUsers"], 1);
    }
}
