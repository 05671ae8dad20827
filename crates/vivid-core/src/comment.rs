//! Product comments and admin replies.
//!
//! Comments are stored per product at `comments/<product_id>/<comment_id>`.
//! A comment is either top-level or a reply to a top-level comment on the
//! same product. Shoppers may post one top-level comment per product every
//! 48 hours; replies are not limited.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::error::CommentError;
use crate::moderation::ContentFilter;
use crate::store::DocumentStore;
use crate::user::User;

/// Storage prefix for all comments.
pub const COMMENT_PREFIX: &str = "comments/";

/// Minimum gap between two top-level comments by the same user on the same
/// product.
pub const TOP_LEVEL_COOLDOWN_HOURS: i64 = 48;

/// A stored comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_picture: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_admin_reply: bool,
    #[serde(default, rename = "parentCommentId")]
    pub parent_id: Option<String>,
    #[serde(default, rename = "parentCommentUserName")]
    pub parent_user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A comment as shown to a particular viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub can_delete: bool,
    pub can_reply: bool,
    pub avatar_url: String,
}

/// Who is looking at a comment thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentViewer<'a> {
    pub user_id: Option<&'a str>,
    pub is_admin: bool,
}

impl CommentView {
    fn new(comment: Comment, viewer: CommentViewer<'_>) -> Self {
        let is_author = viewer.user_id.is_some_and(|id| id == comment.user_id);
        let avatar_url = format!("/avatar/user/{}", comment.user_id);
        Self {
            can_delete: viewer.is_admin || is_author,
            can_reply: viewer.is_admin,
            avatar_url,
            comment,
        }
    }
}

fn product_prefix(product_id: &str) -> String {
    format!("{COMMENT_PREFIX}{product_id}/")
}

fn comment_key(product_id: &str, comment_id: &str) -> String {
    format!("{COMMENT_PREFIX}{product_id}/{comment_id}")
}

/// Comment persistence and posting rules.
#[derive(Debug, Clone)]
pub struct CommentStore {
    store: DocumentStore,
    catalog: Catalog,
    filter: ContentFilter,
}

impl CommentStore {
    #[must_use]
    pub fn new(store: DocumentStore, catalog: Catalog, filter: ContentFilter) -> Self {
        Self {
            store,
            catalog,
            filter,
        }
    }

    async fn on_product(&self, product_id: &str) -> Result<Vec<Comment>, CommentError> {
        Ok(self.store.scan(&product_prefix(product_id)).await?)
    }

    async fn all(&self) -> Result<Vec<Comment>, CommentError> {
        Ok(self.store.scan(COMMENT_PREFIX).await?)
    }

    /// Thread for a product: top-level comments newest first, each followed
    /// by its replies oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Store`] if storage fails.
    pub async fn thread(
        &self,
        product_id: &str,
        viewer: CommentViewer<'_>,
    ) -> Result<Vec<CommentView>, CommentError> {
        let comments = self.on_product(product_id).await?;
        let (mut top, mut replies): (Vec<_>, Vec<_>) =
            comments.into_iter().partition(|c| c.parent_id.is_none());
        top.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut views = Vec::with_capacity(top.len().saturating_add(replies.len()));
        for parent in top {
            let parent_id = parent.id.clone();
            views.push(CommentView::new(parent, viewer));
            for reply in replies
                .iter()
                .filter(|r| r.parent_id.as_deref() == Some(parent_id.as_str()))
            {
                views.push(CommentView::new(reply.clone(), viewer));
            }
        }
        Ok(views)
    }

    /// Post a comment or reply.
    ///
    /// Checks run in order: non-empty text, product exists, parent exists on
    /// the same product, content filter, then the top-level rate limit.
    /// A reply to a reply is filed under the top-level comment.
    ///
    /// # Errors
    ///
    /// - [`CommentError::EmptyText`] if the text is blank.
    /// - [`CommentError::ProductNotFound`] if the product is missing.
    /// - [`CommentError::ParentNotFound`] if the reply target is missing.
    /// - [`CommentError::Violation`] if the content filter rejects the text.
    /// - [`CommentError::RateLimited`] if the author commented on this
    ///   product within the last 48 hours.
    /// - [`CommentError::Store`] if storage fails.
    pub async fn post(
        &self,
        product_id: &str,
        author: &User,
        is_admin: bool,
        text: &str,
        parent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Comment, CommentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }

        let product_exists = self
            .catalog
            .find_product(product_id)
            .await
            .map_err(|e| match e {
                crate::error::CatalogError::Store(s) => CommentError::Store(s),
                other => {
                    warn!(error = %other, "unexpected catalog error during comment post");
                    CommentError::ProductNotFound {
                        product_id: product_id.to_owned(),
                    }
                }
            })?
            .is_some();
        if !product_exists {
            return Err(CommentError::ProductNotFound {
                product_id: product_id.to_owned(),
            });
        }

        let parent = match parent_id.filter(|p| !p.is_empty()) {
            Some(pid) => Some(
                self.store
                    .get::<Comment>(&comment_key(product_id, pid))
                    .await?
                    .ok_or_else(|| CommentError::ParentNotFound {
                        parent_id: pid.to_owned(),
                    })?,
            ),
            None => None,
        };

        if let Some(violation) = self.filter.check(text) {
            return Err(CommentError::Violation { violation });
        }

        if parent.is_none() {
            let window = Duration::hours(TOP_LEVEL_COOLDOWN_HOURS);
            let last = self
                .on_product(product_id)
                .await?
                .into_iter()
                .filter(|c| c.user_id == author.id && c.parent_id.is_none())
                .map(|c| c.created_at)
                .max();
            if let Some(last) = last {
                let elapsed = now - last;
                if elapsed < window {
                    return Err(CommentError::RateLimited {
                        retry_hours: ceil_hours(window - elapsed),
                    });
                }
            }
        }

        let comment = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_owned(),
            user_id: author.id.clone(),
            user_name: author.name.clone(),
            user_picture: author.picture.clone(),
            text: text.to_owned(),
            is_admin,
            is_admin_reply: is_admin && parent.is_some(),
            parent_id: parent.as_ref().map(thread_root),
            parent_user_name: parent.as_ref().map(|p| p.user_name.clone()),
            created_at: now,
        };
        self.store
            .put(&comment_key(product_id, &comment.id), &comment)
            .await?;

        info!(
            comment_id = %comment.id,
            product_id = %product_id,
            user_id = %author.id,
            reply = comment.parent_id.is_some(),
            "comment posted"
        );

        Ok(comment)
    }

    /// Reply to any comment as an admin, looked up by ID alone.
    ///
    /// # Errors
    ///
    /// - [`CommentError::EmptyText`] if the text is blank.
    /// - [`CommentError::NotFound`] if the parent comment is missing.
    /// - [`CommentError::Store`] if storage fails.
    pub async fn admin_reply(
        &self,
        parent_id: &str,
        admin: &User,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment, CommentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommentError::EmptyText);
        }

        let parent = self
            .all()
            .await?
            .into_iter()
            .find(|c| c.id == parent_id)
            .ok_or_else(|| CommentError::NotFound {
                comment_id: parent_id.to_owned(),
            })?;

        let name = if admin.name.is_empty() {
            "Admin".to_owned()
        } else {
            admin.name.clone()
        };
        let reply = Comment {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: parent.product_id.clone(),
            user_id: admin.id.clone(),
            user_name: name,
            user_picture: admin.picture.clone(),
            text: text.to_owned(),
            is_admin: true,
            is_admin_reply: true,
            parent_id: Some(thread_root(&parent)),
            parent_user_name: Some(parent.user_name.clone()),
            created_at: now,
        };
        self.store
            .put(&comment_key(&reply.product_id, &reply.id), &reply)
            .await?;

        info!(comment_id = %reply.id, parent_id = %parent.id, "admin reply posted");

        Ok(reply)
    }

    /// Delete a comment and every reply beneath it.
    ///
    /// Returns the number of documents removed.
    ///
    /// # Errors
    ///
    /// - [`CommentError::NotFound`] if the comment is not on this product.
    /// - [`CommentError::Forbidden`] unless the actor is the author or an admin.
    /// - [`CommentError::Store`] if storage fails.
    pub async fn delete(
        &self,
        product_id: &str,
        comment_id: &str,
        actor_id: &str,
        actor_is_admin: bool,
    ) -> Result<usize, CommentError> {
        let comment: Comment = self
            .store
            .get(&comment_key(product_id, comment_id))
            .await?
            .ok_or_else(|| CommentError::NotFound {
                comment_id: comment_id.to_owned(),
            })?;

        if comment.user_id != actor_id && !actor_is_admin {
            return Err(CommentError::Forbidden);
        }

        let siblings = self.on_product(product_id).await?;
        let mut doomed = vec![comment_id.to_owned()];
        let mut next = 0;
        while let Some(id) = doomed.get(next).cloned() {
            doomed.extend(
                siblings
                    .iter()
                    .filter(|c| c.parent_id.as_deref() == Some(id.as_str()))
                    .map(|c| c.id.clone()),
            );
            next += 1;
        }

        let mut removed: usize = 0;
        for id in doomed.iter().rev() {
            self.store.delete(&comment_key(product_id, id)).await?;
            removed = removed.saturating_add(1);
        }

        info!(comment_id = %comment_id, product_id = %product_id, removed, "comment deleted");

        Ok(removed)
    }

    /// Every comment written by a user, across all products.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Store`] if storage fails.
    pub async fn for_user(&self, user_id: &str) -> Result<Vec<Comment>, CommentError> {
        let mut comments: Vec<Comment> = self
            .all()
            .await?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments)
    }

    /// Delete every comment written by a user. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Store`] if storage fails.
    pub async fn delete_for_user(&self, user_id: &str) -> Result<usize, CommentError> {
        let mut removed: usize = 0;
        for comment in self.for_user(user_id).await? {
            self.store
                .delete(&comment_key(&comment.product_id, &comment.id))
                .await?;
            removed = removed.saturating_add(1);
        }
        Ok(removed)
    }

    /// Top-level shopper comments that no admin has answered, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Store`] if storage fails.
    pub async fn unreplied(&self, limit: usize) -> Result<Vec<Comment>, CommentError> {
        let comments = self.all().await?;
        let answered: std::collections::HashSet<&str> = comments
            .iter()
            .filter(|c| c.is_admin)
            .filter_map(|c| c.parent_id.as_deref())
            .collect();

        let mut open: Vec<Comment> = comments
            .iter()
            .filter(|c| c.parent_id.is_none() && !c.is_admin && !answered.contains(c.id.as_str()))
            .cloned()
            .collect();
        open.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        open.truncate(limit);
        Ok(open)
    }

    /// Number of stored comments.
    ///
    /// # Errors
    ///
    /// Returns [`CommentError::Store`] if storage fails.
    pub async fn count(&self) -> Result<usize, CommentError> {
        Ok(self.store.keys(COMMENT_PREFIX).await?.len())
    }
}

/// Top-level comment a reply to `parent` belongs under. Replies stay one
/// level deep so every one of them shows up in the thread.
fn thread_root(parent: &Comment) -> String {
    parent.parent_id.clone().unwrap_or_else(|| parent.id.clone())
}

/// Round a remaining duration up to whole hours.
fn ceil_hours(remaining: Duration) -> i64 {
    const HOUR_MS: i64 = 3_600_000;
    let ms = remaining.num_milliseconds().max(0);
    ms.saturating_add(HOUR_MS - 1) / HOUR_MS
}
