//! Comment auto-moderation.
//!
//! [`ContentFilter`] flags comments that contain a link or a word from the
//! profanity list. When it does, [`Moderator::enforce`] bans the author for
//! five hours: the account, its comments, and its cart are snapshotted into
//! a ban record and then purged.

use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{info, warn};

use crate::ban::{AutoBan, BanRecord, BanStore};
use crate::comment::CommentStore;
use crate::error::BanError;
use crate::user::UserStore;

/// How long an auto-ban lasts.
pub const AUTO_BAN_HOURS: i64 = 5;

/// Recorded as `banned_by` on auto-bans.
pub const AUTO_MODERATOR: &str = "auto-moderator";

const LINK_PATTERN: &str = r"\b(?:https?://|www\.)\S+\b";

const PROFANITY: &[&str] = &[
    "fuck", "shit", "bitch", "asshole", "damn", "bastard", "crap", "piss", "dick", "cock",
    "pussy", "slut", "whore", "fag", "dyke", "nigger", "nigga", "chink", "kike", "spic",
    "wetback", "retard", "cunt", "motherfucker", "cocksucker", "tits", "boobs", "wanker",
    "bollocks", "arse", "prick", "twat", "cum", "jizz", "anal", "anus", "blowjob", "dildo",
    "fucker", "shitty", "bitching", "dumbass", "jackass", "idiot", "sex", "porn", "xxx",
];

/// Why a comment was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Violation {
    Link,
    Profanity,
}

impl Violation {
    /// Reason stored on the resulting ban.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Link => "Posted a link in comments",
            Self::Profanity => "Posted profanity in comments",
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Link => f.write_str("link"),
            Self::Profanity => f.write_str("profanity"),
        }
    }
}

/// Compiled link and profanity detectors.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    link: Regex,
    profanity: Regex,
}

impl ContentFilter {
    /// Build the filter with the built-in word list.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_words(PROFANITY)
    }

    /// Build the filter with a custom word list. Words are matched whole,
    /// ignoring case, with regex metacharacters escaped.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a pattern fails to compile.
    pub fn with_words(words: &[&str]) -> Result<Self, regex::Error> {
        let link = RegexBuilder::new(LINK_PATTERN).case_insensitive(true).build()?;
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let profanity = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(true)
            .build()?;
        Ok(Self { link, profanity })
    }

    /// Check a comment. Links take precedence over profanity.
    #[must_use]
    pub fn check(&self, text: &str) -> Option<Violation> {
        if self.link.is_match(text) {
            Some(Violation::Link)
        } else if self.profanity.is_match(text) {
            Some(Violation::Profanity)
        } else {
            None
        }
    }
}

/// Applies the auto-ban when a comment violates the rules.
#[derive(Debug, Clone)]
pub struct Moderator {
    users: UserStore,
    comments: CommentStore,
    bans: BanStore,
}

impl Moderator {
    #[must_use]
    pub fn new(users: UserStore, comments: CommentStore, bans: BanStore) -> Self {
        Self {
            users,
            comments,
            bans,
        }
    }

    /// Ban the author of a violating comment.
    ///
    /// Snapshots the user, their comments, and their cart into a temporary
    /// ban expiring [`AUTO_BAN_HOURS`] from `now`, then deletes the comments
    /// and the account. Snapshot reads and purge deletes are best effort:
    /// failures are logged and do not stop the ban.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] if the ban record itself cannot be written.
    pub async fn enforce(
        &self,
        user_id: &str,
        violation: Violation,
        now: DateTime<Utc>,
    ) -> Result<BanRecord, BanError> {
        let user = match self.users.find(user_id).await {
            Ok(user) => user,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "auto-ban could not load user");
                None
            }
        };
        let comments = match self.comments.for_user(user_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "auto-ban could not load comments");
                Vec::new()
            }
        };
        let carts = user.as_ref().map(|u| u.cart.clone()).unwrap_or_default();

        let record = self
            .bans
            .auto_ban(
                AutoBan {
                    user_id,
                    user: user.as_ref(),
                    comments,
                    carts,
                    reason: violation.reason(),
                    expires_at: now + Duration::hours(AUTO_BAN_HOURS),
                },
                now,
            )
            .await?;

        if let Err(e) = self.comments.delete_for_user(user_id).await {
            warn!(user_id = %user_id, error = %e, "auto-ban failed to purge comments");
        }
        if let Err(e) = self.users.delete(user_id).await {
            warn!(user_id = %user_id, error = %e, "auto-ban failed to delete account");
        }

        info!(
            user_id = %user_id,
            ban_id = %record.id,
            violation = %violation,
            "user auto-banned"
        );

        Ok(record)
    }
}
