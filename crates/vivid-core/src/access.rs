//! Admin and owner checks.
//!
//! Two sources grant admin rights: the `is_admin` flag stored on the user
//! and the configured admin email list. Only listed emails are *super*
//! admins, who may promote and demote others. The owner email can never be
//! demoted.

use crate::user::User;

/// Admin email list plus the protected owner.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_emails: Vec<String>,
    owner_email: Option<String>,
}

impl AccessPolicy {
    /// Build a policy from a comma-separated email list.
    ///
    /// Entries are trimmed and lower-cased; empty entries are dropped.
    #[must_use]
    pub fn from_list(admin_emails: &str, owner_email: Option<&str>) -> Self {
        let admin_emails = admin_emails
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let owner_email = owner_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        Self {
            admin_emails,
            owner_email,
        }
    }

    /// The normalized admin emails.
    #[must_use]
    pub fn admin_emails(&self) -> &[String] {
        &self.admin_emails
    }

    /// Whether the email is on the configured admin list.
    #[must_use]
    pub fn is_super_admin(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }

    /// Whether the user has admin rights from either source.
    #[must_use]
    pub fn is_admin(&self, user: &User) -> bool {
        user.is_admin || self.is_super_admin(&user.email)
    }

    /// Whether the email belongs to the protected owner.
    #[must_use]
    pub fn is_protected(&self, email: &str) -> bool {
        self.owner_email
            .as_deref()
            .is_some_and(|owner| owner.eq_ignore_ascii_case(email.trim()))
    }
}
