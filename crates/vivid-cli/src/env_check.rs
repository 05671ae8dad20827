//! Environment variable checks for `vivid check-env`.

/// Variables the server cannot sign anyone in without.
const REQUIRED: &[&str] = &[
    "GOOGLE_CLIENT_ID",
    "GOOGLE_CLIENT_SECRET",
    "GOOGLE_CALLBACK_URL",
    "ADMIN_EMAILS",
];

/// Variables that enable optional features.
const OPTIONAL: &[&str] = &[
    "VIVID_OWNER_EMAIL",
    "DISCORD_WEBHOOK_URL",
    "RECAPTCHA_SECRET_KEY",
    "VIVID_EVENT_LOG",
    "VIVID_PUBLIC_DIR",
    "VIVID_SECURE_COOKIES",
    "PORT",
];

/// One checked variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarStatus {
    pub name: &'static str,
    /// Masked value, or `None` when unset or blank.
    pub display: Option<String>,
}

/// Result of checking the environment.
#[derive(Debug, Clone)]
pub struct EnvReport {
    pub required: Vec<VarStatus>,
    pub optional: Vec<VarStatus>,
}

impl EnvReport {
    /// Names of required variables that are not set.
    pub fn missing(&self) -> Vec<&'static str> {
        self.required
            .iter()
            .filter(|v| v.display.is_none())
            .map(|v| v.name)
            .collect()
    }
}

fn head(value: &str, n: usize) -> String {
    value.chars().take(n).collect()
}

fn tail(value: &str, n: usize) -> String {
    let len = value.chars().count();
    value.chars().skip(len.saturating_sub(n)).collect()
}

/// Mask a value for display: secrets show only their last four characters,
/// connection strings their ends, and long values are shortened.
pub fn mask(name: &str, value: &str) -> String {
    if name.contains("SECRET") || name.contains("KEY") || name.contains("PASSWORD") {
        format!("***{}", tail(value, 4))
    } else if name == "DATABASE_URL" {
        format!("{}...{}", head(value, 20), tail(value, 10))
    } else if value.chars().count() > 50 {
        format!("{}...", head(value, 30))
    } else {
        value.to_owned()
    }
}

/// Check every known variable through `lookup`.
///
/// `DATABASE_URL` becomes required when `VIVID_STORAGE` selects Postgres.
pub fn check(lookup: impl Fn(&str) -> Option<String>) -> EnvReport {
    let status = |name: &'static str| VarStatus {
        name,
        display: lookup(name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| mask(name, &v)),
    };

    let postgres = lookup("VIVID_STORAGE")
        .is_some_and(|s| matches!(s.to_lowercase().as_str(), "postgres" | "postgresql"));

    let mut required: Vec<VarStatus> = REQUIRED.iter().map(|n| status(*n)).collect();
    if postgres {
        required.push(status("DATABASE_URL"));
    }
    let optional = OPTIONAL.iter().map(|n| status(*n)).collect();

    EnvReport { required, optional }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn secrets_show_only_last_four() {
        assert_eq!(mask("GOOGLE_CLIENT_SECRET", "abcdefgh1234"), "***1234");
        assert_eq!(mask("RECAPTCHA_SECRET_KEY", "xy"), "***xy");
    }

    #[test]
    fn long_values_are_shortened() {
        let long = "a".repeat(60);
        assert_eq!(mask("GOOGLE_CALLBACK_URL", &long), format!("{}...", "a".repeat(30)));
        assert_eq!(mask("ADMIN_EMAILS", "a@b.c"), "a@b.c");
    }

    #[test]
    fn database_url_keeps_both_ends() {
        let masked = mask("DATABASE_URL", "postgres://user:pw@db.internal:5432/vivid");
        assert!(masked.starts_with("postgres://user:pw@d"));
        assert!(masked.ends_with("5432/vivid"));
    }

    #[test]
    fn blank_required_counts_as_missing() {
        let report = check(env(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_CALLBACK_URL", "  "),
        ]));
        assert_eq!(report.missing(), vec!["GOOGLE_CALLBACK_URL", "ADMIN_EMAILS"]);
    }

    #[test]
    fn postgres_requires_database_url() {
        let report = check(env(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_CALLBACK_URL", "https://shop/cb"),
            ("ADMIN_EMAILS", "boss@example.com"),
            ("VIVID_STORAGE", "postgres"),
        ]));
        assert_eq!(report.missing(), vec!["DATABASE_URL"]);

        let memory = check(env(&[
            ("GOOGLE_CLIENT_ID", "id"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("GOOGLE_CALLBACK_URL", "https://shop/cb"),
            ("ADMIN_EMAILS", "boss@example.com"),
        ]));
        assert!(memory.missing().is_empty());
    }
}
