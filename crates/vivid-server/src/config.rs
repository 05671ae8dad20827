//! Server configuration for Vivid Vision.
//!
//! Loaded once from environment variables at startup. Every setting has a
//! default that is safe for local development with in-memory storage.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Storage backend type.
    pub storage_backend: StorageBackendType,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Directory holding the HTML pages and static assets.
    pub public_dir: PathBuf,
    /// Raw `ADMIN_EMAILS` comma list.
    pub admin_emails: String,
    /// Account that can never be demoted.
    pub owner_email: Option<String>,
    /// Google sign-in (None disables `/auth/google`).
    pub google_oauth: Option<GoogleOAuthConfig>,
    /// Chat webhook for notifications and the event log.
    pub webhook_url: Option<String>,
    /// reCAPTCHA secret. When unset, captcha responses are only checked for
    /// presence.
    pub recaptcha_secret: Option<String>,
    /// Path of the JSON-lines event log (optional).
    pub event_log_path: Option<PathBuf>,
    /// Seconds between sweeps of expired bans and sessions.
    pub sweep_interval_secs: u64,
    /// Session lifetime in hours.
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

/// Google OAuth 2.0 client settings.
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Redirect URI registered with Google.
    pub callback_url: String,
}

/// Supported storage backend types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendType {
    /// In-memory (development only, data lost on restart).
    Memory,
    /// PostgreSQL persistent storage.
    Postgres { url: String },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            storage_backend: StorageBackendType::Memory,
            log_level: "info".to_owned(),
            public_dir: PathBuf::from("./public"),
            admin_emails: String::new(),
            owner_email: None,
            google_oauth: None,
            webhook_url: None,
            recaptcha_secret: None,
            event_log_path: None,
            sweep_interval_secs: 3600,
            session_ttl_hours: 336,
            secure_cookies: false,
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "true" || v == "1")
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `VIVID_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:3000`)
    /// - `PORT`: port to bind on `0.0.0.0`
    /// - `VIVID_STORAGE`: `memory` or `postgres` (default: `memory`)
    /// - `DATABASE_URL`: PostgreSQL connection string
    /// - `VIVID_LOG_LEVEL`: log filter (default: `info`)
    /// - `VIVID_PUBLIC_DIR`: pages and assets (default: `./public`)
    /// - `ADMIN_EMAILS`, `VIVID_OWNER_EMAIL`
    /// - `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_CALLBACK_URL`
    /// - `DISCORD_WEBHOOK_URL`, `RECAPTCHA_SECRET_KEY`
    /// - `VIVID_EVENT_LOG`: JSON-lines event log path (optional)
    /// - `VIVID_SWEEP_INTERVAL`: seconds between sweeps (default: `3600`)
    /// - `VIVID_SESSION_TTL_HOURS`: session lifetime (default: `336`)
    /// - `VIVID_SECURE_COOKIES`: `true` behind HTTPS
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = if let Ok(addr) = std::env::var("VIVID_BIND_ADDR") {
            addr.parse().unwrap_or(defaults.bind_addr)
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(3000);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            defaults.bind_addr
        };

        let storage_backend = match std::env::var("VIVID_STORAGE")
            .unwrap_or_else(|_| "memory".to_owned())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => {
                let url = std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgres://localhost/vivid".to_owned());
                StorageBackendType::Postgres { url }
            }
            _ => StorageBackendType::Memory,
        };

        let google_oauth = match (non_empty("GOOGLE_CLIENT_ID"), non_empty("GOOGLE_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(GoogleOAuthConfig {
                client_id,
                client_secret,
                callback_url: non_empty("GOOGLE_CALLBACK_URL")
                    .unwrap_or_else(|| "/auth/google/callback".to_owned()),
            }),
            _ => None,
        };

        Self {
            bind_addr,
            storage_backend,
            log_level: non_empty("VIVID_LOG_LEVEL").unwrap_or(defaults.log_level),
            public_dir: non_empty("VIVID_PUBLIC_DIR").map_or(defaults.public_dir, PathBuf::from),
            admin_emails: std::env::var("ADMIN_EMAILS").unwrap_or_default(),
            owner_email: non_empty("VIVID_OWNER_EMAIL"),
            google_oauth,
            webhook_url: non_empty("DISCORD_WEBHOOK_URL"),
            recaptcha_secret: non_empty("RECAPTCHA_SECRET_KEY"),
            event_log_path: non_empty("VIVID_EVENT_LOG").map(PathBuf::from),
            sweep_interval_secs: std::env::var("VIVID_SWEEP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.sweep_interval_secs),
            session_ttl_hours: std::env::var("VIVID_SESSION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.session_ttl_hours),
            secure_cookies: flag("VIVID_SECURE_COOKIES"),
        }
    }
}
