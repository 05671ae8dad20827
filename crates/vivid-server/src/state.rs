//! Shared application state for the Vivid Vision server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. The stores are cheap clones over one
//! [`DocumentStore`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use vivid_core::access::AccessPolicy;
use vivid_core::announcement::AnnouncementBoard;
use vivid_core::ban::BanStore;
use vivid_core::cart::CartService;
use vivid_core::catalog::Catalog;
use vivid_core::checkout::Checkout;
use vivid_core::comment::CommentStore;
use vivid_core::events::{Event, EventLog};
use vivid_core::events_file::FileEventSink;
use vivid_core::moderation::{ContentFilter, Moderator};
use vivid_core::order::OrderBook;
use vivid_core::session::SessionStore;
use vivid_core::store::DocumentStore;
use vivid_core::user::UserStore;
use vivid_storage::StorageBackend;

use crate::captcha::Captcha;
use crate::config::ServerConfig;
use crate::notify::{Notifier, WebhookSink};
use crate::oauth::GoogleOAuth;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    pub users: UserStore,
    pub access: AccessPolicy,
    pub catalog: Catalog,
    pub comments: CommentStore,
    pub bans: BanStore,
    pub moderator: Moderator,
    pub cart: CartService,
    pub checkout: Checkout,
    pub orders: OrderBook,
    pub announcements: AnnouncementBoard,
    pub sessions: SessionStore,
    /// Business event log (file and webhook sinks).
    pub events: Arc<EventLog>,
    /// Contact and appeal notifications (None without a webhook).
    pub notifier: Option<Notifier>,
    /// Google sign-in (None if not configured).
    pub oauth: Option<GoogleOAuth>,
    pub captcha: Captcha,
    /// Outbound HTTP client (avatars, developer webhook).
    pub http: reqwest::Client,
    pub public_dir: PathBuf,
    pub secure_cookies: bool,
    pub session_ttl_secs: i64,
}

impl AppState {
    /// Wire every subsystem over `storage` according to `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the content filter fails to compile.
    pub async fn build(
        config: &ServerConfig,
        storage: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<Self> {
        let store = DocumentStore::new(storage);
        let http = reqwest::Client::new();

        let users = UserStore::new(store.clone());
        let catalog = Catalog::new(store.clone());
        let filter = ContentFilter::new().context("failed to compile content filter")?;
        let comments = CommentStore::new(store.clone(), catalog.clone(), filter);
        let bans = BanStore::new(store.clone());
        let moderator = Moderator::new(users.clone(), comments.clone(), bans.clone());
        let orders = OrderBook::new(store.clone());
        let session_ttl = chrono::Duration::hours(config.session_ttl_hours);

        let events = Arc::new(EventLog::new());
        if let Some(ref path) = config.event_log_path {
            events.add_sink(Arc::new(FileEventSink::new(path))).await;
            info!(path = %path.display(), "file event sink registered");
        }

        let notifier = config
            .webhook_url
            .clone()
            .map(|url| Notifier::new(http.clone(), url));
        if let Some(ref notifier) = notifier {
            events
                .add_sink(Arc::new(WebhookSink::new(notifier.clone())))
                .await;
            info!("webhook event sink registered");
        }

        let oauth = config
            .google_oauth
            .clone()
            .map(|cfg| GoogleOAuth::new(cfg, http.clone()));
        if oauth.is_none() {
            info!("google sign-in disabled (GOOGLE_CLIENT_ID / GOOGLE_CLIENT_SECRET not set)");
        }

        Ok(Self {
            access: AccessPolicy::from_list(&config.admin_emails, config.owner_email.as_deref()),
            cart: CartService::new(users.clone(), catalog.clone()),
            checkout: Checkout::new(users.clone(), catalog.clone(), orders.clone()),
            announcements: AnnouncementBoard::new(store.clone()),
            sessions: SessionStore::new(store, session_ttl),
            captcha: Captcha::new(config.recaptcha_secret.clone(), http.clone()),
            users,
            catalog,
            comments,
            bans,
            moderator,
            orders,
            events,
            notifier,
            oauth,
            http,
            public_dir: config.public_dir.clone(),
            secure_cookies: config.secure_cookies,
            session_ttl_secs: session_ttl.num_seconds(),
        })
    }

    /// Record a business event without blocking the response.
    pub fn record(&self, event: Event) {
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            events.record(event).await;
        });
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("public_dir", &self.public_dir)
            .finish_non_exhaustive()
    }
}
