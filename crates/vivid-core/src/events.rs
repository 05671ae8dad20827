//! Business event log.
//!
//! Logins, comments, cart changes, orders, and every admin action produce an
//! [`Event`]. The [`EventLog`] hands each event to all registered sinks
//! (a JSON-lines file, a chat webhook). Delivery is best effort: a failing
//! sink is logged and skipped, and never fails the request that caused the
//! event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::EventError;
use crate::user::User;

/// Who triggered an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: Some(user.id.clone()),
            email: Some(user.email.clone()),
            name: Some(user.name.clone()).filter(|n| !n.is_empty()),
        }
    }
}

impl Actor {
    /// Short label: email, else name, else ID.
    #[must_use]
    pub fn label(&self) -> &str {
        self.email
            .as_deref()
            .or(self.name.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("anonymous")
    }
}

/// A single business event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    /// Broad area, e.g. `AUTH`, `COMMENT`, `ADMIN`.
    pub category: String,
    /// What happened, e.g. `LOGIN`, `USER_BAN`.
    pub action: String,
    pub actor: Option<Actor>,
    pub meta: serde_json::Value,
}

impl Event {
    /// New event stamped with the current time.
    #[must_use]
    pub fn new(category: &str, action: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            category: category.to_owned(),
            action: action.to_owned(),
            actor: None,
            meta: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn actor(mut self, actor: impl Into<Actor>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

/// Destination for events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Sink name for diagnostics.
    fn name(&self) -> &str;

    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be delivered.
    async fn deliver(&self, event: &Event) -> Result<(), EventError>;
}

/// Fans events out to every registered sink.
#[derive(Default)]
pub struct EventLog {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink.
    pub async fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().await.push(sink);
    }

    /// Number of registered sinks.
    pub async fn sink_count(&self) -> usize {
        self.sinks.read().await.len()
    }

    /// Deliver an event to every sink. Returns how many accepted it.
    pub async fn record(&self, event: Event) -> usize {
        let sinks = self.sinks.read().await;
        let mut delivered: usize = 0;
        for sink in sinks.iter() {
            match sink.deliver(&event).await {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(e) => {
                    warn!(
                        sink = sink.name(),
                        category = %event.category,
                        action = %event.action,
                        error = %e,
                        "event sink failed"
                    );
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Collecting {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl EventSink for Collecting {
        fn name(&self) -> &'static str {
            "collecting"
        }

        async fn deliver(&self, event: &Event) -> Result<(), EventError> {
            self.seen.lock().await.push(event.action.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl EventSink for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn deliver(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::SinkFailure {
                name: "broken".to_owned(),
                reason: "always".to_owned(),
            })
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let log = EventLog::new();
        let collecting = Arc::new(Collecting::default());
        log.add_sink(Arc::new(Broken)).await;
        log.add_sink(collecting.clone()).await;

        let delivered = log.record(Event::new("CART", "CART_SAVE")).await;
        assert_eq!(delivered, 1);
        assert_eq!(*collecting.seen.lock().await, vec!["CART_SAVE"]);
    }

    #[tokio::test]
    async fn no_sinks_is_fine() {
        let log = EventLog::new();
        assert_eq!(log.record(Event::new("AUTH", "LOGIN")).await, 0);
    }

    #[test]
    fn actor_label_prefers_email() {
        let actor = Actor {
            id: Some("u1".to_owned()),
            email: None,
            name: Some("Ana".to_owned()),
        };
        assert_eq!(actor.label(), "Ana");
        assert_eq!(Actor::default().label(), "anonymous");
    }
}
