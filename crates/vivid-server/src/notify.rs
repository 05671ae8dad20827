//! Chat webhook notifications.
//!
//! Contact messages, ban appeals, developer messages, and the event log all
//! post a Discord-compatible `{"content": "..."}` body to a webhook.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use vivid_core::error::EventError;
use vivid_core::events::{Event, EventSink};

/// Longest message the webhook accepts from us.
pub const MAX_MESSAGE_CHARS: usize = 1900;

/// Longest pretty-printed `meta` block inside an event message.
pub const MAX_META_CHARS: usize = 1500;

/// Webhook delivery failure.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The request could not be sent.
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The webhook answered with a non-success status.
    #[error("webhook returned status {status}")]
    Status { status: u16 },
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    content: &'a str,
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Post `content` to a webhook URL.
///
/// # Errors
///
/// Returns [`NotifyError`] if the request fails or is rejected.
pub async fn post_content(
    client: &reqwest::Client,
    url: &str,
    content: &str,
) -> Result<(), NotifyError> {
    let response = client
        .post(url)
        .json(&WebhookBody {
            content: truncate_chars(content, MAX_MESSAGE_CHARS),
        })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(NotifyError::Status {
            status: response.status().as_u16(),
        });
    }
    debug!("webhook message delivered");
    Ok(())
}

/// The configured notification webhook.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    url: String,
}

impl Notifier {
    #[must_use]
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    /// Send a message.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery fails.
    pub async fn send(&self, content: &str) -> Result<(), NotifyError> {
        post_content(&self.client, &self.url, content).await
    }
}

/// Message posted when a visitor uses the contact form.
#[must_use]
pub fn contact_message(
    name: &str,
    email: &str,
    phone: Option<&str>,
    subject: Option<&str>,
    message: &str,
) -> String {
    let mut lines = vec![
        "**New Contact Message**".to_owned(),
        format!("**Name:** {name}"),
        format!("**Email:** {email}"),
    ];
    if let Some(phone) = phone.filter(|p| !p.is_empty()) {
        lines.push(format!("**Phone:** {phone}"));
    }
    if let Some(subject) = subject.filter(|s| !s.is_empty()) {
        lines.push(format!("**Subject:** {subject}"));
    }
    lines.push(String::new());
    lines.push("**Message:**".to_owned());
    lines.push(message.to_owned());
    lines.join("\n")
}

/// Message posted when a banned user appeals.
#[must_use]
pub fn appeal_message(email: &str, reason: &str, message: &str) -> String {
    format!(
        "**Ban Appeal Submitted**\n\n**User:** {email}\n**Ban Reason:** {reason}\n**Appeal Message:**\n{message}"
    )
}

/// Render an event as a webhook message.
#[must_use]
pub fn event_message(event: &Event) -> String {
    let mut out = format!("**[{}] {}**\n", event.category, event.action);
    let who = event.actor.as_ref().map_or("anonymous", |a| a.label());
    let _ = writeln!(out, "User: {who}");
    let _ = write!(out, "Time: {}", event.timestamp.to_rfc3339());

    if !event.meta.is_null() {
        let pretty = serde_json::to_string_pretty(&event.meta).unwrap_or_default();
        let _ = write!(
            out,
            "\n```json\n{}\n```",
            truncate_chars(&pretty, MAX_META_CHARS)
        );
    }
    out
}

/// Event sink that forwards events to the webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    notifier: Notifier,
}

impl WebhookSink {
    #[must_use]
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

#[async_trait::async_trait]
impl EventSink for WebhookSink {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &Event) -> Result<(), EventError> {
        self.notifier
            .send(&event_message(event))
            .await
            .map_err(|e| EventError::SinkFailure {
                name: "webhook".to_owned(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivid_core::events::Actor;

    #[test]
    fn contact_message_skips_missing_optional_lines() {
        let msg = contact_message("Ana", "ana@example.com", None, Some("Hi"), "Hello there");
        assert_eq!(
            msg,
            "**New Contact Message**\n**Name:** Ana\n**Email:** ana@example.com\n**Subject:** Hi\n\n**Message:**\nHello there"
        );
    }

    #[test]
    fn appeal_message_layout() {
        let msg = appeal_message("ana@example.com", "Spam", "Sorry");
        assert!(msg.starts_with("**Ban Appeal Submitted**\n\n**User:** ana@example.com"));
        assert!(msg.ends_with("**Appeal Message:**\nSorry"));
    }

    #[test]
    fn event_message_truncates_meta() {
        let event = Event::new("ADMIN", "USER_BAN")
            .actor(Actor {
                email: Some("admin@example.com".to_owned()),
                ..Actor::default()
            })
            .meta(serde_json::json!({ "blob": "x".repeat(4000) }));
        let msg = event_message(&event);
        assert!(msg.starts_with("**[ADMIN] USER_BAN**\nUser: admin@example.com\nTime: "));
        let block = msg.split("```json\n").nth(1).unwrap_or_default();
        let meta = block.trim_end_matches("\n```");
        assert_eq!(meta.chars().count(), MAX_META_CHARS);
    }

    #[test]
    fn event_without_actor_is_anonymous() {
        let msg = event_message(&Event::new("AUTH", "LOGOUT"));
        assert!(msg.contains("User: anonymous"));
        assert!(!msg.contains("```"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
