//! Push payload parsing for notifications
//!
//! Rendering belongs to the host; this only turns an optional payload into
//! something displayable without ever failing.

use serde::Deserialize;
use tracing::debug;

/// Title used when the payload does not carry one
pub const DEFAULT_TITLE: &str = "Fortune";

/// A notification ready to hand to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Page opened when the notification is clicked
    pub url: String,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: String::new(),
            url: "/".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Payload {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

impl Notification {
    /// Builds a notification from a JSON `{ title, body, url }` payload
    ///
    /// Missing fields fall back to defaults; an absent or malformed payload
    /// yields the default notification.
    pub fn from_payload(payload: Option<&[u8]>) -> Self {
        let Some(bytes) = payload else {
            return Self::default();
        };
        let parsed: Payload = match serde_json::from_slice(bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!(error = %e, "ignoring malformed push payload");
                return Self::default();
            }
        };

        let defaults = Self::default();
        Self {
            title: parsed.title.filter(|t| !t.is_empty()).unwrap_or(defaults.title),
            body: parsed.body.unwrap_or(defaults.body),
            url: parsed.url.filter(|u| !u.is_empty()).unwrap_or(defaults.url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_payload() {
        let payload = br#"{"title":"Your tarot is ready","body":"The Star","url":"/tarot/7"}"#;
        let notification = Notification::from_payload(Some(payload));
        assert_eq!(notification.title, "Your tarot is ready");
        assert_eq!(notification.body, "The Star");
        assert_eq!(notification.url, "/tarot/7");
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let notification = Notification::from_payload(Some(br#"{"body":"New dream reading"}"#));
        assert_eq!(notification.title, DEFAULT_TITLE);
        assert_eq!(notification.body, "New dream reading");
        assert_eq!(notification.url, "/");
    }

    #[test]
    fn test_absent_payload_is_default() {
        assert_eq!(Notification::from_payload(None), Notification::default());
    }

    #[test]
    fn test_malformed_payload_is_default() {
        assert_eq!(
            Notification::from_payload(Some(b"not json {")),
            Notification::default()
        );
        assert_eq!(
            Notification::from_payload(Some(b"42")),
            Notification::default()
        );
    }
}
