//! Intercepted request descriptors and persisted response records

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Marker header set on responses synthesized while offline
pub const OFFLINE_HEADER: &str = "x-fortune-cache";

/// What kind of resource the request is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Image,
    Font,
    Script,
    Style,
    Manifest,
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Large immutable assets that are worth serving from the store first
    pub fn is_static_asset(self) -> bool {
        matches!(self, Destination::Image | Destination::Font)
    }
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(Destination::Document),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "manifest" => Ok(Destination::Manifest),
            "" | "empty" => Ok(Destination::Empty),
            "other" => Ok(Destination::Other),
            other => Err(format!("unknown destination '{}'", other)),
        }
    }
}

/// An outgoing request as seen by the interception layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
    pub destination: Destination,
    /// Set for top-level page navigations
    pub navigation: bool,
}

impl InterceptedRequest {
    /// A plain `GET` for `url`
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            destination: Destination::Empty,
            navigation: false,
        }
    }

    /// A top-level document navigation to `url`
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            destination: Destination::Document,
            navigation: true,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Parsed URL, if the request carries a valid absolute one
    pub fn parsed_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }

    /// Lower-cased host of the request URL
    pub fn host(&self) -> Option<String> {
        self.parsed_url()
            .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// Normalized identity used as the store key
    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(&self.method, &self.url)
    }
}

/// Normalized `METHOD url` pair identifying a stored response
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestIdentity(String);

impl RequestIdentity {
    /// Upper-cases the method and strips the URL fragment
    ///
    /// URLs that do not parse are kept verbatim.
    pub fn new(method: &str, url: &str) -> Self {
        let url = match Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => url.to_string(),
        };
        Self(format!("{} {}", method.trim().to_ascii_uppercase(), url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A response as returned to the caller and as persisted in a generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    /// Final URL the response was served for
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// When the response left the network
    pub stored_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
            stored_at: Utc::now(),
        }
    }

    /// Synthetic response handed out when neither network nor store can help
    pub fn offline(url: impl Into<String>) -> Self {
        let mut response = Self::new(url, 503, Bytes::from_static(b"offline"));
        response
            .headers
            .push((OFFLINE_HEADER.to_string(), "offline".to_string()));
        response
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx responses are the only ones written to a generation
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_offline(&self) -> bool {
        self.status == 503 && self.header(OFFLINE_HEADER) == Some("offline")
    }

    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_normalizes_method_and_fragment() {
        let a = RequestIdentity::new("get", "https://app.example.com/tarot#card-3");
        let b = RequestIdentity::new("GET", "https://app.example.com/tarot");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "GET https://app.example.com/tarot");
    }

    #[test]
    fn test_identity_distinguishes_methods() {
        let get = RequestIdentity::new("GET", "https://app.example.com/api");
        let post = RequestIdentity::new("POST", "https://app.example.com/api");
        assert_ne!(get, post);
    }

    #[test]
    fn test_identity_keeps_unparsable_url() {
        let id = RequestIdentity::new("GET", "/relative/path");
        assert_eq!(id.as_str(), "GET /relative/path");
    }

    #[test]
    fn test_host_is_lowercased() {
        let request = InterceptedRequest::get("https://CDN.Example.com/a.png");
        assert_eq!(request.host().as_deref(), Some("cdn.example.com"));
    }

    #[test]
    fn test_navigate_sets_document_and_flag() {
        let request = InterceptedRequest::navigate("https://app.example.com/dreams");
        assert!(request.navigation);
        assert_eq!(request.destination, Destination::Document);
        assert_eq!(request.method, "GET");
    }

    #[test]
    fn test_destination_from_str() {
        assert_eq!("Image".parse::<Destination>(), Ok(Destination::Image));
        assert_eq!("font".parse::<Destination>(), Ok(Destination::Font));
        assert_eq!("".parse::<Destination>(), Ok(Destination::Empty));
        assert!("video".parse::<Destination>().is_err());
    }

    #[test]
    fn test_offline_response_is_marked() {
        let response = StoredResponse::offline("https://app.example.com/");
        assert_eq!(response.status, 503);
        assert!(response.is_offline());
        assert!(!response.is_success());
        assert_eq!(response.header("X-Fortune-Cache"), Some("offline"));
    }

    #[test]
    fn test_plain_503_is_not_offline_marker() {
        let response = StoredResponse::new("https://api.example.com/", 503, "busy");
        assert!(!response.is_offline());
    }

    #[test]
    fn test_stored_response_json_keeps_body_bytes() {
        let response = StoredResponse::new("https://app.example.com/", 200, "<html></html>")
            .with_header("content-type", "text/html");

        let json = serde_json::to_string(&response).expect("serialize");
        let back: StoredResponse = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back, response);
    }
}
