//! Routing of intercepted requests to a caching strategy
//!
//! Rules are evaluated in order and the first match wins. The order matters
//! because the predicates overlap: an image served from the data API must
//! still be fetched network-first.

use std::fmt;
use wildmatch::WildMatch;

use super::request::InterceptedRequest;

/// How a request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from the store, touch the network only on a miss
    CacheFirst,
    /// Prefer the network, fall back to the store on failure
    NetworkFirst,
    /// Serve the stored copy now and refresh it in the background
    StaleWhileRevalidate,
    /// Not cacheable (non-GET or non-HTTP); go straight to the network
    Passthrough,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::Passthrough => "passthrough",
        };
        f.write_str(name)
    }
}

/// Case-insensitive glob over a host name (`*.supabase.co`)
#[derive(Debug, Clone)]
pub struct HostPattern {
    source: String,
    matcher: WildMatch,
}

impl HostPattern {
    pub fn new(pattern: &str) -> Self {
        let source = pattern.trim().to_ascii_lowercase();
        Self {
            matcher: WildMatch::new(&source),
            source,
        }
    }

    pub fn matches(&self, host: &str) -> bool {
        self.matcher.matches(&host.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Assigns each request to a [`Strategy`]
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    backend_hosts: Vec<HostPattern>,
    asset_hosts: Vec<HostPattern>,
}

impl Classifier {
    /// Builds a classifier from backend/data-API and static-asset CDN host patterns
    pub fn new<B, A>(backend_hosts: B, asset_hosts: A) -> Self
    where
        B: IntoIterator,
        B::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            backend_hosts: backend_hosts
                .into_iter()
                .map(|p| HostPattern::new(p.as_ref()))
                .collect(),
            asset_hosts: asset_hosts
                .into_iter()
                .map(|p| HostPattern::new(p.as_ref()))
                .collect(),
        }
    }

    pub fn classify(&self, request: &InterceptedRequest) -> Strategy {
        let Some(url) = request.parsed_url() else {
            return Strategy::Passthrough;
        };
        if !request.method.eq_ignore_ascii_case("GET")
            || !matches!(url.scheme(), "http" | "https")
        {
            return Strategy::Passthrough;
        }
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

        if Self::any_match(&self.backend_hosts, &host) {
            return Strategy::NetworkFirst;
        }
        if request.destination.is_static_asset() || Self::any_match(&self.asset_hosts, &host) {
            return Strategy::CacheFirst;
        }
        if request.navigation {
            return Strategy::NetworkFirst;
        }
        Strategy::StaleWhileRevalidate
    }

    fn any_match(patterns: &[HostPattern], host: &str) -> bool {
        patterns.iter().any(|p| p.matches(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::request::Destination;

    fn create_test_classifier() -> Classifier {
        Classifier::new(
            ["*.supabase.co", "api.fortune.example"],
            ["fonts.gstatic.com", "cdn.jsdelivr.net"],
        )
    }

    #[test]
    fn test_backend_host_is_network_first() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("https://abc.supabase.co/rest/v1/dreams");
        assert_eq!(classifier.classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_backend_rule_wins_over_image_destination() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("https://abc.supabase.co/storage/card.png")
            .with_destination(Destination::Image);
        assert_eq!(classifier.classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_image_and_font_are_cache_first() {
        let classifier = create_test_classifier();
        let image = InterceptedRequest::get("https://app.fortune.example/icons/moon.png")
            .with_destination(Destination::Image);
        let font = InterceptedRequest::get("https://app.fortune.example/fonts/serif.woff2")
            .with_destination(Destination::Font);
        assert_eq!(classifier.classify(&image), Strategy::CacheFirst);
        assert_eq!(classifier.classify(&font), Strategy::CacheFirst);
    }

    #[test]
    fn test_cdn_host_is_cache_first_for_any_destination() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("https://cdn.jsdelivr.net/npm/lib.js")
            .with_destination(Destination::Script);
        assert_eq!(classifier.classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_asset_rule_wins_over_navigation() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::navigate("https://fonts.gstatic.com/");
        assert_eq!(classifier.classify(&request), Strategy::CacheFirst);
    }

    #[test]
    fn test_navigation_is_network_first() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::navigate("https://app.fortune.example/tarot");
        assert_eq!(classifier.classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_everything_else_is_stale_while_revalidate() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("https://app.fortune.example/app.js")
            .with_destination(Destination::Script);
        assert_eq!(classifier.classify(&request), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn test_host_match_is_case_insensitive() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("https://ABC.SUPABASE.CO/rest");
        assert_eq!(classifier.classify(&request), Strategy::NetworkFirst);
    }

    #[test]
    fn test_pattern_does_not_match_lookalike_host() {
        let pattern = HostPattern::new("*.supabase.co");
        assert!(pattern.matches("abc.supabase.co"));
        assert!(!pattern.matches("supabase.co.evil.example"));
    }

    #[test]
    fn test_non_get_is_passthrough() {
        let classifier = create_test_classifier();
        let request =
            InterceptedRequest::get("https://abc.supabase.co/rest/v1/dreams").with_method("POST");
        assert_eq!(classifier.classify(&request), Strategy::Passthrough);
    }

    #[test]
    fn test_non_http_scheme_is_passthrough() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("chrome-extension://abcdef/script.js");
        assert_eq!(classifier.classify(&request), Strategy::Passthrough);
    }

    #[test]
    fn test_unparsable_url_is_passthrough() {
        let classifier = create_test_classifier();
        let request = InterceptedRequest::get("not a url");
        assert_eq!(classifier.classify(&request), Strategy::Passthrough);
    }
}
