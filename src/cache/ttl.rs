//! In-process TTL cache for memoizing backend query results
//!
//! Entries carry an absolute expiry timestamp and are purged lazily: an expired
//! entry stays in the map until a `get` touches it, an invalidation removes it,
//! or the cache is cleared. There is no background sweeper.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// TTL applied by [`TtlCache::set_default`] unless overridden
pub const DEFAULT_TTL: Duration = Duration::from_millis(60_000);

/// Source of the current time for expiry checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc::now`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock
///
/// Clones share the same instant, so a test can hand one clone to the cache
/// and keep another to move time forward.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = expiry_after(*now, by);
    }

    /// Sets the clock to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A single cached value with its expiry
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Read-only snapshot of the cache contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of stored entries, including expired ones not yet purged
    pub size: usize,
    /// Stored keys in sorted order
    pub keys: Vec<String>,
}

/// Expiring key/value store
///
/// Keys are opaque strings; writes to an existing key overwrite it. The cache
/// is an owned value: whoever needs memoization is handed an instance rather
/// than reaching for a global.
pub struct TtlCache<V> {
    entries: HashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    /// Creates an empty cache on the system clock with [`DEFAULT_TTL`]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty cache reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            clock,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Overrides the TTL used by [`TtlCache::set_default`]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// The TTL applied when none is given
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the value for `key` if it has not expired
    ///
    /// An expired entry is removed as a side effect. Missing and expired keys
    /// are indistinguishable to the caller.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry.value.clone());
        }
        self.entries.remove(key);
        None
    }

    /// Stores `value` under `key` for `ttl`, replacing any previous entry
    ///
    /// # Arguments
    /// * `key` - Cache key (e.g., "tarots_feed")
    /// * `value` - The value to memoize
    /// * `ttl` - How long the entry stays visible; `Duration::ZERO` stores an
    ///   entry no `get` will ever return
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = expiry_after(self.clock.now(), ttl);
        self.entries
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Stores `value` under `key` with the default TTL
    pub fn set_default(&mut self, key: impl Into<String>, value: V) {
        let ttl = self.default_ttl;
        self.set(key, value, ttl);
    }

    /// Removes `key`; absent keys are ignored
    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Removes every key containing `pattern` as a literal substring
    ///
    /// # Arguments
    /// * `pattern` - Substring to match; no wildcard or regex syntax
    ///
    /// # Returns
    /// The number of entries dropped
    pub fn invalidate_by_pattern(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        before - self.entries.len()
    }

    /// Drops every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reports the stored keys without purging anything
    pub fn stats(&self) -> CacheStats {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
        }
    }
}

/// `now + ttl`, saturating at the largest representable instant
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_cache() -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap());
        let cache = TtlCache::with_clock(Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_get_returns_value_before_expiry() {
        let (mut cache, clock) = create_test_cache();
        cache.set("dreams_feed", "payload".to_string(), Duration::from_millis(1_000));

        clock.advance(Duration::from_millis(999));

        assert_eq!(cache.get("dreams_feed"), Some("payload".to_string()));
    }

    #[test]
    fn test_get_returns_none_at_expiry_and_purges() {
        let (mut cache, clock) = create_test_cache();
        cache.set("dreams_feed", "payload".to_string(), Duration::from_millis(1_000));

        clock.advance(Duration::from_millis(1_000));

        assert_eq!(cache.get("dreams_feed"), None);
        assert_eq!(cache.stats().size, 0, "Expired entry should be purged on read");
    }

    #[test]
    fn test_zero_ttl_is_never_observable() {
        let (mut cache, _clock) = create_test_cache();
        cache.set("live_activity", "x".to_string(), Duration::ZERO);

        assert_eq!(cache.get("live_activity"), None);
    }

    #[test]
    fn test_get_missing_key_returns_none() {
        let (mut cache, _clock) = create_test_cache();
        assert_eq!(cache.get("never_set"), None);
    }

    #[test]
    fn test_set_overwrites_value_and_expiry() {
        let (mut cache, clock) = create_test_cache();
        cache.set("hot_tarots", "old".to_string(), Duration::from_millis(100));
        cache.set("hot_tarots", "new".to_string(), Duration::from_millis(10_000));

        clock.advance(Duration::from_millis(5_000));

        assert_eq!(cache.get("hot_tarots"), Some("new".to_string()));
    }

    #[test]
    fn test_set_default_uses_default_ttl() {
        let (cache, clock) = create_test_cache();
        let mut cache = cache.with_default_ttl(Duration::from_secs(30));
        cache.set_default("my_sajus", "mine".to_string());

        clock.advance(Duration::from_secs(29));
        assert!(cache.get("my_sajus").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("my_sajus").is_none());
    }

    #[test]
    fn test_default_ttl_is_sixty_seconds() {
        let cache: TtlCache<String> = TtlCache::new();
        assert_eq!(cache.default_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let (mut cache, _clock) = create_test_cache();
        cache.set("tarots_feed", "t".to_string(), Duration::from_secs(60));

        cache.invalidate("tarots_feed");
        cache.invalidate("tarots_feed");
        cache.invalidate("missing");

        assert!(cache.get("tarots_feed").is_none());
    }

    #[test]
    fn test_invalidate_by_pattern_removes_only_matching_keys() {
        let (mut cache, _clock) = create_test_cache();
        for key in ["dreams_feed", "my_dreams", "hot_dreams"] {
            cache.set(key, key.to_string(), Duration::from_secs(60));
        }

        let removed = cache.invalidate_by_pattern("my");

        assert_eq!(removed, 1);
        assert_eq!(
            cache.stats().keys,
            vec!["dreams_feed".to_string(), "hot_dreams".to_string()]
        );
    }

    #[test]
    fn test_invalidate_by_pattern_is_substring_not_prefix() {
        let (mut cache, _clock) = create_test_cache();
        for key in ["dreams_feed", "my_dreams", "hot_dreams", "tarots_feed"] {
            cache.set(key, key.to_string(), Duration::from_secs(60));
        }

        cache.invalidate_by_pattern("dreams");

        assert_eq!(cache.stats().keys, vec!["tarots_feed".to_string()]);
    }

    #[test]
    fn test_invalidate_by_pattern_treats_pattern_literally() {
        let (mut cache, _clock) = create_test_cache();
        cache.set("my_dreams", "a".to_string(), Duration::from_secs(60));
        cache.set("my.dreams", "b".to_string(), Duration::from_secs(60));

        cache.invalidate_by_pattern(".");

        assert_eq!(cache.stats().keys, vec!["my_dreams".to_string()]);
    }

    #[test]
    fn test_clear_empties_cache() {
        let (mut cache, _clock) = create_test_cache();
        cache.set("a", "1".to_string(), Duration::from_secs(60));
        cache.set("b", "2".to_string(), Duration::from_secs(60));

        cache.clear();

        assert_eq!(cache.stats().size, 0);
        assert!(cache.stats().keys.is_empty());
    }

    #[test]
    fn test_stats_does_not_purge_expired_entries() {
        let (mut cache, clock) = create_test_cache();
        cache.set("hot_dreams", "h".to_string(), Duration::from_millis(10));
        clock.advance(Duration::from_millis(20));

        let stats = cache.stats();

        assert_eq!(stats.size, 1);
        assert_eq!(stats.keys, vec!["hot_dreams".to_string()]);
        assert_eq!(cache.stats(), stats, "stats must not mutate state");
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_overflowing() {
        let (mut cache, clock) = create_test_cache();
        cache.set("forever", "f".to_string(), Duration::from_secs(u64::MAX));

        clock.advance(Duration::from_secs(86_400 * 365));

        assert!(cache.get("forever").is_some());
    }
}
