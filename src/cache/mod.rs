//! In-process memoization of backend query results
//!
//! [`TtlCache`] is a volatile expiring key/value store; [`DataSet`] names the
//! backend listings the client memoizes and carries their TTL policy. Nothing
//! here knows about HTTP interception, which lives in [`crate::intercept`].

mod policy;
mod ttl;

pub use policy::{DataClass, DataSet, FEED_TTL, LIVE_TTL, RANKING_TTL, USER_TTL};
pub use ttl::{CacheStats, Clock, ManualClock, SystemClock, TtlCache, DEFAULT_TTL};
