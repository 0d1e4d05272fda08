//! Named data sets and how long each may be memoized
//!
//! Key names are a contract with the data-access code: invalidation cascades
//! by substring (`"dreams"` hits `dreams_feed`, `hot_dreams` and `my_dreams`),
//! so renaming a key changes which families it belongs to.

use std::fmt;
use std::time::Duration;

/// TTL for public feed listings
pub const FEED_TTL: Duration = Duration::from_secs(60);

/// TTL for hot-ranking listings
pub const RANKING_TTL: Duration = Duration::from_secs(300);

/// TTL for per-user listings
pub const USER_TTL: Duration = Duration::from_secs(30);

/// TTL for the live-activity listing
pub const LIVE_TTL: Duration = Duration::from_secs(60);

/// Logical data sets fetched from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSet {
    DreamsFeed,
    TarotsFeed,
    SajusFeed,
    HotDreams,
    HotTarots,
    HotSajus,
    LiveActivity,
    MyDreams,
    MyTarots,
    MySajus,
}

/// Which policy row a data set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataClass {
    Feed,
    Ranking,
    User,
    Live,
}

impl DataSet {
    /// Every data set, in display order
    pub const ALL: [DataSet; 10] = [
        DataSet::DreamsFeed,
        DataSet::TarotsFeed,
        DataSet::SajusFeed,
        DataSet::HotDreams,
        DataSet::HotTarots,
        DataSet::HotSajus,
        DataSet::LiveActivity,
        DataSet::MyDreams,
        DataSet::MyTarots,
        DataSet::MySajus,
    ];

    /// Cache key under which this data set is memoized
    pub fn key(self) -> &'static str {
        match self {
            DataSet::DreamsFeed => "dreams_feed",
            DataSet::TarotsFeed => "tarots_feed",
            DataSet::SajusFeed => "sajus_feed",
            DataSet::HotDreams => "hot_dreams",
            DataSet::HotTarots => "hot_tarots",
            DataSet::HotSajus => "hot_sajus",
            DataSet::LiveActivity => "live_activity",
            DataSet::MyDreams => "my_dreams",
            DataSet::MyTarots => "my_tarots",
            DataSet::MySajus => "my_sajus",
        }
    }

    pub fn class(self) -> DataClass {
        match self {
            DataSet::DreamsFeed | DataSet::TarotsFeed | DataSet::SajusFeed => DataClass::Feed,
            DataSet::HotDreams | DataSet::HotTarots | DataSet::HotSajus => DataClass::Ranking,
            DataSet::LiveActivity => DataClass::Live,
            DataSet::MyDreams | DataSet::MyTarots | DataSet::MySajus => DataClass::User,
        }
    }

    /// How long a fetched copy stays fresh
    pub fn ttl(self) -> Duration {
        match self.class() {
            DataClass::Feed => FEED_TTL,
            DataClass::Ranking => RANKING_TTL,
            DataClass::User => USER_TTL,
            DataClass::Live => LIVE_TTL,
        }
    }

    /// Backend path, relative to the data API base URL
    pub fn path(self) -> &'static str {
        match self {
            DataSet::DreamsFeed => "feed/dreams",
            DataSet::TarotsFeed => "feed/tarots",
            DataSet::SajusFeed => "feed/sajus",
            DataSet::HotDreams => "ranking/dreams",
            DataSet::HotTarots => "ranking/tarots",
            DataSet::HotSajus => "ranking/sajus",
            DataSet::LiveActivity => "live",
            DataSet::MyDreams => "me/dreams",
            DataSet::MyTarots => "me/tarots",
            DataSet::MySajus => "me/sajus",
        }
    }

    /// Looks a data set up by its cache key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|set| set.key() == key)
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
