//! Network interception layer
//!
//! Every outgoing request is classified ([`Classifier`]) and served by one of
//! the strategies in [`StrategyEngine`] against a persistent, versioned
//! [`ResponseStore`]. [`LifecycleManager`] owns the store's generations:
//! precaching on install and deleting superseded versions on activation.
//!
//! The engine only sees the network and the store through the [`Fetcher`] and
//! [`ResponseStore`] traits, so both can be swapped for in-memory doubles.

mod classify;
mod disk;
mod fetch;
mod lifecycle;
mod request;
mod store;
mod strategy;

pub use classify::{Classifier, HostPattern, Strategy};
pub use disk::DiskStore;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use lifecycle::{
    GenerationNames, InstallReport, LifecycleError, LifecycleManager, LifecycleState,
    DEFAULT_PRECACHE,
};
pub use request::{Destination, InterceptedRequest, RequestIdentity, StoredResponse, OFFLINE_HEADER};
pub use store::{MemoryStore, ResponseStore, StoreError};
pub use strategy::StrategyEngine;
