//! fortune-cache library
//!
//! Caching for the fortune/dream reading client: an in-process TTL cache that
//! memoizes backend queries, and an interception layer that serves every
//! request from a versioned, persistent response store using cache-first,
//! network-first or stale-while-revalidate.

pub mod cache;
pub mod cli;
pub mod config;
pub mod content;
pub mod intercept;
pub mod push;
