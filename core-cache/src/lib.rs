//! # Core Cache
//!
//! Short-lived data caching for the client: a two-tier TTL cache backed by
//! the platform's durable key-value store, plus the content-hash keyed
//! parsed-document lookup built on top of it.

pub mod cache;
pub mod documents;
pub mod error;

pub use cache::{CacheOptions, EphemeralCache, DEFAULT_SWEEP_INTERVAL};
pub use documents::{content_hash, DocumentLookup};
pub use error::{CacheError, Result};
