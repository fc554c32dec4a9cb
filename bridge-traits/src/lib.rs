//! # Host Bridge Traits
//!
//! Backend and platform abstraction traits the chat client core consumes.
//!
//! ## Overview
//!
//! This crate defines the contract between the resilience core and whatever
//! backs it: a managed backend (auth, tables, realtime) and the host platform
//! (durable storage, connectivity/focus signals). Each trait is a capability
//! the core requires but never implements itself.
//!
//! ## Traits
//!
//! ### Backend capabilities
//! - [`AuthService`](auth::AuthService) - Session fetch, sign-out, auth change feed
//! - [`ProfileStore`](data::ProfileStore) - `profiles` point lookups and last-active mirror
//! - [`DocumentStore`](data::DocumentStore) - Parsed-document cache records by content hash
//! - [`RealtimeService`](realtime::RealtimeService) - Named change-notification channels
//!
//! ### Platform capabilities
//! - [`LocalStore`](storage::LocalStore) - Durable key-value storage
//! - [`PlatformEvents`](platform::PlatformEvents) - Online/offline, quality, focus signals
//!
//! ## Error Handling
//!
//! All traits use [`BridgeError`](error::BridgeError). The retry layer relies
//! on its classification methods: `is_transient()` selects the failures worth
//! retrying, `is_session_expired()` the ones that force the sign-out path.
//! Implementations should map backend errors onto the closest variant and
//! keep messages actionable.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; change streams require `Send`. Streams
//! are pull-based (`next() -> Option<_>`) so teardown is deterministic:
//! dropping the stream is the unsubscribe.

pub mod auth;
pub mod data;
pub mod error;
pub mod platform;
pub mod realtime;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use auth::{AuthChange, AuthChangeStream, AuthService, AuthSession};
pub use data::{DocumentRecord, DocumentStore, ProfileRecord, ProfileStore, UserRole};
pub use platform::{PlatformEvents, PlatformSignal, PlatformSignalStream};
pub use realtime::{
    ChangeEvent, ChangeStream, ChannelStatus, ChannelStatusStream, RealtimeChannel,
    RealtimeService,
};
pub use storage::LocalStore;
