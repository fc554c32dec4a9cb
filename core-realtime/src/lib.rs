//! # Core Realtime
//!
//! Supervision of named realtime subscriptions: per-channel reconnection
//! with backoff and a budget, whole-set teardown/resubscribe on
//! connectivity transitions, and presence power-save on focus loss.

pub mod error;
pub mod supervisor;

pub use error::{RealtimeError, Result};
pub use supervisor::{ChannelHandle, ConnectionSupervisor};
