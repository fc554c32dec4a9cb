//! # Core Session
//!
//! Session lifecycle ownership: the state machine pairing a live auth token
//! with an active profile, its single-flight validation, and the event
//! reactions (auth changes, window focus) that keep it honest.

pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::{
    SessionLifecycleManager, KEY_AUTH_TOKEN, KEY_LAST_ACTIVE, KEY_USER_PREFERENCES, KEY_USER_ROLE,
};
pub use types::{Session, SessionState};
