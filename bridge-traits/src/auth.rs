//! Authentication Service Abstraction
//!
//! Provides access to the backend authentication session and its change feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A raw authentication session as reported by the backend.
///
/// This is only the token half of a usable session; the session lifecycle
/// layer pairs it with an active profile before reporting validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Backend user identifier
    pub user_id: String,
    /// Bearer token for authenticated calls. Never log this value.
    pub access_token: String,
    /// Token expiry, when the backend reports one
    pub expires_at: Option<DateTime<Utc>>,
}

/// Auth state transitions pushed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthChange {
    /// A fresh sign-in completed
    SignedIn,
    /// The user signed out
    SignedOut,
    /// The access token was rotated
    TokenRefreshed,
    /// The account was deleted server-side
    UserDeleted,
}

/// Backend authentication capability.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::auth::AuthService;
///
/// async fn has_token(auth: &dyn AuthService) -> bool {
///     matches!(auth.get_session().await, Ok(Some(_)))
/// }
/// ```
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Get the current session, or `None` when signed out.
    async fn get_session(&self) -> Result<Option<AuthSession>>;

    /// Terminate the backend session.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to auth state changes.
    ///
    /// Returns a pull-based stream; implementations should emit an event for
    /// every transition. Dropping the stream unsubscribes.
    async fn subscribe_changes(&self) -> Result<Box<dyn AuthChangeStream>>;
}

/// Stream of auth state changes.
#[async_trait]
pub trait AuthChangeStream: Send {
    /// Get the next auth change.
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<AuthChange>;
}
