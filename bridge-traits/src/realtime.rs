//! Realtime Pub/Sub Abstraction
//!
//! Named change-notification channels over the backend's realtime transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Subscription status reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Subscription handshake in flight
    Connecting,
    /// Live and receiving change notifications
    Subscribed,
    /// Cleanly closed by either side
    Closed,
    /// Transport-level failure
    ChannelError,
}

impl ChannelStatus {
    /// Statuses that require the supervisor to schedule a reconnect.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Closed | Self::ChannelError)
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Closed => "closed",
            Self::ChannelError => "channel_error",
        };
        f.write_str(s)
    }
}

/// A row-change notification delivered on a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Source table
    pub table: String,
    /// Raw change payload from the backend
    pub payload: serde_json::Value,
}

/// Realtime transport capability.
#[async_trait]
pub trait RealtimeService: Send + Sync {
    /// Open a channel watching `table`, optionally narrowed by a row filter
    /// expression (e.g. `room_id=eq.42`).
    ///
    /// Opening does not subscribe; the caller drives `subscribe()` so that
    /// reconnection stays under its control.
    async fn open_channel(
        &self,
        name: &str,
        table: &str,
        filter: Option<&str>,
    ) -> Result<Box<dyn RealtimeChannel>>;
}

/// A single named channel.
///
/// `subscribe()` may be called again after a `Closed`/`ChannelError` status
/// to re-establish the same subscription.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Start (or restart) the subscription, returning its status feed.
    async fn subscribe(&self) -> Result<Box<dyn ChannelStatusStream>>;

    /// Stream of row changes for this channel.
    async fn changes(&self) -> Result<Box<dyn ChangeStream>>;

    /// Soft power-save: reduce presence/activity signaling without tearing
    /// down the subscription.
    async fn set_presence_enabled(&self, enabled: bool) -> Result<()>;

    /// Close the subscription.
    async fn unsubscribe(&self) -> Result<()>;
}

/// Stream of subscription status updates.
#[async_trait]
pub trait ChannelStatusStream: Send {
    /// Next status, or `None` when the feed is closed.
    async fn next(&mut self) -> Option<ChannelStatus>;
}

/// Stream of row-change notifications.
#[async_trait]
pub trait ChangeStream: Send {
    /// Next change, or `None` when the channel is gone.
    async fn next(&mut self) -> Option<ChangeEvent>;
}
