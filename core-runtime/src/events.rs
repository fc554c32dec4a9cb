//! # Event Bus System
//!
//! Event-driven communication between the resilience components and the UI
//! boundary, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Every state transition the UI cares about flows through one typed bus:
//!
//! - **Session events**: validation outcomes, sign-out, redirect-to-login
//! - **Network events**: online/offline transitions, quality tier changes
//! - **Channel events**: subscription status, reconnect scheduling, give-up
//!
//! Multiple subscribers listen independently; slow subscribers receive
//! `RecvError::Lagged` and can keep going. Events are serde-serializable so
//! hosts can forward them across an FFI or message boundary.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, NetworkEvent};
//!
//! let bus = EventBus::new(100);
//! let mut sub = bus.subscribe();
//! bus.emit(CoreEvent::Network(NetworkEvent::Offline)).ok();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle events
    Session(SessionEvent),
    /// Connectivity events
    Network(NetworkEvent),
    /// Realtime channel events
    Channel(ChannelEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Network(e) => e.description(),
            CoreEvent::Channel(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::ValidationFailed { .. }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::RedirectToLogin { .. }) => EventSeverity::Warning,
            CoreEvent::Channel(ChannelEvent::GaveUp { .. }) => EventSeverity::Error,
            CoreEvent::Network(NetworkEvent::Offline) => EventSeverity::Warning,
            CoreEvent::Session(SessionEvent::Validated { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events emitted by the session lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A validation pass confirmed token + active profile.
    Validated {
        user_id: String,
        /// Role string as stored in the profile row.
        role: String,
    },
    /// The session ended (explicit sign-out, deletion, or revalidation
    /// exhaustion) and local state was purged.
    SignedOut {
        /// What triggered the sign-out (e.g. "user", "deleted", "revalidation").
        reason: String,
    },
    /// The UI boundary must navigate to the login surface.
    RedirectToLogin { reason: String },
    /// A validation pass failed.
    ValidationFailed {
        /// Human-readable, user-presentable message.
        message: String,
        /// Whether a retry may still succeed.
        recoverable: bool,
    },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Validated { .. } => "Session validated",
            SessionEvent::SignedOut { .. } => "Session ended",
            SessionEvent::RedirectToLogin { .. } => "Redirect to login requested",
            SessionEvent::ValidationFailed { .. } => "Session validation failed",
        }
    }
}

/// Events emitted by the network monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NetworkEvent {
    /// Connectivity restored
    Online,
    /// Connectivity lost
    Offline,
    /// Quality tier changed (values: "unknown", "poor", "good")
    QualityChanged { tier: String },
}

impl NetworkEvent {
    fn description(&self) -> &str {
        match self {
            NetworkEvent::Online => "Network online",
            NetworkEvent::Offline => "Network offline",
            NetworkEvent::QualityChanged { .. } => "Network quality changed",
        }
    }
}

/// Events emitted by the connection supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ChannelEvent {
    /// Channel reached `Subscribed`; its reconnect counter was reset.
    Subscribed { name: String },
    /// A reconnect was scheduled after a disconnect.
    Reconnecting {
        name: String,
        /// Attempt number being scheduled (1-based).
        attempt: u32,
        delay_ms: u64,
    },
    /// The channel exhausted its reconnect budget. Terminal for this
    /// channel; siblings are unaffected.
    GaveUp { name: String, attempts: u32 },
    /// The channel was closed by explicit unsubscribe or cleanup.
    Closed { name: String },
}

impl ChannelEvent {
    fn description(&self) -> &str {
        match self {
            ChannelEvent::Subscribed { .. } => "Channel subscribed",
            ChannelEvent::Reconnecting { .. } => "Channel reconnect scheduled",
            ChannelEvent::GaveUp { .. } => "Channel reconnect budget exhausted",
            ChannelEvent::Closed { .. } => "Channel closed",
        }
    }
}

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), multiple consumers (each `subscribe()` is independent), lagging
/// detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none. Emitters treat that error as non-fatal.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Network(NetworkEvent::Offline);
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Session(SessionEvent::Validated {
            user_id: "user-1".to_string(),
            role: "admin".to_string(),
        });
        bus.emit(event.clone()).ok();

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            let event = CoreEvent::Channel(ChannelEvent::Reconnecting {
                name: "messages".to_string(),
                attempt: i,
                delay_ms: 1000,
            });
            bus.emit(event).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[tokio::test]
    async fn test_event_severity() {
        let err = CoreEvent::Session(SessionEvent::ValidationFailed {
            message: "profile inactive".to_string(),
            recoverable: false,
        });
        assert_eq!(err.severity(), EventSeverity::Error);

        let warn = CoreEvent::Network(NetworkEvent::Offline);
        assert_eq!(warn.severity(), EventSeverity::Warning);

        let debug = CoreEvent::Channel(ChannelEvent::Closed {
            name: "messages".to_string(),
        });
        assert_eq!(debug.severity(), EventSeverity::Debug);
    }

    #[tokio::test]
    async fn test_event_serialization() {
        let event = CoreEvent::Channel(ChannelEvent::Reconnecting {
            name: "rooms".to_string(),
            attempt: 2,
            delay_ms: 4000,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("rooms"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Session(SessionEvent::RedirectToLogin {
            reason: "signed_out".to_string(),
        });
        assert_eq!(event.description(), "Redirect to login requested");
    }
}
