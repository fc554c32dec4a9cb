//! Platform Signal Abstraction
//!
//! Raw browser/host signals the resilience layer reacts to: connectivity
//! transitions, connection-quality changes, and window focus.
//!
//! Hosts that cannot report connection quality simply never emit
//! `ConnectionChanged`, which leaves the quality tier at `unknown` — calling
//! code never branches on feature presence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single platform event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformSignal {
    /// Device gained network connectivity
    Online,
    /// Device lost network connectivity
    Offline,
    /// Connection characteristics changed.
    ///
    /// `effective_type` follows the Network Information API vocabulary
    /// (`slow-2g`, `2g`, `3g`, `4g`); `None` when the host cannot tell.
    ConnectionChanged { effective_type: Option<String> },
    /// The application window gained focus
    FocusGained,
    /// The application window lost focus
    FocusLost,
}

/// Platform signal source.
///
/// Each `subscribe()` call yields an independent stream; the session layer
/// and the connection supervisor consume focus signals separately from the
/// network monitor.
#[async_trait]
pub trait PlatformEvents: Send + Sync {
    /// Subscribe to platform signals.
    async fn subscribe(&self) -> Result<Box<dyn PlatformSignalStream>>;
}

/// Stream of platform signals.
#[async_trait]
pub trait PlatformSignalStream: Send {
    /// Next signal, or `None` when the stream is closed.
    async fn next(&mut self) -> Option<PlatformSignal>;
}
