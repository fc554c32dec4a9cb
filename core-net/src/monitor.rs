//! # Network Monitor
//!
//! Tracks the device's connectivity and coarse link quality from platform
//! signals. Pure observer: it never performs I/O and never retries anything.
//!
//! ## Overview
//!
//! The monitor consumes the host's [`PlatformEvents`] stream in one spawned
//! task and publishes a [`NetworkState`] snapshot through a `watch` channel.
//! Components read the snapshot synchronously (`is_online()`, `quality()`)
//! or subscribe for transitions (`subscribe()`). Absent platform signals the
//! state stays at its default of `online=true, quality=unknown`, so callers
//! never branch on whether the host can report quality at all.

use bridge_traits::platform::{PlatformEvents, PlatformSignal};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{NetError, Result};

/// Coarse link-quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// The platform cannot report quality
    #[default]
    Unknown,
    /// 2g / slow-2g class link; retries are not worth attempting
    Poor,
    /// Anything better than 2g
    Good,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Poor => "poor",
            Self::Good => "good",
        }
    }

    fn from_effective_type(effective_type: Option<&str>) -> Self {
        match effective_type {
            Some("2g") | Some("slow-2g") => Self::Poor,
            Some(_) => Self::Good,
            None => Self::Unknown,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the current network view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkState {
    pub online: bool,
    pub quality: QualityTier,
}

impl NetworkState {
    /// True when an attempt over this link is pointless.
    pub fn is_unusable(&self) -> bool {
        !self.online || self.quality == QualityTier::Poor
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            online: true,
            quality: QualityTier::Unknown,
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "online={}, quality={}",
            self.online, self.quality
        )
    }
}

/// Connectivity observer shared by the retry, session, and realtime layers.
pub struct NetworkMonitor {
    state_tx: watch::Sender<NetworkState>,
    event_bus: EventBus,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkMonitor {
    /// Creates a monitor at the default `online=true, quality=unknown` state.
    pub fn new(event_bus: EventBus) -> Self {
        let (state_tx, _) = watch::channel(NetworkState::default());
        Self {
            state_tx,
            event_bus,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    /// Starts consuming platform signals.
    ///
    /// # Errors
    ///
    /// Returns `NetError::AlreadyStarted` on a second call, or
    /// `NetError::Subscribe` when the platform stream cannot be opened.
    pub async fn start(&self, platform: Arc<dyn PlatformEvents>) -> Result<()> {
        {
            let guard = self.task.lock().expect("monitor task lock poisoned");
            if guard.is_some() {
                return Err(NetError::AlreadyStarted);
            }
        }

        let mut stream = platform
            .subscribe()
            .await
            .map_err(NetError::Subscribe)?;

        let state_tx = self.state_tx.clone();
        let event_bus = self.event_bus.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            info!("network monitor started");
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = stream.next() => {
                        let Some(signal) = signal else {
                            warn!("platform signal stream closed");
                            break;
                        };
                        apply_signal(&state_tx, &event_bus, signal);
                    }
                }
            }
            debug!("network monitor stopped");
        });

        *self.task.lock().expect("monitor task lock poisoned") = Some(handle);
        Ok(())
    }

    /// Current connectivity flag.
    pub fn is_online(&self) -> bool {
        self.state_tx.borrow().online
    }

    /// Current quality tier.
    pub fn quality(&self) -> QualityTier {
        self.state_tx.borrow().quality
    }

    /// Full state snapshot.
    pub fn state(&self) -> NetworkState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.state_tx.subscribe()
    }

    /// Apply a state update directly, bypassing the signal stream.
    ///
    /// Intended for hosts without a `PlatformEvents` source and for tests.
    pub fn set_state(&self, state: NetworkState) {
        let previous = *self.state_tx.borrow();
        if previous == state {
            return;
        }
        self.state_tx.send_replace(state);
        emit_transitions(&self.event_bus, previous, state);
    }

    /// Stops the signal-consuming task. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.task.lock().expect("monitor task lock poisoned").take() {
            handle.abort();
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn apply_signal(
    state_tx: &watch::Sender<NetworkState>,
    event_bus: &EventBus,
    signal: PlatformSignal,
) {
    let previous = *state_tx.borrow();
    let next = match signal {
        PlatformSignal::Online => NetworkState {
            online: true,
            ..previous
        },
        PlatformSignal::Offline => NetworkState {
            online: false,
            ..previous
        },
        PlatformSignal::ConnectionChanged { effective_type } => NetworkState {
            quality: QualityTier::from_effective_type(effective_type.as_deref()),
            ..previous
        },
        // Focus transitions belong to the session and realtime layers.
        PlatformSignal::FocusGained | PlatformSignal::FocusLost => return,
    };

    if next == previous {
        return;
    }
    debug!(online = next.online, quality = %next.quality, "network state changed");
    state_tx.send_replace(next);
    emit_transitions(event_bus, previous, next);
}

fn emit_transitions(event_bus: &EventBus, previous: NetworkState, next: NetworkState) {
    if previous.online != next.online {
        let event = if next.online {
            NetworkEvent::Online
        } else {
            NetworkEvent::Offline
        };
        let _ = event_bus.emit(CoreEvent::Network(event));
    }
    if previous.quality != next.quality {
        let _ = event_bus.emit(CoreEvent::Network(NetworkEvent::QualityChanged {
            tier: next.quality.as_str().to_string(),
        }));
    }
}
