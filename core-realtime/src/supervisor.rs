//! # Connection Supervisor
//!
//! Keeps a set of named realtime subscriptions alive.
//!
//! ## Overview
//!
//! Each channel gets a watcher task consuming its status feed. `Subscribed`
//! resets that channel's reconnect counter; a disconnect schedules a
//! backed-off resubscribe, and the channel is abandoned once its budget is
//! spent. Failure is isolated per channel: one channel giving up never
//! touches its siblings.
//!
//! Connectivity transitions act on the whole set. Going offline tears every
//! subscription down immediately (there is no network to back off against);
//! coming back online resubscribes every tracked channel unless the link is
//! poor. Focus transitions only toggle presence signaling, never the
//! subscription itself.

use bridge_traits::platform::PlatformSignal;
use bridge_traits::realtime::ChannelStatus;
use bridge_traits::{PlatformEvents, RealtimeChannel, RealtimeService};
use core_net::{backoff_delay, NetworkMonitor, QualityTier, RetryOptions};
use core_runtime::config::CoreConfig;
use core_runtime::events::{ChannelEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tracing::{debug, info, instrument, warn};

use crate::error::{RealtimeError, Result};

/// Caller-facing handle to a supervised channel.
///
/// Equality is by handle identity: repeated `subscribe_to_channel` calls for
/// one name return equal handles.
#[derive(Clone)]
pub struct ChannelHandle {
    name: String,
    id: Uuid,
    channel: Arc<dyn RealtimeChannel>,
}

impl ChannelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The underlying channel, for attaching change consumers.
    pub fn channel(&self) -> &Arc<dyn RealtimeChannel> {
        &self.channel
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChannelHandle {}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

struct ChannelEntry {
    handle: ChannelHandle,
    attempts: u32,
    gave_up: bool,
    watcher: Option<JoinHandle<()>>,
    watcher_cancel: CancellationToken,
}

/// Supervisor of all realtime subscriptions. One instance per process.
pub struct ConnectionSupervisor {
    realtime: Arc<dyn RealtimeService>,
    platform: Option<Arc<dyn PlatformEvents>>,
    monitor: Arc<NetworkMonitor>,
    event_bus: EventBus,
    channels: Arc<Mutex<HashMap<String, ChannelEntry>>>,
    reconnect_options: RetryOptions,
    cancel: CancellationToken,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl ConnectionSupervisor {
    pub fn new(config: &CoreConfig, monitor: Arc<NetworkMonitor>, event_bus: EventBus) -> Self {
        Self {
            realtime: Arc::clone(&config.realtime_service),
            platform: config.platform_events.clone(),
            monitor,
            event_bus,
            channels: Arc::new(Mutex::new(HashMap::new())),
            reconnect_options: RetryOptions {
                max_attempts: config.max_reconnect_attempts,
                initial_delay: config.reconnect_delay,
                max_delay: Duration::from_secs(60),
                timeout: config.retry_timeout,
            },
            cancel: CancellationToken::new(),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Subscribes to a named channel. Idempotent: a name that is already
    /// tracked returns its existing handle unchanged.
    #[instrument(skip(self))]
    pub async fn subscribe_to_channel(
        &self,
        name: &str,
        table: &str,
        filter: Option<&str>,
    ) -> Result<ChannelHandle> {
        if let Some(entry) = self.channels.lock().await.get(name) {
            debug!(channel = name, "returning existing channel handle");
            return Ok(entry.handle.clone());
        }

        let channel: Arc<dyn RealtimeChannel> = Arc::from(
            self.realtime
                .open_channel(name, table, filter)
                .await
                .map_err(|source| RealtimeError::Open {
                    name: name.to_string(),
                    source,
                })?,
        );

        let handle = ChannelHandle {
            name: name.to_string(),
            id: Uuid::new_v4(),
            channel,
        };

        let mut map = self.channels.lock().await;
        // A racing call may have registered the name while the channel was
        // opening; keep the first registration and close the duplicate so
        // the backend is not left holding an orphan subscription.
        if let Some(entry) = map.get(name) {
            let existing = entry.handle.clone();
            drop(map);
            if let Err(e) = handle.channel.unsubscribe().await {
                debug!(channel = name, error = %e, "closing duplicate channel failed");
            }
            return Ok(existing);
        }

        let (watcher_cancel, watcher) = self.spawn_watcher(&handle);
        map.insert(
            name.to_string(),
            ChannelEntry {
                handle: handle.clone(),
                attempts: 0,
                gave_up: false,
                watcher: Some(watcher),
                watcher_cancel,
            },
        );
        info!(channel = name, table, "channel registered");
        Ok(handle)
    }

    fn spawn_watcher(&self, handle: &ChannelHandle) -> (CancellationToken, JoinHandle<()>) {
        let cancel = self.cancel.child_token();
        let watcher = tokio::spawn(run_channel_watcher(
            handle.name.clone(),
            Arc::clone(&handle.channel),
            Arc::clone(&self.channels),
            self.event_bus.clone(),
            self.reconnect_options,
            cancel.clone(),
        ));
        (cancel, watcher)
    }

    /// Starts the connectivity and focus reaction tasks.
    pub async fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let mut states = self.monitor.subscribe();
        let net_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *states.borrow();
                        if !state.online {
                            info!("offline, tearing down all channels");
                            this.teardown_all().await;
                        } else if state.quality != QualityTier::Poor {
                            info!("online, resubscribing tracked channels");
                            this.resubscribe_all().await;
                        }
                    }
                }
            }
        });
        self.tasks.lock().expect("task list lock poisoned").push(net_task);

        if let Some(platform) = &self.platform {
            match platform.subscribe().await {
                Ok(mut signals) => {
                    let this = Arc::clone(self);
                    let cancel = self.cancel.clone();
                    let focus_task = tokio::spawn(async move {
                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                signal = signals.next() => {
                                    match signal {
                                        Some(PlatformSignal::FocusLost) => {
                                            this.set_presence_all(false).await;
                                        }
                                        Some(PlatformSignal::FocusGained) => {
                                            this.set_presence_all(true).await;
                                        }
                                        Some(_) => {}
                                        None => break,
                                    }
                                }
                            }
                        }
                    });
                    self.tasks
                        .lock()
                        .expect("task list lock poisoned")
                        .push(focus_task);
                }
                Err(e) => {
                    warn!(error = %e, "presence power-save disabled, platform signals unavailable");
                }
            }
        }
    }

    /// Unsubscribe every channel, keeping the registrations so they can be
    /// resubscribed when the network returns.
    async fn teardown_all(&self) {
        let mut map = self.channels.lock().await;
        for (name, entry) in map.iter_mut() {
            entry.watcher_cancel.cancel();
            if let Some(watcher) = entry.watcher.take() {
                watcher.abort();
            }
            if let Err(e) = entry.handle.channel.unsubscribe().await {
                debug!(channel = %name, error = %e, "unsubscribe during teardown failed");
            }
        }
    }

    /// Restart the watcher of every torn-down channel that has not given up.
    async fn resubscribe_all(&self) {
        let mut map = self.channels.lock().await;
        for entry in map.values_mut() {
            if entry.gave_up || entry.watcher.is_some() {
                continue;
            }
            let (cancel, watcher) = self.spawn_watcher(&entry.handle);
            entry.watcher_cancel = cancel;
            entry.watcher = Some(watcher);
        }
    }

    /// Soft power-save: toggle presence signaling on every channel without
    /// touching the subscriptions.
    async fn set_presence_all(&self, enabled: bool) {
        let map = self.channels.lock().await;
        for (name, entry) in map.iter() {
            if let Err(e) = entry.handle.channel.set_presence_enabled(enabled).await {
                debug!(channel = %name, error = %e, "presence toggle failed");
            }
        }
    }

    /// Closes one channel and forgets it.
    #[instrument(skip(self))]
    pub async fn unsubscribe_from_channel(&self, name: &str) {
        let entry = self.channels.lock().await.remove(name);
        let Some(mut entry) = entry else {
            return;
        };
        entry.watcher_cancel.cancel();
        if let Some(watcher) = entry.watcher.take() {
            watcher.abort();
        }
        if let Err(e) = entry.handle.channel.unsubscribe().await {
            warn!(channel = name, error = %e, "unsubscribe failed");
        }
        let _ = self.event_bus.emit(CoreEvent::Channel(ChannelEvent::Closed {
            name: name.to_string(),
        }));
    }

    /// Global teardown: cancels every pending reconnect timer, closes every
    /// channel, and stops the reaction tasks. Idempotent.
    pub async fn cleanup(&self) {
        self.cancel.cancel();
        for handle in self.tasks.lock().expect("task list lock poisoned").drain(..) {
            handle.abort();
        }

        let mut map = self.channels.lock().await;
        for (name, entry) in map.drain() {
            if let Some(watcher) = entry.watcher {
                watcher.abort();
            }
            if let Err(e) = entry.handle.channel.unsubscribe().await {
                debug!(channel = %name, error = %e, "unsubscribe during cleanup failed");
            }
            let _ = self
                .event_bus
                .emit(CoreEvent::Channel(ChannelEvent::Closed { name }));
        }
        info!("connection supervisor cleaned up");
    }

    /// Number of tracked channels, including torn-down and abandoned ones.
    pub async fn channel_count(&self) -> usize {
        self.channels.lock().await.len()
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Per-channel watcher: drives `subscribe()` and reacts to its status feed.
async fn run_channel_watcher(
    name: String,
    channel: Arc<dyn RealtimeChannel>,
    channels: Arc<Mutex<HashMap<String, ChannelEntry>>>,
    event_bus: EventBus,
    options: RetryOptions,
    cancel: CancellationToken,
) {
    'resubscribe: loop {
        if cancel.is_cancelled() {
            return;
        }

        let mut statuses = match channel.subscribe().await {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(channel = %name, error = %e, "subscribe failed");
                if schedule_reconnect(&name, &channels, &event_bus, &options, &cancel).await {
                    continue 'resubscribe;
                }
                return;
            }
        };

        loop {
            let status = tokio::select! {
                _ = cancel.cancelled() => return,
                status = statuses.next() => status,
            };

            let Some(status) = status else {
                // Feed ended without a terminal status; treat as a disconnect.
                if schedule_reconnect(&name, &channels, &event_bus, &options, &cancel).await {
                    continue 'resubscribe;
                }
                return;
            };

            match status {
                ChannelStatus::Connecting => {}
                ChannelStatus::Subscribed => {
                    if let Some(entry) = channels.lock().await.get_mut(&name) {
                        entry.attempts = 0;
                    }
                    debug!(channel = %name, "subscribed");
                    let _ = event_bus.emit(CoreEvent::Channel(ChannelEvent::Subscribed {
                        name: name.clone(),
                    }));
                }
                ChannelStatus::Closed | ChannelStatus::ChannelError => {
                    warn!(channel = %name, %status, "channel disconnected");
                    if schedule_reconnect(&name, &channels, &event_bus, &options, &cancel).await {
                        continue 'resubscribe;
                    }
                    return;
                }
            }
        }
    }
}

/// Books a reconnect attempt and waits out its backoff.
///
/// Returns false when the channel's budget is spent (emits `GaveUp`), when
/// the channel was unregistered meanwhile, or when cancelled mid-wait. The
/// attempt counter only resets on a confirmed `Subscribed`.
async fn schedule_reconnect(
    name: &str,
    channels: &Arc<Mutex<HashMap<String, ChannelEntry>>>,
    event_bus: &EventBus,
    options: &RetryOptions,
    cancel: &CancellationToken,
) -> bool {
    let attempt = {
        let mut map = channels.lock().await;
        let Some(entry) = map.get_mut(name) else {
            return false;
        };
        if entry.attempts >= options.max_attempts {
            entry.gave_up = true;
            warn!(
                channel = name,
                attempts = entry.attempts,
                "reconnect budget exhausted, abandoning channel"
            );
            let _ = event_bus.emit(CoreEvent::Channel(ChannelEvent::GaveUp {
                name: name.to_string(),
                attempts: entry.attempts,
            }));
            return false;
        }
        entry.attempts += 1;
        entry.attempts
    };

    let delay = backoff_delay(options, attempt);
    debug!(
        channel = name,
        attempt,
        delay_ms = delay.as_millis() as u64,
        "reconnect scheduled"
    );
    let _ = event_bus.emit(CoreEvent::Channel(ChannelEvent::Reconnecting {
        name: name.to_string(),
        attempt,
        delay_ms: delay.as_millis() as u64,
    }));

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
