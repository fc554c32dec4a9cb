//! # Session Lifecycle Manager
//!
//! Owns session validity for the whole client.
//!
//! ## Overview
//!
//! A session is only reported valid when one validation pass confirmed both
//! a live auth token and an active profile row. Validation runs through the
//! shared [`RetryExecutor`] so flaky lookups are absorbed before they reach
//! state transitions.
//!
//! Concurrent `initialize()` callers share one in-flight validation; the
//! leader broadcasts the outcome to everyone who joined while it ran.
//!
//! Any unrecoverable failure takes the destructive-but-safe path: purge
//! every persisted session key, transition away from `Valid`, and ask the
//! UI boundary to show the login surface. A half-valid session is never
//! observable.

use bridge_traits::platform::PlatformSignal;
use bridge_traits::{AuthChange, AuthService, LocalStore, PlatformEvents, ProfileStore};
use chrono::Utc;
use core_net::{backoff_delay, NetworkMonitor, RetryContext, RetryExecutor, RetryOptions};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::types::{Session, SessionState};

/// Persisted session keys, cleared together on any invalidation.
pub const KEY_AUTH_TOKEN: &str = "auth.token";
pub const KEY_USER_ROLE: &str = "auth.role";
pub const KEY_USER_PREFERENCES: &str = "user.preferences";
pub const KEY_LAST_ACTIVE: &str = "auth.last_active";

const PERSISTED_KEYS: [&str; 4] = [
    KEY_AUTH_TOKEN,
    KEY_USER_ROLE,
    KEY_USER_PREFERENCES,
    KEY_LAST_ACTIVE,
];

type ValidationOutcome = Result<Session>;

/// Session validity state machine. One instance per process.
pub struct SessionLifecycleManager {
    auth: Arc<dyn AuthService>,
    profiles: Arc<dyn ProfileStore>,
    store: Arc<dyn LocalStore>,
    platform: Option<Arc<dyn PlatformEvents>>,
    monitor: Arc<NetworkMonitor>,
    retry: RetryExecutor,
    event_bus: EventBus,

    state: RwLock<SessionState>,
    session: RwLock<Option<Session>>,
    in_flight: Mutex<Option<broadcast::Sender<ValidationOutcome>>>,

    init_timeout: Duration,
    focus_debounce: Duration,
    revalidate_options: RetryOptions,

    cancel: CancellationToken,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl SessionLifecycleManager {
    pub fn new(
        config: &CoreConfig,
        monitor: Arc<NetworkMonitor>,
        retry: RetryExecutor,
        event_bus: EventBus,
    ) -> Self {
        Self {
            auth: Arc::clone(&config.auth_service),
            profiles: Arc::clone(&config.profile_store),
            store: Arc::clone(&config.local_store),
            platform: config.platform_events.clone(),
            monitor,
            retry,
            event_bus,
            state: RwLock::new(SessionState::Uninitialized),
            session: RwLock::new(None),
            in_flight: Mutex::new(None),
            init_timeout: config.session_init_timeout,
            focus_debounce: config.focus_debounce,
            revalidate_options: RetryOptions {
                max_attempts: config.revalidate_max_attempts,
                initial_delay: config.revalidate_base_delay,
                max_delay: Duration::from_secs(60),
                timeout: config.retry_timeout,
            },
            cancel: CancellationToken::new(),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Current validated session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn is_valid(&self) -> bool {
        self.state().await.is_valid()
    }

    /// Validates the session, sharing one in-flight pass among concurrent
    /// callers.
    ///
    /// Returns the existing session immediately when already `Valid`. A
    /// timeout or validation failure moves the state to `Error`, purges
    /// every persisted session key, and surfaces the failure.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<Session> {
        if self.state().await.is_valid() {
            if let Some(session) = self.session().await {
                return Ok(session);
            }
        }

        // Join an in-flight validation instead of starting a second one.
        if let Some(mut rx) = self.join_in_flight().await {
            debug!("joining in-flight session validation");
            return Self::await_in_flight(&mut rx).await;
        }

        *self.state.write().await = SessionState::Initializing;

        let outcome = match timeout(self.init_timeout, self.validation_pass()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::Timeout),
        };

        match &outcome {
            Ok(session) => {
                *self.session.write().await = Some(session.clone());
                *self.state.write().await = SessionState::Valid;
                info!(user_id = %session.user_id, role = %session.role, "session validated");
                let _ = self.event_bus.emit(CoreEvent::Session(SessionEvent::Validated {
                    user_id: session.user_id.clone(),
                    role: session.role.as_str().to_string(),
                }));
            }
            Err(err) => {
                warn!(error = %err, "session initialization failed");
                self.purge_local_state().await;
                *self.session.write().await = None;
                *self.state.write().await = SessionState::Error;
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Session(SessionEvent::ValidationFailed {
                        message: err.user_message().to_string(),
                        recoverable: !err.is_unrecoverable(),
                    }));
            }
        }

        self.finish_in_flight(&outcome).await;
        outcome
    }

    /// Subscribes to an in-flight validation if one exists; otherwise
    /// registers this caller as the leader and returns `None`.
    async fn join_in_flight(&self) -> Option<broadcast::Receiver<ValidationOutcome>> {
        let mut guard = self.in_flight.lock().await;
        match guard.as_ref() {
            Some(tx) => Some(tx.subscribe()),
            None => {
                let (tx, _) = broadcast::channel(1);
                *guard = Some(tx);
                None
            }
        }
    }

    /// Publishes the leader's outcome to every joined caller.
    async fn finish_in_flight(&self, outcome: &ValidationOutcome) {
        if let Some(tx) = self.in_flight.lock().await.take() {
            let _ = tx.send(outcome.clone());
        }
    }

    async fn await_in_flight(rx: &mut broadcast::Receiver<ValidationOutcome>) -> Result<Session> {
        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(SessionError::Retry(
                "in-flight validation was abandoned".to_string(),
            )),
        }
    }

    /// One validation round-trip shared with any concurrent caller.
    ///
    /// Joining callers get the leader's outcome without a second round-trip;
    /// the returned flag is true only for the leader, which owns the state
    /// transition for its outcome.
    async fn shared_validation_pass(&self) -> (Result<Session>, bool) {
        if let Some(mut rx) = self.join_in_flight().await {
            debug!("joining in-flight session validation");
            return (Self::await_in_flight(&mut rx).await, false);
        }
        let outcome = self.validation_pass().await;
        self.finish_in_flight(&outcome).await;
        (outcome, true)
    }

    /// One validation pass: token, then active profile, then the durable
    /// mirror writes.
    async fn validation_pass(&self) -> Result<Session> {
        let auth_session = self
            .retry
            .execute(RetryContext::new("session", "get_session"), |_cancel| async {
                self.auth.get_session().await
            })
            .await
            .map_err(SessionError::from_retry)?
            .ok_or(SessionError::NoSession)?;

        let profile = self
            .retry
            .execute(RetryContext::new("session", "fetch_profile"), |_cancel| async {
                self.profiles.fetch_profile(&auth_session.user_id).await
            })
            .await
            .map_err(SessionError::from_retry)?
            .ok_or_else(|| {
                SessionError::ProfileLookup(format!(
                    "no profile row for user {}",
                    auth_session.user_id
                ))
            })?;

        if !profile.active {
            return Err(SessionError::ProfileInactive);
        }

        let now = Utc::now();

        // Durable mirror of validation output. Never authoritative, so a
        // write failure is logged rather than failing the pass.
        if let Err(e) = self.store.set(KEY_USER_ROLE, profile.role.as_str()).await {
            warn!(error = %e, "failed to persist role");
        }
        if let Err(e) = self.store.set(KEY_LAST_ACTIVE, &now.to_rfc3339()).await {
            warn!(error = %e, "failed to persist last-active timestamp");
        }
        if let Err(e) = self.profiles.record_last_active(&auth_session.user_id, now).await {
            warn!(error = %e, "failed to mirror last-active to backend");
        }

        Ok(Session {
            user_id: auth_session.user_id,
            role: profile.role,
            active: true,
            last_validated: now,
        })
    }

    /// Starts the auth-change and focus reaction tasks.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut changes = self
            .auth
            .subscribe_changes()
            .await
            .map_err(|e| SessionError::Subscribe(e.to_string()))?;

        let this = Arc::clone(self);
        let cancel = self.cancel.clone();
        let auth_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.next() => {
                        let Some(change) = change else {
                            warn!("auth change stream closed");
                            break;
                        };
                        this.handle_auth_change(change).await;
                    }
                }
            }
        });
        self.tasks.lock().expect("task list lock poisoned").push(auth_task);

        if let Some(platform) = &self.platform {
            match platform.subscribe().await {
                Ok(mut signals) => {
                    let this = Arc::clone(self);
                    let cancel = self.cancel.clone();
                    let focus_task = tokio::spawn(async move {
                        let mut last_focus: Option<Instant> = None;
                        loop {
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                signal = signals.next() => {
                                    let Some(signal) = signal else { break };
                                    if signal != PlatformSignal::FocusGained {
                                        continue;
                                    }
                                    let now = Instant::now();
                                    if last_focus
                                        .is_some_and(|at| now < at + this.focus_debounce)
                                    {
                                        continue;
                                    }
                                    last_focus = Some(now);
                                    this.background_revalidate().await;
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
                    warn!(error = %e, "focus revalidation disabled, platform signals unavailable");
                }
            }
        }

        Ok(())
    }

    async fn handle_auth_change(&self, change: AuthChange) {
        debug!(?change, "auth change received");
        match change {
            AuthChange::SignedIn | AuthChange::TokenRefreshed => {
                self.revalidate().await;
            }
            AuthChange::SignedOut => self.invalidate("user").await,
            AuthChange::UserDeleted => self.invalidate("deleted").await,
        }
    }

    /// Re-runs validation without disturbing a `Valid` state unless the
    /// outcome demands it.
    async fn revalidate(&self) {
        let (outcome, led) = self.shared_validation_pass().await;
        if !led {
            // The leading caller owns the state transition.
            return;
        }
        match outcome {
            Ok(session) => {
                *self.session.write().await = Some(session.clone());
                *self.state.write().await = SessionState::Valid;
                let _ = self.event_bus.emit(CoreEvent::Session(SessionEvent::Validated {
                    user_id: session.user_id,
                    role: session.role.as_str().to_string(),
                }));
            }
            Err(err) if err.is_unrecoverable() => {
                warn!(error = %err, "revalidation unrecoverable");
                self.invalidate("revalidation").await;
            }
            Err(err) => {
                warn!(error = %err, "revalidation failed, keeping current state");
                let _ = self
                    .event_bus
                    .emit(CoreEvent::Session(SessionEvent::ValidationFailed {
                        message: err.user_message().to_string(),
                        recoverable: true,
                    }));
            }
        }
    }

    /// Focus-triggered revalidation: skipped on an unusable link, retried
    /// with backoff, and terminal failure ends the session like a sign-out.
    #[instrument(skip(self))]
    async fn background_revalidate(&self) {
        if self.monitor.state().is_unusable() {
            debug!("skipping focus revalidation, link unusable");
            return;
        }

        for attempt in 1..=self.revalidate_options.max_attempts {
            let (outcome, led) = self.shared_validation_pass().await;
            match outcome {
                Ok(session) => {
                    if led {
                        *self.session.write().await = Some(session.clone());
                        *self.state.write().await = SessionState::Valid;
                        let _ = self.event_bus.emit(CoreEvent::Session(SessionEvent::Validated {
                            user_id: session.user_id,
                            role: session.role.as_str().to_string(),
                        }));
                    }
                    return;
                }
                Err(_) if !led => {
                    // The leading caller owns the failure handling.
                    return;
                }
                Err(err) if err.is_unrecoverable() => {
                    warn!(error = %err, attempt, "focus revalidation unrecoverable");
                    self.invalidate("revalidation").await;
                    return;
                }
                Err(err) => {
                    warn!(error = %err, attempt, "focus revalidation attempt failed");
                    if attempt < self.revalidate_options.max_attempts {
                        let delay = backoff_delay(&self.revalidate_options, attempt);
                        tokio::select! {
                            _ = self.cancel.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        warn!("focus revalidation budget exhausted, ending session");
        self.invalidate("revalidation").await;
    }

    /// Explicit sign-out. Local state is purged even when the backend call
    /// fails.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) {
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "backend sign-out failed, purging locally anyway");
        }
        self.invalidate("user").await;
    }

    /// Purge, transition to `Invalid`, and direct the UI to the login
    /// surface.
    async fn invalidate(&self, reason: &str) {
        info!(reason, "session invalidated");
        self.purge_local_state().await;
        *self.session.write().await = None;
        *self.state.write().await = SessionState::Invalid;
        let _ = self.event_bus.emit(CoreEvent::Session(SessionEvent::SignedOut {
            reason: reason.to_string(),
        }));
        let _ = self
            .event_bus
            .emit(CoreEvent::Session(SessionEvent::RedirectToLogin {
                reason: reason.to_string(),
            }));
    }

    async fn purge_local_state(&self) {
        for key in PERSISTED_KEYS {
            if let Err(e) = self.store.delete(key).await {
                warn!(key, error = %e, "failed to purge persisted key");
            }
        }
    }

    /// Stops the reaction tasks. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        for handle in self.tasks.lock().expect("task list lock poisoned").drain(..) {
            handle.abort();
        }
    }
}

impl Drop for SessionLifecycleManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::auth::{AuthChangeStream, AuthSession};
    use bridge_traits::data::{ProfileRecord, UserRole};
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::realtime::RealtimeChannel;
    use bridge_traits::{BridgeError, RealtimeService};
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    struct MockAuth {
        session: Option<AuthSession>,
        get_session_calls: AtomicU32,
        get_session_delay: Duration,
        changes_rx: StdMutex<Option<mpsc::UnboundedReceiver<AuthChange>>>,
    }

    impl MockAuth {
        fn signed_in(user_id: &str) -> (Arc<Self>, mpsc::UnboundedSender<AuthChange>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    session: Some(AuthSession {
                        user_id: user_id.to_string(),
                        access_token: "token".to_string(),
                        expires_at: None,
                    }),
                    get_session_calls: AtomicU32::new(0),
                    get_session_delay: Duration::from_millis(10),
                    changes_rx: StdMutex::new(Some(rx)),
                }),
                tx,
            )
        }

        fn signed_out() -> Arc<Self> {
            let (_tx, rx) = mpsc::unbounded_channel();
            Arc::new(Self {
                session: None,
                get_session_calls: AtomicU32::new(0),
                get_session_delay: Duration::ZERO,
                changes_rx: StdMutex::new(Some(rx)),
            })
        }
    }

    struct MockChangeStream {
        rx: mpsc::UnboundedReceiver<AuthChange>,
    }

    #[async_trait]
    impl AuthChangeStream for MockChangeStream {
        async fn next(&mut self) -> Option<AuthChange> {
            self.rx.recv().await
        }
    }

    #[async_trait]
    impl AuthService for MockAuth {
        async fn get_session(&self) -> BridgeResult<Option<AuthSession>> {
            self.get_session_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.get_session_delay).await;
            Ok(self.session.clone())
        }

        async fn sign_out(&self) -> BridgeResult<()> {
            Ok(())
        }

        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn AuthChangeStream>> {
            let rx = self
                .changes_rx
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| BridgeError::OperationFailed("already subscribed".into()))?;
            Ok(Box::new(MockChangeStream { rx }))
        }
    }

    struct MockProfiles {
        profile: Option<ProfileRecord>,
    }

    #[async_trait]
    impl ProfileStore for MockProfiles {
        async fn fetch_profile(&self, _user_id: &str) -> BridgeResult<Option<ProfileRecord>> {
            Ok(self.profile.clone())
        }

        async fn record_last_active(
            &self,
            _user_id: &str,
            _at: DateTime<Utc>,
        ) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockStore {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl LocalStore for MockStore {
        async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
        async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }
        async fn delete(&self, key: &str) -> BridgeResult<()> {
            self.entries.lock().await.remove(key);
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(self.entries.lock().await.keys().cloned().collect())
        }
        async fn clear(&self) -> BridgeResult<()> {
            self.entries.lock().await.clear();
            Ok(())
        }
    }

    struct StubRealtime;

    #[async_trait]
    impl RealtimeService for StubRealtime {
        async fn open_channel(
            &self,
            _name: &str,
            _table: &str,
            _filter: Option<&str>,
        ) -> BridgeResult<Box<dyn RealtimeChannel>> {
            Err(BridgeError::NotAvailable("stub".into()))
        }
    }

    fn active_profile(user_id: &str) -> ProfileRecord {
        ProfileRecord {
            id: user_id.to_string(),
            active: true,
            role: UserRole::Admin,
        }
    }

    fn manager(
        auth: Arc<dyn AuthService>,
        profile: Option<ProfileRecord>,
        store: Arc<MockStore>,
        init_timeout: Duration,
    ) -> (Arc<SessionLifecycleManager>, EventBus) {
        let config = CoreConfig::builder()
            .auth_service(auth)
            .profile_store(Arc::new(MockProfiles { profile }))
            .realtime_service(Arc::new(StubRealtime))
            .local_store(store)
            .session_init_timeout(init_timeout)
            .build()
            .unwrap();

        let bus = EventBus::new(16);
        let monitor = Arc::new(NetworkMonitor::new(bus.clone()));
        let retry = RetryExecutor::new(monitor.clone(), RetryOptions::default());
        (
            Arc::new(SessionLifecycleManager::new(
                &config,
                monitor,
                retry,
                bus.clone(),
            )),
            bus,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_validates_token_and_profile() {
        let (auth, _tx) = MockAuth::signed_in("user-1");
        let store = Arc::new(MockStore::default());
        let (manager, _) = manager(
            auth,
            Some(active_profile("user-1")),
            store.clone(),
            Duration::from_secs(15),
        );

        let session = manager.initialize().await.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.role, UserRole::Admin);
        assert!(manager.is_valid().await);

        let entries = store.entries.lock().await;
        assert_eq!(entries.get(KEY_USER_ROLE).map(String::as_str), Some("admin"));
        assert!(entries.contains_key(KEY_LAST_ACTIVE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_initialize_shares_one_validation() {
        let (auth, _tx) = MockAuth::signed_in("user-1");
        let store = Arc::new(MockStore::default());
        let (manager, _) = manager(
            auth.clone(),
            Some(active_profile("user-1")),
            store,
            Duration::from_secs(15),
        );

        let mut handles = Vec::new();
        for _ in 0..5 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.initialize().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(auth.get_session_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_change_joins_in_flight_validation() {
        struct OverlapAuth {
            current: AtomicU32,
            max_seen: AtomicU32,
            calls: AtomicU32,
            changes_rx: StdMutex<Option<mpsc::UnboundedReceiver<AuthChange>>>,
        }

        #[async_trait]
        impl AuthService for OverlapAuth {
            async fn get_session(&self) -> BridgeResult<Option<AuthSession>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let concurrent = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(concurrent, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(AuthSession {
                    user_id: "user-1".to_string(),
                    access_token: "token".to_string(),
                    expires_at: None,
                }))
            }
            async fn sign_out(&self) -> BridgeResult<()> {
                Ok(())
            }
            async fn subscribe_changes(&self) -> BridgeResult<Box<dyn AuthChangeStream>> {
                let rx = self
                    .changes_rx
                    .lock()
                    .unwrap()
                    .take()
                    .ok_or_else(|| BridgeError::OperationFailed("already subscribed".into()))?;
                Ok(Box::new(MockChangeStream { rx }))
            }
        }

        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let auth = Arc::new(OverlapAuth {
            current: AtomicU32::new(0),
            max_seen: AtomicU32::new(0),
            calls: AtomicU32::new(0),
            changes_rx: StdMutex::new(Some(changes_rx)),
        });
        let store = Arc::new(MockStore::default());
        let (manager, _) = manager(
            auth.clone(),
            Some(active_profile("user-1")),
            store,
            Duration::from_secs(15),
        );
        manager.start().await.unwrap();

        let init = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.initialize().await })
        };
        // Let the leader enter its round-trip, then race an auth change in.
        tokio::task::yield_now().await;
        changes_tx.send(AuthChange::TokenRefreshed).unwrap();

        assert!(init.await.unwrap().is_ok());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            auth.max_seen.load(Ordering::SeqCst),
            1,
            "validation round-trips overlapped"
        );
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert!(manager.is_valid().await);
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_session_fails_and_purges() {
        let store = Arc::new(MockStore::default());
        store.set(KEY_AUTH_TOKEN, "stale").await.unwrap();
        let (manager, _) = manager(
            MockAuth::signed_out(),
            Some(active_profile("user-1")),
            store.clone(),
            Duration::from_secs(15),
        );

        let result = manager.initialize().await;
        assert!(matches!(result, Err(SessionError::NoSession)));
        assert_eq!(manager.state().await, SessionState::Error);
        assert!(store.entries.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_profile_is_never_valid() {
        let (auth, _tx) = MockAuth::signed_in("user-1");
        let store = Arc::new(MockStore::default());
        let (manager, _) = manager(
            auth,
            Some(ProfileRecord {
                id: "user-1".to_string(),
                active: false,
                role: UserRole::User,
            }),
            store,
            Duration::from_secs(15),
        );

        let result = manager.initialize().await;
        assert!(matches!(result, Err(SessionError::ProfileInactive)));
        assert_eq!(manager.state().await, SessionState::Error);
        assert!(!manager.is_valid().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_timeout_moves_to_error() {
        struct HangingAuth;

        #[async_trait]
        impl AuthService for HangingAuth {
            async fn get_session(&self) -> BridgeResult<Option<AuthSession>> {
                std::future::pending().await
            }
            async fn sign_out(&self) -> BridgeResult<()> {
                Ok(())
            }
            async fn subscribe_changes(&self) -> BridgeResult<Box<dyn AuthChangeStream>> {
                Err(BridgeError::NotAvailable("none".into()))
            }
        }

        let store = Arc::new(MockStore::default());
        store.set(KEY_USER_ROLE, "admin").await.unwrap();
        let (manager, _) = manager(
            Arc::new(HangingAuth),
            Some(active_profile("user-1")),
            store.clone(),
            Duration::from_millis(100),
        );

        let result = manager.initialize().await;
        assert!(matches!(result, Err(SessionError::Timeout)));
        assert_eq!(manager.state().await, SessionState::Error);
        assert!(store.entries.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_signed_out_purges_all_keys_and_redirects() {
        let (auth, changes_tx) = MockAuth::signed_in("user-1");
        let store = Arc::new(MockStore::default());
        for key in PERSISTED_KEYS {
            store.set(key, "value").await.unwrap();
        }
        let (manager, bus) = manager(
            auth,
            Some(active_profile("user-1")),
            store.clone(),
            Duration::from_secs(15),
        );
        let mut events = bus.subscribe();

        manager.initialize().await.unwrap();
        manager.start().await.unwrap();

        changes_tx.send(AuthChange::SignedOut).unwrap();
        // Drain until the redirect shows up.
        loop {
            match events.recv().await.unwrap() {
                CoreEvent::Session(SessionEvent::RedirectToLogin { reason }) => {
                    assert_eq!(reason, "user");
                    break;
                }
                _ => continue,
            }
        }

        assert_eq!(manager.state().await, SessionState::Invalid);
        for key in PERSISTED_KEYS {
            assert!(store.get(key).await.unwrap().is_none(), "{key} not purged");
        }
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_deleted_invalidates() {
        let (auth, changes_tx) = MockAuth::signed_in("user-1");
        let store = Arc::new(MockStore::default());
        let (manager, bus) = manager(
            auth,
            Some(active_profile("user-1")),
            store,
            Duration::from_secs(15),
        );
        let mut events = bus.subscribe();

        manager.initialize().await.unwrap();
        manager.start().await.unwrap();
        changes_tx.send(AuthChange::UserDeleted).unwrap();

        loop {
            if let CoreEvent::Session(SessionEvent::SignedOut { reason }) =
                events.recv().await.unwrap()
            {
                assert_eq!(reason, "deleted");
                break;
            }
        }
        assert_eq!(manager.state().await, SessionState::Invalid);
        manager.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_purges_even_if_backend_fails() {
        struct FailingSignOut;

        #[async_trait]
        impl AuthService for FailingSignOut {
            async fn get_session(&self) -> BridgeResult<Option<AuthSession>> {
                Ok(None)
            }
            async fn sign_out(&self) -> BridgeResult<()> {
                Err(BridgeError::Network("fetch failed".into()))
            }
            async fn subscribe_changes(&self) -> BridgeResult<Box<dyn AuthChangeStream>> {
                Err(BridgeError::NotAvailable("none".into()))
            }
        }

        let store = Arc::new(MockStore::default());
        store.set(KEY_AUTH_TOKEN, "token").await.unwrap();
        let (manager, _) = manager(
            Arc::new(FailingSignOut),
            None,
            store.clone(),
            Duration::from_secs(15),
        );

        manager.sign_out().await;
        assert_eq!(manager.state().await, SessionState::Invalid);
        assert!(store.entries.lock().await.is_empty());
    }
}
