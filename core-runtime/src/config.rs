//! # Core Configuration Module
//!
//! Builder-constructed configuration for the chat client core.
//!
//! ## Overview
//!
//! `CoreConfig` holds the host-provided bridge capabilities plus the timing
//! knobs of the resilience layer. The builder enforces fail-fast validation:
//! a missing required bridge produces an actionable `CapabilityMissing`
//! error at construction time rather than a panic deep inside a component.
//!
//! ## Required bridges
//!
//! - `AuthService` - backend session access
//! - `ProfileStore` - `profiles` table lookups
//! - `RealtimeService` - change-notification channels
//! - `LocalStore` - durable key-value storage
//!
//! ## Optional bridges
//!
//! - `PlatformEvents` - connectivity/focus signals. Without it the network
//!   monitor stays at its `online=true, quality=unknown` default and no
//!   focus-driven revalidation runs.
//! - `DocumentStore` - parsed-document cache records.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .auth_service(Arc::new(MyAuth))
//!     .profile_store(Arc::new(MyProfiles))
//!     .realtime_service(Arc::new(MyRealtime))
//!     .local_store(Arc::new(MyStore))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AuthService, DocumentStore, LocalStore, PlatformEvents, ProfileStore, RealtimeService,
};
use std::sync::Arc;
use std::time::Duration;

/// Core configuration for the chat client core.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Backend authentication capability (required)
    pub auth_service: Arc<dyn AuthService>,

    /// Profile table capability (required)
    pub profile_store: Arc<dyn ProfileStore>,

    /// Realtime transport capability (required)
    pub realtime_service: Arc<dyn RealtimeService>,

    /// Durable local key-value store (required)
    pub local_store: Arc<dyn LocalStore>,

    /// Platform signal source (optional)
    pub platform_events: Option<Arc<dyn PlatformEvents>>,

    /// Parsed-document cache table (optional)
    pub document_store: Option<Arc<dyn DocumentStore>>,

    /// Event bus buffer capacity
    pub event_buffer: usize,

    /// Budget for one full session validation pass
    pub session_init_timeout: Duration,

    /// Debounce applied to focus-triggered revalidation
    pub focus_debounce: Duration,

    /// Background revalidation retry budget
    pub revalidate_max_attempts: u32,

    /// Base delay of the revalidation backoff schedule
    pub revalidate_base_delay: Duration,

    /// Interval of the cache's expired-entry sweep
    pub cache_sweep_interval: Duration,

    /// Base delay of the channel reconnect backoff schedule
    pub reconnect_delay: Duration,

    /// Reconnect attempts before a channel is abandoned
    pub max_reconnect_attempts: u32,

    /// Default retry budget for network-crossing operations
    pub retry_max_attempts: u32,

    /// Default initial retry backoff delay
    pub retry_initial_delay: Duration,

    /// Default retry backoff cap
    pub retry_max_delay: Duration,

    /// Default per-attempt timeout
    pub retry_timeout: Duration,
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("platform_events", &self.platform_events.is_some())
            .field("document_store", &self.document_store.is_some())
            .field("event_buffer", &self.event_buffer)
            .field("session_init_timeout", &self.session_init_timeout)
            .field("focus_debounce", &self.focus_debounce)
            .field("revalidate_max_attempts", &self.revalidate_max_attempts)
            .field("revalidate_base_delay", &self.revalidate_base_delay)
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_initial_delay", &self.retry_initial_delay)
            .field("retry_max_delay", &self.retry_max_delay)
            .field("retry_timeout", &self.retry_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    auth_service: Option<Arc<dyn AuthService>>,
    profile_store: Option<Arc<dyn ProfileStore>>,
    realtime_service: Option<Arc<dyn RealtimeService>>,
    local_store: Option<Arc<dyn LocalStore>>,
    platform_events: Option<Arc<dyn PlatformEvents>>,
    document_store: Option<Arc<dyn DocumentStore>>,
    event_buffer: Option<usize>,
    session_init_timeout: Option<Duration>,
    focus_debounce: Option<Duration>,
    revalidate_max_attempts: Option<u32>,
    revalidate_base_delay: Option<Duration>,
    cache_sweep_interval: Option<Duration>,
    reconnect_delay: Option<Duration>,
    max_reconnect_attempts: Option<u32>,
    retry_max_attempts: Option<u32>,
    retry_initial_delay: Option<Duration>,
    retry_max_delay: Option<Duration>,
    retry_timeout: Option<Duration>,
}

impl CoreConfigBuilder {
    pub fn auth_service(mut self, auth: Arc<dyn AuthService>) -> Self {
        self.auth_service = Some(auth);
        self
    }

    pub fn profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.profile_store = Some(profiles);
        self
    }

    pub fn realtime_service(mut self, realtime: Arc<dyn RealtimeService>) -> Self {
        self.realtime_service = Some(realtime);
        self
    }

    pub fn local_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    pub fn platform_events(mut self, platform: Arc<dyn PlatformEvents>) -> Self {
        self.platform_events = Some(platform);
        self
    }

    pub fn document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.document_store = Some(documents);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    pub fn session_init_timeout(mut self, timeout: Duration) -> Self {
        self.session_init_timeout = Some(timeout);
        self
    }

    pub fn focus_debounce(mut self, debounce: Duration) -> Self {
        self.focus_debounce = Some(debounce);
        self
    }

    pub fn revalidate_max_attempts(mut self, attempts: u32) -> Self {
        self.revalidate_max_attempts = Some(attempts);
        self
    }

    pub fn revalidate_base_delay(mut self, delay: Duration) -> Self {
        self.revalidate_base_delay = Some(delay);
        self
    }

    pub fn cache_sweep_interval(mut self, interval: Duration) -> Self {
        self.cache_sweep_interval = Some(interval);
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.retry_max_attempts = Some(attempts);
        self
    }

    pub fn retry_initial_delay(mut self, delay: Duration) -> Self {
        self.retry_initial_delay = Some(delay);
        self
    }

    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = Some(delay);
        self
    }

    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.retry_timeout = Some(timeout);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityMissing` naming the first absent required
    /// bridge.
    pub fn build(self) -> Result<CoreConfig> {
        let auth_service = self.auth_service.ok_or_else(|| missing(
            "AuthService",
            "No auth service provided. Inject the backend auth adapter via CoreConfig::builder().auth_service(...).",
        ))?;
        let profile_store = self.profile_store.ok_or_else(|| missing(
            "ProfileStore",
            "No profile store provided. Inject the backend table adapter via CoreConfig::builder().profile_store(...).",
        ))?;
        let realtime_service = self.realtime_service.ok_or_else(|| missing(
            "RealtimeService",
            "No realtime service provided. Inject the backend realtime adapter via CoreConfig::builder().realtime_service(...).",
        ))?;
        let local_store = self.local_store.ok_or_else(|| missing(
            "LocalStore",
            "No durable store provided. Inject the platform key-value adapter via CoreConfig::builder().local_store(...).",
        ))?;

        Ok(CoreConfig {
            auth_service,
            profile_store,
            realtime_service,
            local_store,
            platform_events: self.platform_events,
            document_store: self.document_store,
            event_buffer: self.event_buffer.unwrap_or(100),
            session_init_timeout: self
                .session_init_timeout
                .unwrap_or(Duration::from_secs(15)),
            focus_debounce: self.focus_debounce.unwrap_or(Duration::from_secs(1)),
            revalidate_max_attempts: self.revalidate_max_attempts.unwrap_or(3),
            revalidate_base_delay: self
                .revalidate_base_delay
                .unwrap_or(Duration::from_millis(2000)),
            cache_sweep_interval: self.cache_sweep_interval.unwrap_or(Duration::from_secs(60)),
            reconnect_delay: self.reconnect_delay.unwrap_or(Duration::from_millis(1000)),
            max_reconnect_attempts: self.max_reconnect_attempts.unwrap_or(5),
            retry_max_attempts: self.retry_max_attempts.unwrap_or(3),
            retry_initial_delay: self
                .retry_initial_delay
                .unwrap_or(Duration::from_millis(1000)),
            retry_max_delay: self.retry_max_delay.unwrap_or(Duration::from_millis(10_000)),
            retry_timeout: self.retry_timeout.unwrap_or(Duration::from_millis(15_000)),
        })
    }
}

fn missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::auth::{AuthChangeStream, AuthSession};
    use bridge_traits::data::ProfileRecord;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::realtime::RealtimeChannel;
    use chrono::{DateTime, Utc};

    struct StubAuth;

    #[async_trait]
    impl AuthService for StubAuth {
        async fn get_session(&self) -> BridgeResult<Option<AuthSession>> {
            Ok(None)
        }
        async fn sign_out(&self) -> BridgeResult<()> {
            Ok(())
        }
        async fn subscribe_changes(&self) -> BridgeResult<Box<dyn AuthChangeStream>> {
            Err(bridge_traits::BridgeError::NotAvailable("stub".into()))
        }
    }

    struct StubProfiles;

    #[async_trait]
    impl ProfileStore for StubProfiles {
        async fn fetch_profile(&self, _user_id: &str) -> BridgeResult<Option<ProfileRecord>> {
            Ok(None)
        }
        async fn record_last_active(
            &self,
            _user_id: &str,
            _at: DateTime<Utc>,
        ) -> BridgeResult<()> {
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
            Err(bridge_traits::BridgeError::NotAvailable("stub".into()))
        }
    }

    struct StubStore;

    #[async_trait]
    impl LocalStore for StubStore {
        async fn set(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(vec![])
        }
        async fn clear(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_build_with_all_required_bridges() {
        let config = CoreConfig::builder()
            .auth_service(Arc::new(StubAuth))
            .profile_store(Arc::new(StubProfiles))
            .realtime_service(Arc::new(StubRealtime))
            .local_store(Arc::new(StubStore))
            .build()
            .unwrap();

        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_initial_delay, Duration::from_millis(1000));
        assert_eq!(config.retry_max_delay, Duration::from_millis(10_000));
        assert_eq!(config.retry_timeout, Duration::from_millis(15_000));
        assert_eq!(config.session_init_timeout, Duration::from_secs(15));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.cache_sweep_interval, Duration::from_secs(60));
        assert!(config.platform_events.is_none());
    }

    #[test]
    fn test_missing_required_bridge_is_actionable() {
        let result = CoreConfig::builder()
            .auth_service(Arc::new(StubAuth))
            .profile_store(Arc::new(StubProfiles))
            .local_store(Arc::new(StubStore))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "RealtimeService");
                assert!(message.contains("realtime_service"));
            }
            other => panic!("expected CapabilityMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_tunable_overrides() {
        let config = CoreConfig::builder()
            .auth_service(Arc::new(StubAuth))
            .profile_store(Arc::new(StubProfiles))
            .realtime_service(Arc::new(StubRealtime))
            .local_store(Arc::new(StubStore))
            .retry_max_attempts(5)
            .reconnect_delay(Duration::from_millis(250))
            .cache_sweep_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.cache_sweep_interval, Duration::from_secs(5));
    }
}
