//! # Chat Client Core
//!
//! The client-side resilience layer of the chat application: session
//! validity, realtime subscription supervision, bounded retries, and
//! short-lived caching, coordinated over one event bus.
//!
//! ## Overview
//!
//! [`ClientCore`] is the context object constructed once at process start.
//! It wires the components together from a [`CoreConfig`] and owns their
//! lifecycles:
//!
//! - [`NetworkMonitor`] observes platform connectivity signals
//! - [`RetryExecutor`] wraps network-crossing operations
//! - [`EphemeralCache`] holds short-lived lookups, with a durable fallback
//! - [`SessionLifecycleManager`] owns session validity
//! - [`ConnectionSupervisor`] keeps realtime channels subscribed
//!
//! ## Usage
//!
//! ```ignore
//! use chat_client_core::{ClientCore, CoreConfig};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .auth_service(auth)
//!     .profile_store(profiles)
//!     .realtime_service(realtime)
//!     .local_store(store)
//!     .build()?;
//!
//! let core = ClientCore::init(config).await?;
//! let session = core.session().initialize().await?;
//! let handle = core
//!     .realtime()
//!     .subscribe_to_channel("messages", "messages", None)
//!     .await?;
//! // ...
//! core.teardown().await;
//! ```

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use core_cache::{DocumentLookup, EphemeralCache};
use core_net::{NetworkMonitor, RetryExecutor, RetryOptions};
use core_realtime::ConnectionSupervisor;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_session::SessionLifecycleManager;

pub use bridge_traits;
pub use core_cache::{content_hash, CacheOptions};
pub use core_net::{NetworkState, QualityTier, RetryContext, RetryError};
pub use core_realtime::ChannelHandle;
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events;
pub use core_runtime::logging::{init_logging, LoggingConfig};
pub use core_session::{Session, SessionError, SessionState};

/// How long a parsed-document record stays cached.
const DOCUMENT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Failure while wiring or starting the core.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Net(#[from] core_net::NetError),

    #[error(transparent)]
    Session(#[from] core_session::SessionError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// The assembled resilience layer. One instance per process.
pub struct ClientCore {
    event_bus: EventBus,
    monitor: Arc<NetworkMonitor>,
    retry: RetryExecutor,
    cache: Arc<EphemeralCache>,
    documents: Option<Arc<DocumentLookup>>,
    session: Arc<SessionLifecycleManager>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl ClientCore {
    /// Wires and starts every component.
    ///
    /// Session validation is not run here; the host calls
    /// [`SessionLifecycleManager::initialize`] when it is ready to gate a
    /// protected view.
    pub async fn init(config: CoreConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer);

        let monitor = Arc::new(NetworkMonitor::new(event_bus.clone()));
        if let Some(platform) = &config.platform_events {
            monitor.start(Arc::clone(platform)).await?;
        }

        let retry = RetryExecutor::new(
            Arc::clone(&monitor),
            RetryOptions {
                max_attempts: config.retry_max_attempts,
                initial_delay: config.retry_initial_delay,
                max_delay: config.retry_max_delay,
                timeout: config.retry_timeout,
            },
        );

        let cache = Arc::new(EphemeralCache::new(
            Arc::clone(&config.local_store),
            config.cache_sweep_interval,
        ));
        cache.start_sweep();

        let documents = config.document_store.as_ref().map(|store| {
            Arc::new(DocumentLookup::new(
                Arc::clone(&cache),
                Arc::clone(store),
                DOCUMENT_CACHE_TTL,
            ))
        });

        let session = Arc::new(SessionLifecycleManager::new(
            &config,
            Arc::clone(&monitor),
            retry.clone(),
            event_bus.clone(),
        ));
        session.start().await?;

        let supervisor = Arc::new(ConnectionSupervisor::new(
            &config,
            Arc::clone(&monitor),
            event_bus.clone(),
        ));
        supervisor.start().await;

        info!("client core initialized");
        Ok(Self {
            event_bus,
            monitor,
            retry,
            cache,
            documents,
            session,
            supervisor,
        })
    }

    /// Subscribe to the core's event feed.
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    pub fn retry(&self) -> &RetryExecutor {
        &self.retry
    }

    pub fn cache(&self) -> &Arc<EphemeralCache> {
        &self.cache
    }

    /// Parsed-document lookup, present when a `DocumentStore` was configured.
    pub fn documents(&self) -> Option<&Arc<DocumentLookup>> {
        self.documents.as_ref()
    }

    pub fn session(&self) -> &Arc<SessionLifecycleManager> {
        &self.session
    }

    pub fn realtime(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Stops every component, newest first. Pending reconnect and backoff
    /// timers are cancelled so nothing fires after teardown.
    pub async fn teardown(&self) {
        self.supervisor.cleanup().await;
        self.session.shutdown();
        self.cache.shutdown();
        self.monitor.shutdown();
        info!("client core torn down");
    }
}
