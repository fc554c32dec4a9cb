//! # Core Runtime
//!
//! Ambient runtime shared by every resilience component: the typed event
//! bus, the fail-fast configuration builder, and logging setup.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{ChannelEvent, CoreEvent, EventBus, NetworkEvent, SessionEvent};
pub use logging::{init_logging, LogFormat, LoggingConfig};
