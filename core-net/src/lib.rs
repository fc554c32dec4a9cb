//! # Core Net
//!
//! Connectivity awareness and the shared retry primitive: the
//! [`NetworkMonitor`](monitor::NetworkMonitor) observes platform signals,
//! the [`RetryExecutor`](retry::RetryExecutor) wraps every network-crossing
//! operation with bounded retries, exponential backoff, and per-attempt
//! timeouts gated on the monitor's view of the link.

pub mod error;
pub mod monitor;
pub mod retry;

pub use error::{NetError, Result};
pub use monitor::{NetworkMonitor, NetworkState, QualityTier};
pub use retry::{
    backoff_delay, RetryContext, RetryError, RetryExecutor, RetryOptions, RetryResult,
};
