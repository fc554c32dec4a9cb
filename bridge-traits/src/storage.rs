//! Durable Local Storage Abstraction
//!
//! A single durable key-value store shared by every component. Writes are
//! last-write-wins with no transactions; all stored state is derived and
//! recomputable from server truth.
//!
//! Platform backing:
//! - Web: localStorage / IndexedDB
//! - Desktop: config files or OS preferences
//!
//! # Example
//!
//! ```ignore
//! use bridge_traits::storage::LocalStore;
//!
//! async fn remember_role(store: &dyn LocalStore) -> Result<()> {
//!     store.set("auth.role", "admin").await
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value store capability.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Store a value under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a value. Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List all stored keys.
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Remove every key. Use with caution.
    async fn clear(&self) -> Result<()>;

    /// Remove every key starting with `prefix`.
    async fn remove_prefix(&self, prefix: &str) -> Result<()> {
        for key in self.list_keys().await? {
            if key.starts_with(prefix) {
                self.delete(&key).await?;
            }
        }
        Ok(())
    }
}
