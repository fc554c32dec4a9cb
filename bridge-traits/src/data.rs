//! Tabular Data Service Abstraction
//!
//! Point lookups and updates against the backend tables the resilience layer
//! inspects: the `profiles` record and the parsed-document cache record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Role assigned to a chat profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
    GAdmin,
    SuperAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::GAdmin => "g_admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Whether the role grants access to administrative surfaces.
    pub fn is_admin(&self) -> bool {
        !matches!(self, Self::User)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "g_admin" => Ok(Self::GAdmin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(BridgeError::OperationFailed(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

/// The slice of a `profiles` row the resilience layer reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: String,
    /// Deactivated profiles must never be reported as a valid session.
    pub active: bool,
    pub role: UserRole,
}

/// Profile table capability.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point lookup of a profile row by user id.
    async fn fetch_profile(&self, user_id: &str) -> Result<Option<ProfileRecord>>;

    /// Mirror the last-active timestamp into the backend as a side effect of
    /// validation. Never the source of truth for session validity.
    async fn record_last_active(&self, user_id: &str, at: DateTime<Utc>) -> Result<()>;
}

/// A parsed-document cache row, keyed by content hash.
///
/// Repeat uploads of the same file skip backend parsing by hitting this
/// record first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// SHA-256 hex digest of the raw file content
    pub hash: String,
    /// Extracted text content
    pub content: String,
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
}

/// Parsed-document cache table capability.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point lookup by content hash.
    async fn fetch_by_hash(&self, hash: &str) -> Result<Option<DocumentRecord>>;

    /// Insert or replace a parsed-document record.
    async fn upsert(&self, record: &DocumentRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            UserRole::User,
            UserRole::Admin,
            UserRole::GAdmin,
            UserRole::SuperAdmin,
        ] {
            assert_eq!(role.as_str().parse::<UserRole>().unwrap(), role);
        }
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_admin_roles() {
        assert!(!UserRole::User.is_admin());
        assert!(UserRole::Admin.is_admin());
        assert!(UserRole::GAdmin.is_admin());
        assert!(UserRole::SuperAdmin.is_admin());
    }
}
