use bridge_traits::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle states.
///
/// `Uninitialized -> Initializing -> {Valid, Error}`. A sign-out, account
/// deletion, or exhausted revalidation moves `Valid -> Invalid`; `Invalid`
/// holds until a fresh sign-in restarts the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Valid,
    Invalid,
    Error,
}

impl SessionState {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// A validated session: token presence and an active profile were confirmed
/// in the same validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: UserRole,
    pub active: bool,
    pub last_validated: DateTime<Utc>,
}
