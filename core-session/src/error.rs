use core_net::RetryError;
use thiserror::Error;

/// Session validation failure.
///
/// `Clone` so one in-flight validation can hand its outcome to every
/// concurrent `initialize()` caller.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("No authenticated session")]
    NoSession,

    #[error("Profile is deactivated")]
    ProfileInactive,

    #[error("Profile lookup failed: {0}")]
    ProfileLookup(String),

    #[error("Session expired: {0}")]
    Expired(String),

    #[error("Session validation timed out")]
    Timeout,

    #[error("Auth change subscription failed: {0}")]
    Subscribe(String),

    #[error("{0}")]
    Retry(String),
}

impl SessionError {
    pub(crate) fn from_retry(err: RetryError) -> Self {
        if err.is_session_expired() {
            Self::Expired(err.to_string())
        } else {
            Self::Retry(err.to_string())
        }
    }

    /// Whether this failure forces the purge-and-redirect path instead of
    /// leaving an existing valid session in place.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            Self::NoSession | Self::ProfileInactive | Self::Expired(_)
        )
    }

    /// Human-readable message for the UI boundary.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoSession | Self::Expired(_) => {
                "Your session has expired. Please sign in again."
            }
            Self::ProfileInactive => "Your account has been deactivated.",
            Self::Timeout | Self::Retry(_) => {
                "Connection problem. Please check your network and try again."
            }
            Self::ProfileLookup(_) | Self::Subscribe(_) => {
                "Something went wrong. Please try again."
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
