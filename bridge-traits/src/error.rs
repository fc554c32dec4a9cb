use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BridgeError {
    /// True for failures worth retrying: connectivity loss, timeouts, and
    /// messages carrying the usual network-failure signatures.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::Network(_) | BridgeError::Timeout(_) => true,
            BridgeError::OperationFailed(msg) | BridgeError::Storage(msg) => {
                let msg = msg.to_lowercase();
                ["network", "timeout", "timed out", "connection", "fetch failed", "offline"]
                    .iter()
                    .any(|sig| msg.contains(sig))
            }
            _ => false,
        }
    }

    /// True when the failure invalidates the whole session and must force
    /// the sign-out path instead of a retry.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, BridgeError::SessionExpired(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(BridgeError::Network("socket closed".into()).is_transient());
        assert!(BridgeError::Timeout("15s elapsed".into()).is_transient());
        assert!(BridgeError::OperationFailed("fetch failed".into()).is_transient());
        assert!(BridgeError::OperationFailed("Connection reset by peer".into()).is_transient());
        assert!(!BridgeError::OperationFailed("row not found".into()).is_transient());
        assert!(!BridgeError::SessionExpired("token revoked".into()).is_transient());
    }

    #[test]
    fn test_session_expired_is_never_transient() {
        let err = BridgeError::SessionExpired("refresh token invalid".into());
        assert!(err.is_session_expired());
        assert!(!err.is_transient());
    }
}
