use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("Platform signal subscription failed: {0}")]
    Subscribe(#[source] BridgeError),

    #[error("Network monitor already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, NetError>;
