use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Failed to open channel '{name}': {source}")]
    Open {
        name: String,
        #[source]
        source: BridgeError,
    },
}

pub type Result<T> = std::result::Result<T, RealtimeError>;
