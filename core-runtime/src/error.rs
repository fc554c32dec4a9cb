use thiserror::Error;

/// Runtime wiring failure.
///
/// `CapabilityMissing` is the fail-fast outcome of building a [`CoreConfig`]
/// without one of the required host bridges (auth, profiles, realtime,
/// durable store); the message names the builder method that injects it.
///
/// [`CoreConfig`]: crate::config::CoreConfig
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid core configuration: {0}")]
    Config(String),

    #[error("Required bridge {capability} not provided: {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
