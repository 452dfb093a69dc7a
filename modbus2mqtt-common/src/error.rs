use thiserror::Error;

/// Common error type for modbus2mqtt components.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using modbus2mqtt's Error.
pub type Result<T> = std::result::Result<T, Error>;
