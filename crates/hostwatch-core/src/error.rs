use thiserror::Error;

/// Shared error type for hostwatch types and configuration.
#[derive(Error, Debug)]
pub enum HostwatchError {
    #[error("Invalid hardware address: {0:?}")]
    InvalidMac(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, HostwatchError>;
