//! Error types for the carlink link layer

use std::io;
use thiserror::Error;

/// Errors from the command codec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Unknown intent: {0:?}")]
    UnknownIntent(String),
}

/// Failures of the underlying byte transport
///
/// Every variant is recoverable from the session's point of view and feeds
/// the reconnection policy.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Device {address} does not offer service {uuid}")]
    ServiceNotFound { address: String, uuid: String },

    #[error("Connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Wrap an I/O error raised while connecting
    pub fn connect(address: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            address: address.into(),
            source,
        }
    }
}

/// Errors returned to the caller of the session manager
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("Not connected to the vehicle")]
    NotConnected,
}
