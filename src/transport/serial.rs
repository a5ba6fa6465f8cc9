//! Serial TTY transport
//!
//! BlueZ can bind an SPP channel to a TTY (`rfcomm bind 0 <addr> 1`), after
//! which the vehicle is reachable as `/dev/rfcomm0`. The session address is
//! the device path.

use crate::transport::traits::TransportConnector;
use async_trait::async_trait;
use carlink_shared::{link, TransportError};
use std::io;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::debug;

/// Configuration for the serial connector
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Line speed
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: link::DEFAULT_BAUD_RATE,
        }
    }
}

/// Connector opening a serial device node
pub struct SerialConnector {
    config: SerialConfig,
}

impl SerialConnector {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    pub fn baud_rate(&self) -> u32 {
        self.config.baud_rate
    }
}

#[async_trait]
impl TransportConnector for SerialConnector {
    type Stream = SerialStream;

    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError> {
        if address.is_empty() {
            return Err(TransportError::InvalidAddress("empty device path".into()));
        }

        debug!("[SERIAL] Opening {} at {} baud", address, self.config.baud_rate);
        tokio_serial::new(address, self.config.baud_rate)
            .open_native_async()
            .map_err(|e| TransportError::connect(address, io::Error::other(e)))
    }

    fn name(&self) -> &'static str {
        "Serial"
    }
}
