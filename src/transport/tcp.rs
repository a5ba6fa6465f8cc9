//! TCP transport used to drive the vehicle simulator during development

use crate::transport::traits::TransportConnector;
use async_trait::async_trait;
use carlink_shared::TransportError;
use tokio::net::TcpStream;
use tracing::debug;

/// TCP connector standing in for the Bluetooth link
#[derive(Debug, Clone, Default)]
pub struct TcpConnector;

impl TcpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError> {
        debug!("[TCP] Connecting to {}", address);
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| TransportError::connect(address, e))?;
        // Commands are single bytes; do not let Nagle hold them back
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "TCP simulation"
    }
}
