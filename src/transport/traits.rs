//! Transport trait abstraction for pluggable byte-stream backends

use async_trait::async_trait;
use carlink_shared::TransportError;
use tokio::io::{AsyncRead, AsyncWrite};

/// A duplex byte stream to the vehicle
///
/// Closing is done by shutting down the write half and dropping both halves.
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> TransportStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Factory for creating transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    /// The stream type this connector produces
    type Stream: TransportStream;

    /// Attempt to connect to `address`, returning a stream on success
    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}

/// Share one connector between several owners
#[async_trait]
impl<T: TransportConnector> TransportConnector for std::sync::Arc<T> {
    type Stream = T::Stream;

    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError> {
        (**self).connect(address).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
