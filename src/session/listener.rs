//! Inbound listen loop

use super::manager::Shared;
use crate::transport::TransportConnector;
use carlink_shared::{link, InboundMessage};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tracing::debug;

/// Read until the link fails, delivering each read as one message
///
/// This task is the only reader of the stream. It is aborted on teardown;
/// on its own failure it reports the loss exactly once.
pub(super) async fn run<C: TransportConnector>(
    shared: Arc<Shared<C>>,
    epoch: u64,
    mut reader: ReadHalf<C::Stream>,
) {
    let mut read_buf = vec![0u8; link::READ_BUFFER_SIZE];

    let reason = loop {
        match reader.read(&mut read_buf).await {
            Ok(0) => break "end of stream".to_string(),
            Ok(n) => {
                let message = InboundMessage::from_read(&read_buf[..n]);
                debug!("[LINK] Received {} bytes", message.len());
                shared.deliver(epoch, message);
            }
            Err(e) => break format!("read failed: {}", e),
        }
    };

    shared.connection_lost(epoch, reason);
}
