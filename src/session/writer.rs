//! Outbound write loop

use super::manager::Shared;
use crate::transport::TransportConnector;
use carlink_shared::{codec, Intent, WireCommand};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Write queued commands in the order they were accepted
///
/// This task is the only writer of the stream. It stops when `close` fires
/// (or its sender is dropped), abandoning a blocked write, or after the first
/// failed write. Either way the write half is shut down before returning.
pub(super) async fn run<C: TransportConnector>(
    shared: Arc<Shared<C>>,
    epoch: u64,
    mut writer: WriteHalf<C::Stream>,
    mut commands: mpsc::UnboundedReceiver<Intent>,
    mut close: oneshot::Receiver<()>,
) {
    loop {
        let intent = tokio::select! {
            biased;
            _ = &mut close => break,
            next = commands.recv() => match next {
                Some(intent) => intent,
                None => break,
            },
        };

        let command = codec::encode(intent);
        let result = tokio::select! {
            biased;
            _ = &mut close => break,
            result = write_command(&mut writer, command) => result,
        };

        match result {
            Ok(()) => {
                debug!("[LINK] Sent {} ({:?})", intent, command.byte() as char);
                shared.command_written(epoch);
            }
            Err(e) => {
                shared.write_failed(epoch, intent, e);
                break;
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        warn!("[LINK] Error closing transport: {}", e);
    }
}

async fn write_command<W>(writer: &mut W, command: WireCommand) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(command.as_bytes()).await?;
    writer.flush().await
}
