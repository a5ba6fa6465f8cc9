//! Vehicle simulator
//!
//! Accepts carlink connections and answers every command byte with one
//! text line, the way the vehicle firmware acknowledges commands:
//! ```text
//! 'f' -> "OK forward\n"      unknown byte -> "ERR 0x78\n"
//! ```

use anyhow::Result;
use carlink_shared::{link, Intent};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LISTEN: &str = "0.0.0.0:9000";

/// Reply line for one received byte; line endings are ignored
fn respond(byte: u8) -> Option<String> {
    match byte {
        b'\r' | b'\n' => None,
        _ => Some(match Intent::from_wire(byte) {
            Some(intent) => format!("OK {}\n", intent),
            None => format!("ERR {:#04x}\n", byte),
        }),
    }
}

/// Serve one connection until the controller goes away
async fn serve<S>(mut stream: S, peer: String) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; link::READ_BUFFER_SIZE];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            info!("[SIM] {} disconnected", peer);
            return Ok(());
        }

        let reply: String = buf[..n].iter().filter_map(|&b| respond(b)).collect();
        if !reply.is_empty() {
            debug!("[SIM] {} -> {:?}", peer, reply);
            stream.write_all(reply.as_bytes()).await?;
        }
    }
}

#[cfg(feature = "bluetooth")]
async fn serve_rfcomm(channel: u8) -> Result<()> {
    use bluer::rfcomm::{Listener, SocketAddr};

    let session = bluer::Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let local = SocketAddr::new(adapter.address().await?, channel);
    let listener = Listener::bind(local).await?;
    info!("[SIM] RFCOMM listening on {} channel {}", local.addr, channel);

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("[SIM] RFCOMM connection from {}", peer.addr);
        tokio::spawn(async move {
            if let Err(e) = serve(stream, peer.addr.to_string()).await {
                error!("[SIM] RFCOMM session error: {}", e);
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    #[cfg(feature = "bluetooth")]
    tokio::spawn(async {
        if let Err(e) = serve_rfcomm(link::DEFAULT_RFCOMM_CHANNEL).await {
            error!("[SIM] RFCOMM listener stopped: {}", e);
        }
    });

    let listen = std::env::var("SIM_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.into());
    let listener = TcpListener::bind(&listen).await?;
    info!("[SIM] Vehicle listening on {}", listen);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("[SIM] Connection from {}", addr);
        tokio::spawn(async move {
            if let Err(e) = serve(socket, addr.to_string()).await {
                error!("[SIM] Session error from {}: {}", addr, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_respond_known_commands() {
        assert_eq!(respond(b'f').as_deref(), Some("OK forward\n"));
        assert_eq!(respond(b's').as_deref(), Some("OK stop\n"));
    }

    #[test]
    fn test_respond_unknown_and_line_endings() {
        assert_eq!(respond(b'x').as_deref(), Some("ERR 0x78\n"));
        assert_eq!(respond(b'\n'), None);
    }

    #[tokio::test]
    async fn test_serve_answers_each_byte() {
        let (mut client, server) = tokio::io::duplex(64);
        let task = tokio::spawn(serve(server, "test".into()));

        client.write_all(b"fx").await.unwrap();
        let expected = "OK forward\nERR 0x78\n";
        let mut reply = vec![0u8; expected.len()];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(String::from_utf8(reply).unwrap(), expected);

        drop(client);
        task.await.unwrap().unwrap();
    }
}
