use anyhow::Result;
use carlink::config::{LinkConfig, TransportMode};
use carlink::session::{SessionEvent, SessionEvents, SessionManager};
use carlink::transport::{TcpConnector, TransportConnector};
use carlink::Intent;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// One line typed by the operator
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Drive(Intent),
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let word = line.trim().to_ascii_lowercase();
    match word.as_str() {
        "" => Input::Empty,
        "connect" | "c" => Input::Connect,
        "disconnect" | "d" => Input::Disconnect,
        "status" | "?" => Input::Status,
        "help" | "h" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => match other.parse::<Intent>() {
            Ok(intent) => Input::Drive(intent),
            Err(_) => Input::Unknown(other.to_string()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LinkConfig::from_env()?;

    info!("carlink starting");
    info!("  Transport: {}", config.mode);
    info!("  Vehicle:   {}", config.session.address);
    info!(
        "  Retries:   {} every {:?}",
        config.session.max_retries, config.session.retry_delay
    );

    match config.mode {
        TransportMode::Tcp => run(TcpConnector::new(), config).await,
        TransportMode::Serial => run_serial(config).await,
        TransportMode::Rfcomm => run_rfcomm(config).await,
    }
}

#[cfg(feature = "serial")]
async fn run_serial(config: LinkConfig) -> Result<()> {
    use carlink::transport::{SerialConfig, SerialConnector};

    let connector = SerialConnector::new(SerialConfig {
        baud_rate: config.baud_rate,
    });
    run(connector, config).await
}

#[cfg(not(feature = "serial"))]
async fn run_serial(_config: LinkConfig) -> Result<()> {
    anyhow::bail!("serial transport requires building with the `serial` feature")
}

#[cfg(feature = "bluetooth")]
async fn run_rfcomm(config: LinkConfig) -> Result<()> {
    use carlink::transport::RfcommConnector;

    run(RfcommConnector::with_channel(config.channel), config).await
}

#[cfg(not(feature = "bluetooth"))]
async fn run_rfcomm(_config: LinkConfig) -> Result<()> {
    anyhow::bail!("rfcomm transport requires building with the `bluetooth` feature")
}

/// Drive the session from standard input until EOF or `quit`
async fn run<C: TransportConnector>(connector: C, config: LinkConfig) -> Result<()> {
    let (session, events) = SessionManager::new(connector, config.session);
    let event_task = tokio::spawn(handle_session_events(events));

    session.connect();
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Drive(intent) => {
                if let Err(e) = session.send(intent) {
                    debug!("Command {} not sent: {}", intent, e);
                }
            }
            Input::Connect => {
                let state = session.connect();
                info!("Session is {}", state);
            }
            Input::Disconnect => session.disconnect(),
            Input::Status => info!(
                "Session is {} ({} via {})",
                session.state(),
                session.address(),
                session.transport_name()
            ),
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(word) => warn!("Unknown input {:?}, type `help`", word),
        }
    }

    session.disconnect();
    drop(session);

    // The channel closes once the session's tasks have wound down
    if tokio::time::timeout(Duration::from_secs(1), event_task).await.is_err() {
        debug!("Event handler still running at exit");
    }
    Ok(())
}

fn print_help() {
    println!("Drive:   f(orward)  b(ack)  l(eft)  r(ight)  s(top)");
    println!("Session: connect  disconnect  status  help  quit");
}

/// Log every event coming out of the session
async fn handle_session_events(mut events: SessionEvents) {
    while let Some(event) = events.recv().await {
        debug!("Session event: {}", event);
        match event {
            SessionEvent::Connected => info!("[VEHICLE] Connected"),
            SessionEvent::MessageReceived(text) => info!("[VEHICLE] {}", text.trim_end()),
            SessionEvent::ReconnectAttempt(n) => warn!("[VEHICLE] Reconnecting (attempt {})", n),
            SessionEvent::ConnectionLost { reason } => warn!("[VEHICLE] Connection lost: {}", reason),
            SessionEvent::NotConnected { intent } => {
                warn!("[VEHICLE] Not connected, {} was not sent", intent)
            }
            SessionEvent::SendError { intent, reason } => {
                error!("[VEHICLE] Failed to send {}: {}", intent, reason)
            }
            SessionEvent::ConnectionFailed => {
                error!("[VEHICLE] Connection failed, type `connect` to try again")
            }
            SessionEvent::Disconnected => info!("[VEHICLE] Disconnected"),
        }
    }
}
