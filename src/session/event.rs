//! Events delivered to the session's caller

use carlink_shared::Intent;
use std::fmt;
use tokio::sync::mpsc;

/// Status and data events emitted by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Link established
    Connected,
    /// An established link failed on read or write
    ConnectionLost { reason: String },
    /// Automatic reconnection attempt `n` has been scheduled
    ReconnectAttempt(u32),
    /// Retry budget exhausted; an explicit connect is required
    ConnectionFailed,
    /// Text from one read call (no framing, may be partial)
    MessageReceived(String),
    /// An accepted command was not written; reconnection follows
    SendError { intent: Intent, reason: String },
    /// A command was requested while the link was down
    NotConnected { intent: Intent },
    /// Session torn down by the caller
    Disconnected,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Connected => write!(f, "connected"),
            SessionEvent::ConnectionLost { reason } => write!(f, "connection lost: {}", reason),
            SessionEvent::ReconnectAttempt(n) => write!(f, "reconnect attempt {}", n),
            SessionEvent::ConnectionFailed => write!(f, "connection failed"),
            SessionEvent::MessageReceived(text) => write!(f, "message: {:?}", text),
            SessionEvent::SendError { intent, reason } => {
                write!(f, "failed to send {}: {}", intent, reason)
            }
            SessionEvent::NotConnected { intent } => write!(f, "not connected, dropped {}", intent),
            SessionEvent::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Receiving end of the session's event channel
pub type SessionEvents = mpsc::UnboundedReceiver<SessionEvent>;
