//! carlink: remote-control client for a Bluetooth SPP vehicle
//!
//! The [`session::SessionManager`] owns the link to the vehicle, turns
//! [`Intent`]s into single-byte commands and reconnects on failure. Status
//! and inbound text are delivered as [`session::SessionEvent`]s.

pub mod config;
pub mod session;
pub mod transport;

pub use carlink_shared::{Intent, SessionError, SessionState};
