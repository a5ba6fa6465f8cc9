//! Vehicle session management
//!
//! This module handles:
//! - Connection establishment off the caller's thread
//! - Bounded reconnection with a fixed delay
//! - Ordered single-byte command transmission
//! - The inbound listen loop
//! - Teardown on disconnect or drop

mod event;
mod listener;
mod manager;
mod writer;

pub use event::{SessionEvent, SessionEvents};
pub use manager::{SessionConfig, SessionManager};
