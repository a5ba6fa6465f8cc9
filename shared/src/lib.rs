//! carlink Shared Types
//!
//! This crate provides the command codec, the link state machine and the
//! error types shared by the carlink controller and the vehicle simulator.

pub mod codec;
pub mod error;
pub mod state_machine;

pub use codec::{decode, encode, InboundMessage, Intent, WireCommand};
pub use error::{CodecError, SessionError, TransportError};
pub use state_machine::{LinkEvent, RetryBudget, SessionState, SessionStateMachine, TransitionResult};

/// Link parameters for the vehicle connection
pub mod link {
    /// Maximum automatic reconnection attempts before giving up
    pub const MAX_RETRIES: u32 = 3;

    /// Fixed delay between reconnection attempts in milliseconds
    pub const RETRY_DELAY_MS: u64 = 2000;

    /// Size of the buffer handed to a single read call
    pub const READ_BUFFER_SIZE: usize = 1024;

    /// Well-known Serial Port Profile service UUID
    pub const SPP_UUID: &str = "00001101-0000-1000-8000-00805F9B34FB";

    /// RFCOMM channel the vehicle firmware serves SPP on
    pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

    /// Bluetooth address of the vehicle controller
    pub const DEFAULT_DEVICE_ADDRESS: &str = "7C:9E:BD:D7:FA:12";

    /// Line speed of the vehicle UART bridge when reached over a TTY
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;

    /// TTY that `rfcomm bind` exposes for the first bound channel
    pub const DEFAULT_SERIAL_DEVICE: &str = "/dev/rfcomm0";

    /// Address of the TCP simulator used during development
    pub const DEFAULT_SIM_ADDRESS: &str = "127.0.0.1:9000";
}
