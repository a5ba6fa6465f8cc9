//! Byte-stream transports to the vehicle
//!
//! The session manager only depends on [`TransportConnector`]; the concrete
//! backends are:
//! - RFCOMM through BlueZ (feature `bluetooth`)
//! - a serial TTY such as a bound `/dev/rfcomm0` (feature `serial`)
//! - TCP, for the vehicle simulator

#[cfg(test)]
pub mod mock;
#[cfg(feature = "bluetooth")]
pub mod rfcomm;
#[cfg(feature = "serial")]
pub mod serial;
pub mod tcp;
pub mod traits;

#[cfg(feature = "bluetooth")]
pub use rfcomm::{RfcommConfig, RfcommConnector, SPP_UUID};
#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialConnector};
pub use tcp::TcpConnector;
pub use traits::{TransportConnector, TransportStream};
