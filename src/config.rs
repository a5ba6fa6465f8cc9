//! Controller configuration
//!
//! Defaults target the TCP simulator; every field can be overridden from the
//! environment:
//!
//! | Variable                  | Field                  |
//! |---------------------------|------------------------|
//! | `CARLINK_TRANSPORT`       | `mode`                 |
//! | `CARLINK_ADDRESS`         | `session.address`      |
//! | `CARLINK_MAX_RETRIES`     | `session.max_retries`  |
//! | `CARLINK_RETRY_DELAY_MS`  | `session.retry_delay`  |
//! | `CARLINK_CHANNEL`         | `channel`              |
//! | `CARLINK_BAUD`            | `baud_rate`            |

use crate::session::SessionConfig;
use anyhow::{anyhow, Context, Result};
use carlink_shared::link;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which transport carries the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// TCP to the vehicle simulator (for development)
    #[default]
    Tcp,
    /// Serial TTY bound to the SPP channel
    Serial,
    /// Native RFCOMM through BlueZ
    Rfcomm,
}

impl TransportMode {
    /// Address used when none is configured
    pub fn default_address(self) -> &'static str {
        match self {
            TransportMode::Tcp => link::DEFAULT_SIM_ADDRESS,
            TransportMode::Serial => link::DEFAULT_SERIAL_DEVICE,
            TransportMode::Rfcomm => link::DEFAULT_DEVICE_ADDRESS,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Tcp => write!(f, "tcp"),
            TransportMode::Serial => write!(f, "serial"),
            TransportMode::Rfcomm => write!(f, "rfcomm"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" | "sim" => Ok(TransportMode::Tcp),
            "serial" | "tty" => Ok(TransportMode::Serial),
            "rfcomm" | "bluetooth" | "bt" => Ok(TransportMode::Rfcomm),
            other => Err(anyhow!("unknown transport {:?} (expected tcp, serial or rfcomm)", other)),
        }
    }
}

/// Full controller configuration
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub mode: TransportMode,
    pub session: SessionConfig,
    /// RFCOMM channel (rfcomm mode)
    pub channel: u8,
    /// Line speed (serial mode)
    pub baud_rate: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        let mode = TransportMode::default();
        Self {
            mode,
            session: SessionConfig {
                address: mode.default_address().into(),
                ..Default::default()
            },
            channel: link::DEFAULT_RFCOMM_CHANNEL,
            baud_rate: link::DEFAULT_BAUD_RATE,
        }
    }
}

impl LinkConfig {
    /// Load configuration from `CARLINK_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup("CARLINK_TRANSPORT") {
            config.mode = mode.parse()?;
        }
        config.session.address = lookup("CARLINK_ADDRESS")
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| config.mode.default_address().into());

        if let Some(retries) = lookup("CARLINK_MAX_RETRIES") {
            config.session.max_retries = parse_var("CARLINK_MAX_RETRIES", &retries)?;
        }
        if let Some(delay) = lookup("CARLINK_RETRY_DELAY_MS") {
            let millis: u64 = parse_var("CARLINK_RETRY_DELAY_MS", &delay)?;
            config.session.retry_delay = Duration::from_millis(millis);
        }
        if let Some(channel) = lookup("CARLINK_CHANNEL") {
            config.channel = parse_var("CARLINK_CHANNEL", &channel)?;
        }
        if let Some(baud) = lookup("CARLINK_BAUD") {
            config.baud_rate = parse_var("CARLINK_BAUD", &baud)?;
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {}: {:?}", key, value))
}
