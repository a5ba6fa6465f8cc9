//! RFCOMM transport implementation for the vehicle's SPP service

use crate::transport::traits::TransportConnector;
use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr as RfcommAddr, Stream as RfcommStream};
use bluer::{Address, Uuid};
use carlink_shared::{link, TransportError};
use tracing::{debug, info};

/// Serial Port Profile service class UUID
pub const SPP_UUID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5f9b_34fb);

/// Configuration for RFCOMM connector
#[derive(Debug, Clone)]
pub struct RfcommConfig {
    /// RFCOMM channel number
    pub channel: u8,
    /// Service the remote device must advertise
    pub service_uuid: Uuid,
}

impl Default for RfcommConfig {
    fn default() -> Self {
        Self {
            channel: link::DEFAULT_RFCOMM_CHANNEL,
            service_uuid: SPP_UUID,
        }
    }
}

/// RFCOMM connector for the vehicle controller
pub struct RfcommConnector {
    config: RfcommConfig,
}

impl RfcommConnector {
    pub fn new(config: RfcommConfig) -> Self {
        Self { config }
    }

    /// Create connector for a specific channel
    pub fn with_channel(channel: u8) -> Self {
        Self::new(RfcommConfig {
            channel,
            ..Default::default()
        })
    }

    /// Check the adapter is usable and the device offers the configured service
    async fn check_device(&self, target: Address) -> Result<(), TransportError> {
        let adapter_err = |e: bluer::Error| TransportError::AdapterUnavailable(e.to_string());

        let session = bluer::Session::new().await.map_err(adapter_err)?;
        let adapter = session.default_adapter().await.map_err(adapter_err)?;
        if !adapter.is_powered().await.map_err(adapter_err)? {
            return Err(TransportError::AdapterUnavailable(format!(
                "{} is powered off",
                adapter.name()
            )));
        }

        let device = adapter.device(target).map_err(adapter_err)?;
        // Unpaired devices may not report UUIDs yet; let the connect decide
        if let Ok(Some(uuids)) = device.uuids().await {
            if !uuids.contains(&self.config.service_uuid) {
                return Err(TransportError::ServiceNotFound {
                    address: target.to_string(),
                    uuid: self.config.service_uuid.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TransportConnector for RfcommConnector {
    type Stream = RfcommStream;

    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError> {
        let target: Address = address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(address.to_string()))?;

        self.check_device(target).await?;

        let socket_addr = RfcommAddr::new(target, self.config.channel);
        debug!("[BT] Connecting to {} channel {}", target, self.config.channel);

        let stream = RfcommStream::connect(socket_addr)
            .await
            .map_err(|e| TransportError::connect(address, e))?;

        info!("[BT] RFCOMM link up to {}", target);
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "Bluetooth"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RfcommConfig::default();
        assert_eq!(config.channel, link::DEFAULT_RFCOMM_CHANNEL);
        assert_eq!(
            config.service_uuid.to_string().to_uppercase(),
            link::SPP_UUID
        );
    }

    #[test]
    fn test_connector_with_channel() {
        let connector = RfcommConnector::with_channel(5);
        assert_eq!(connector.config.channel, 5);
        assert_eq!(connector.name(), "Bluetooth");
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let connector = RfcommConnector::new(RfcommConfig::default());
        let err = connector.connect("not-a-mac").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAddress(_)));
    }
}
