//! Bridge configuration

use std::time::Duration;

use crate::error::{BridgeError, Result};
use crate::wire::BROADCAST_ADDRESS;

/// Settings for a [`Bridge`](crate::bridge::Bridge)
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    /// Bus address the heartbeat is sent from
    ///
    /// 0xD0 is the base address a ProtoThrottle set to base "0" looks for.
    pub bus_address: u8,
    /// Bus address time packets are sent from
    pub clock_address: u8,
    /// Milliseconds between heartbeats
    pub heartbeat_interval_ms: u64,
    /// Milliseconds a single broadcast may take
    pub send_timeout_ms: u64,
    /// Drop inbound frames whose length byte or checksum is wrong
    pub verify_checksums: bool,
}

impl BridgeConfig {
    /// Default heartbeat source address
    pub const DEFAULT_BUS_ADDRESS: u8 = 0xD0;
    /// Default time packet source address
    pub const DEFAULT_CLOCK_ADDRESS: u8 = 0x00;

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Check the configuration for values the bus cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.bus_address == BROADCAST_ADDRESS {
            return Err(BridgeError::invalid_config(
                "bus address cannot be the broadcast address",
            ));
        }
        if self.clock_address == BROADCAST_ADDRESS {
            return Err(BridgeError::invalid_config(
                "clock address cannot be the broadcast address",
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(BridgeError::invalid_config(
                "heartbeat interval must be non-zero",
            ));
        }
        Ok(())
    }

    /// Parse a JSON configuration; missing fields take their defaults
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BridgeConfig = serde_json::from_str(json)
            .map_err(|e| BridgeError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            bus_address: Self::DEFAULT_BUS_ADDRESS,
            clock_address: Self::DEFAULT_CLOCK_ADDRESS,
            heartbeat_interval_ms: 1000,
            send_timeout_ms: 2000,
            verify_checksums: true,
        }
    }
}
