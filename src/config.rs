// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2026 tinybms-gateway contributors

//! Static gateway configuration. Constructed once at start-up, from CLI
//! flags in the default binary, and handed to [`crate::gateway::Gateway`].

use std::path::PathBuf;

use crate::constants::{POLL_INTERVAL_DEFAULT_MS, POLL_INTERVAL_MAX_MS, POLL_INTERVAL_MIN_MS};
use crate::error::GatewayError;

/// Which wire dialect the BMS firmware is configured to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Vendor,
    Modbus,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Vendor
    }
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "tinybms-gateway".to_string(),
            topic: "tinybms/live".to_string(),
            qos: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub serial_port: String,
    pub baud_rate: u32,
    pub dialect: Dialect,
    pub modbus_slave_id: u8,
    pub poll_interval_ms: u64,
    pub mqtt: Option<MqttConfig>,
    pub can_interface: Option<String>,
    pub diagnostic_log_path: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            serial_port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            dialect: Dialect::Vendor,
            modbus_slave_id: 1,
            poll_interval_ms: POLL_INTERVAL_DEFAULT_MS,
            mqtt: None,
            can_interface: None,
            diagnostic_log_path: None,
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.serial_port.is_empty() {
            return Err(GatewayError::InvalidArgument(
                "serial_port must not be empty".to_string(),
            ));
        }
        if !(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS).contains(&self.poll_interval_ms) {
            return Err(GatewayError::InvalidArgument(format!(
                "poll_interval_ms {} outside allowed range [{}, {}]",
                self.poll_interval_ms, POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_a_poll_interval_outside_the_allowed_range() {
        let mut config = GatewayConfig::default();
        config.poll_interval_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_an_empty_serial_port() {
        let mut config = GatewayConfig::default();
        config.serial_port.clear();
        assert!(config.validate().is_err());
    }
}
