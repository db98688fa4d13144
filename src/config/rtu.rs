use serde::{Deserialize, Serialize};

use crate::config::types::{BaudRate, DataBits, Parity, StopBits};
use crate::errors::ConfigError;

/// Serial line settings for an RTU context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: String,
    pub baud_rate: BaudRate,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: BaudRate::default(),
            data_bits: DataBits::default(),
            parity: Parity::default(),
            stop_bits: StopBits::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.is_empty() {
            return Err(ConfigError::rtu("device path cannot be empty"));
        }

        Ok(())
    }

    pub fn serial_port_info(&self) -> String {
        format!(
            "{} ({} baud, {} data bits, {} parity, {} stop bits)",
            self.device, self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_device_rejected() {
        let config = Config {
            device: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_serial_port_info_format() {
        let config = Config::default();
        assert_eq!(
            config.serial_port_info(),
            "/dev/ttyUSB0 (9600 baud, 8 data bits, none parity, 1 stop bits)"
        );
    }
}
