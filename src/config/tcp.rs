use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::config::types::ErrorRecovery;
use crate::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 502;

/// Endpoint settings for a TCP context. `address` is the remote slave for
/// a connecting master and the bind address in listen mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub address: String,
    pub port: u16,
    pub error_recovery: ErrorRecovery,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            error_recovery: ErrorRecovery::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.address
            .parse::<Ipv4Addr>()
            .map_err(|_| ConfigError::tcp(format!("not an IPv4 address: {}", self.address)))?;

        Ok(())
    }
}
