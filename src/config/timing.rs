use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Receive timing tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long the master waits for the first byte of a response.
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Inter-byte timeout within a frame.
    #[serde(with = "humantime_serde")]
    pub byte_timeout: Duration,

    /// How long a slave waits for the first byte of the next query.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            byte_timeout: Duration::from_millis(50),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_timeout.is_zero() {
            return Err(ConfigError::timing("response_timeout cannot be 0"));
        }
        if self.byte_timeout.is_zero() {
            return Err(ConfigError::timing("byte_timeout cannot be 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::timing("request_timeout cannot be 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = Config {
            byte_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_serde_uses_humantime() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("500ms"), "unexpected encoding: {json}");

        let parsed: Config = serde_json::from_str(
            r#"{"response_timeout":"1s","byte_timeout":"20ms","request_timeout":"2m"}"#,
        )
        .unwrap();
        assert_eq!(parsed.response_timeout, Duration::from_secs(1));
        assert_eq!(parsed.request_timeout, Duration::from_secs(120));
    }
}
