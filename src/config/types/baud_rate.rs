use serde::{Deserialize, Serialize};
use tracing::warn;

/// Line speeds the library accepts.
const SUPPORTED_RATES: [u32; 11] = [
    110, 300, 600, 1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200,
];

const FALLBACK_RATE: u32 = 9600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaudRate(u32);

impl BaudRate {
    pub fn new(rate: u32) -> Self {
        Self(rate)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// The rate actually applied to the line: the configured value if it is
    /// in the supported set, 9600 with a warning otherwise.
    pub fn normalized(&self) -> u32 {
        if SUPPORTED_RATES.contains(&self.0) {
            self.0
        } else {
            warn!(
                "Unsupported baud rate {}, falling back to {}",
                self.0, FALLBACK_RATE
            );
            FALLBACK_RATE
        }
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(FALLBACK_RATE)
    }
}

impl std::fmt::Display for BaudRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_rates_pass_through() {
        for rate in SUPPORTED_RATES {
            assert_eq!(BaudRate::new(rate).normalized(), rate);
        }
    }

    #[test]
    fn test_unknown_rate_falls_back() {
        assert_eq!(BaudRate::new(12345).normalized(), 9600);
        assert_eq!(BaudRate::new(0).normalized(), 9600);
    }
}
