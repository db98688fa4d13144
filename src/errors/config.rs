use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid RTU configuration: {0}")]
    Rtu(String),

    #[error("Invalid TCP configuration: {0}")]
    Tcp(String),

    #[error("Invalid timing configuration: {0}")]
    Timing(String),

    #[error("Invalid logging configuration: {0}")]
    Logging(String),
}

impl ConfigError {
    pub fn rtu(details: impl Into<String>) -> Self {
        Self::Rtu(details.into())
    }

    pub fn tcp(details: impl Into<String>) -> Self {
        Self::Tcp(details.into())
    }

    pub fn timing(details: impl Into<String>) -> Self {
        Self::Timing(details.into())
    }

    pub fn logging(details: impl Into<String>) -> Self {
        Self::Logging(details.into())
    }
}
