use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Flush,
    Configure,
    Connect,
    Listen,
    Accept,
}

impl std::fmt::Display for IoOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Flush => write!(f, "flush"),
            Self::Configure => write!(f, "configure"),
            Self::Connect => write!(f, "connect"),
            Self::Listen => write!(f, "listen"),
            Self::Accept => write!(f, "accept"),
        }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error on {port}: {details}")]
    Serial {
        port: String,
        details: String,
        #[source]
        source: Option<serialport::Error>,
    },

    #[error("I/O error: {operation} failed - {details}")]
    Io {
        operation: IoOperation,
        details: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {limit:?} waiting for the remote side")]
    Timeout { limit: Duration },

    #[error("Connection closed by the remote side")]
    ConnectionClosed,

    #[error("Transport is not connected")]
    NotConnected,
}

impl TransportError {
    pub fn io(operation: IoOperation, details: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            details: details.into(),
            source,
        }
    }

    pub fn serial(port: impl Into<String>, source: serialport::Error) -> Self {
        Self::Serial {
            port: port.into(),
            details: source.to_string(),
            source: Some(source),
        }
    }

    /// True for the inter-frame timeout the master-side response check
    /// inspects before applying the exception-reply heuristic.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
