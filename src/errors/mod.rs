mod config;
mod exception;
mod frame;
mod transport;

pub use config::ConfigError;
pub use exception::ExceptionCode;
pub use frame::FrameError;
pub use transport::{IoOperation, TransportError};

use thiserror::Error;

/// Top-level error type for every library operation.
///
/// Transport failures, framing failures and remote protocol exceptions are
/// kept in distinct variants so a caller can match on the class without
/// decoding magic ranges.
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Modbus exception: {0}")]
    Exception(ExceptionCode),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ModbusError {
    /// The exception code reported by the remote side, if this error is a
    /// protocol exception.
    pub fn exception_code(&self) -> Option<ExceptionCode> {
        match self {
            Self::Exception(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}
