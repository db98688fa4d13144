use serde::{Deserialize, Serialize};

/// What the context does when a TCP exchange fails with a hard transport
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorRecovery {
    /// Close the socket and dial again once before surfacing the error.
    #[default]
    ReconnectOnError,
    /// Surface the error unchanged and leave recovery to the caller.
    NopOnError,
}

impl std::fmt::Display for ErrorRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReconnectOnError => write!(f, "reconnect-on-error"),
            Self::NopOnError => write!(f, "nop-on-error"),
        }
    }
}
