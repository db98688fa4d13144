mod logging;
mod rtu;
mod tcp;
mod timing;
mod types;

pub use logging::Config as LoggingConfig;
pub use rtu::Config as RtuConfig;
pub use tcp::Config as TcpConfig;
pub use timing::Config as TimingConfig;
pub use types::{BaudRate, DataBits, ErrorRecovery, Parity, StopBits};
