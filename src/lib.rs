pub mod config;
pub mod context;
pub mod crc;
mod engine;
pub mod errors;
mod frame;
pub mod logging;
pub mod mapping;
mod master;
mod slave;
pub mod transport;

pub use config::{LoggingConfig, RtuConfig, TcpConfig, TimingConfig};
pub use config::{BaudRate, DataBits, ErrorRecovery, Parity, StopBits};
pub use context::Context;
pub use crc::{check_crc, crc16};
pub use errors::{
    ConfigError, ExceptionCode, FrameError, IoOperation, ModbusError, TransportError,
};
pub use frame::{
    function, COIL_OFF, COIL_ON, MAX_FRAME_SIZE, MAX_READ_BITS, MAX_READ_REGISTERS,
    MAX_WRITE_BITS, MAX_WRITE_REGISTERS,
};
pub use mapping::Mapping;
pub use transport::Framing;
