mod baud_rate;
mod data_bits;
mod error_recovery;
mod parity;
mod stop_bits;

pub use baud_rate::BaudRate;
pub use data_bits::DataBits;
pub use error_recovery::ErrorRecovery;
pub use parity::Parity;
pub use stop_bits::StopBits;
