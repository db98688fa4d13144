use std::io::{Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, warn};

use crate::config::RtuConfig;
use crate::errors::{IoOperation, TransportError};

/// A configured serial line.
///
/// The port is switched to a raw 8-N-1-style discipline by the serial
/// layer; timing is driven from the receive engine by adjusting the port's
/// read timeout per call rather than through VMIN/VTIME.
pub struct RtuTransport {
    port: Box<dyn SerialPort>,
    device: String,
}

impl std::fmt::Debug for RtuTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RtuTransport")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl RtuTransport {
    pub(crate) fn open(config: &RtuConfig) -> Result<Self, TransportError> {
        let baud_rate = config.baud_rate.normalized();

        let port = serialport::new(&config.device, baud_rate)
            .data_bits(config.data_bits.into())
            .parity(config.parity.into())
            .stop_bits(config.stop_bits.into())
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| TransportError::serial(&config.device, e))?;

        debug!("Opened serial port {}", config.serial_port_info());

        Ok(Self {
            port,
            device: config.device.clone(),
        })
    }

    pub(crate) fn read_timed(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, TransportError> {
        self.port
            .set_timeout(limit)
            .map_err(|e| TransportError::serial(&self.device, e))?;

        match self.port.read(buf) {
            Ok(read) => Ok(read),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                Err(TransportError::Timeout { limit })
            }
            Err(e) => Err(TransportError::io(
                IoOperation::Read,
                self.device.clone(),
                e,
            )),
        }
    }

    pub(crate) fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(buf)
            .and_then(|()| self.port.flush())
            .map_err(|e| TransportError::io(IoOperation::Write, self.device.clone(), e))
    }

    /// Flushes both line buffers so a half-read frame does not poison the
    /// next exchange.
    pub(crate) fn discard_buffers(&mut self) {
        if let Err(e) = self.port.clear(ClearBuffer::All) {
            warn!("Failed to flush serial buffers on {}: {}", self.device, e);
        }
    }
}
