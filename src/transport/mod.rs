mod rtu;
mod tcp;

pub use rtu::RtuTransport;
pub use tcp::TcpTransport;

use std::time::Duration;

use crate::errors::TransportError;

/// Wire framing of a context, fixed at construction.
///
/// The framing determines every offset used by the codec: the function
/// code sits right after the one-byte slave address on RTU and after the
/// full 7-byte MBAP header on TCP, and only RTU frames carry a trailing
/// CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    Rtu,
    Tcp,
}

impl Framing {
    /// Offset of the function code, i.e. the number of header bytes in
    /// front of it.
    pub const fn header_length(self) -> usize {
        match self {
            Framing::Rtu => 1,
            Framing::Tcp => 7,
        }
    }

    /// Trailing checksum bytes: the RTU CRC-16, nothing on TCP.
    pub const fn checksum_size(self) -> usize {
        match self {
            Framing::Rtu => 2,
            Framing::Tcp => 0,
        }
    }

    /// Offset of the slave address (RTU) or unit id (TCP).
    pub const fn unit_offset(self) -> usize {
        self.header_length() - 1
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Rtu => write!(f, "RTU"),
            Framing::Tcp => write!(f, "TCP"),
        }
    }
}

/// The open transport handle of a context: a configured serial line or a
/// connected stream socket, behind one read/write facade.
#[derive(Debug)]
pub(crate) enum Transport {
    Rtu(RtuTransport),
    Tcp(TcpTransport),
}

impl Transport {
    /// Reads whatever is available into `buf`, waiting at most `limit` for
    /// the first byte. `Ok(0)` means the peer closed the connection.
    pub(crate) async fn read_timed(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, TransportError> {
        match self {
            Transport::Rtu(rtu) => rtu.read_timed(buf, limit),
            Transport::Tcp(tcp) => tcp.read_timed(buf, limit).await,
        }
    }

    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        match self {
            Transport::Rtu(rtu) => rtu.write_all(buf),
            Transport::Tcp(tcp) => tcp.write_all(buf).await,
        }
    }

    /// Drops whatever is sitting in the line buffers after a failed RTU
    /// exchange. TCP recovery is a reconnect and belongs to the context.
    pub(crate) fn discard_buffers(&mut self) {
        if let Transport::Rtu(rtu) = self {
            rtu.discard_buffers();
        }
    }

    pub(crate) async fn close(self) {
        match self {
            // The serial handle restores the line on drop.
            Transport::Rtu(_) => {}
            Transport::Tcp(tcp) => tcp.close().await,
        }
    }
}
