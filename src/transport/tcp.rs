use std::time::Duration;

use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::TcpConfig;
use crate::errors::{IoOperation, TransportError};

/// A connected stream socket, either dialed out to a remote slave or
/// accepted from a master in listen mode.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub(crate) async fn connect(config: &TcpConfig) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((config.address.as_str(), config.port))
            .await
            .map_err(|e| {
                TransportError::io(
                    IoOperation::Connect,
                    format!("{}:{}", config.address, config.port),
                    e,
                )
            })?;

        debug!("Connected to {}:{}", config.address, config.port);
        Self::from_stream(stream)
    }

    /// Wraps an accepted or freshly connected stream and applies the
    /// low-latency socket options.
    pub(crate) fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true).map_err(|e| {
            TransportError::io(IoOperation::Configure, "Failed to set TCP_NODELAY", e)
        })?;

        // Best effort: some environments refuse IP_TOS and the link still
        // works without it.
        if let Err(e) = SockRef::from(&stream).set_tos(libc::IPTOS_LOWDELAY as u32) {
            warn!("Failed to set IP_TOS=LOWDELAY: {}", e);
        }

        Ok(Self { stream })
    }

    pub(crate) async fn read_timed(
        &mut self,
        buf: &mut [u8],
        limit: Duration,
    ) -> Result<usize, TransportError> {
        match timeout(limit, self.stream.read(buf)).await {
            Err(_) => Err(TransportError::Timeout { limit }),
            Ok(Ok(read)) => Ok(read),
            Ok(Err(e)) => Err(TransportError::io(
                IoOperation::Read,
                "Socket read failed",
                e,
            )),
        }
    }

    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream.write_all(buf).await.map_err(|e| {
            TransportError::io(IoOperation::Write, "Socket write failed", e)
        })
    }

    pub(crate) async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("Socket shutdown failed: {}", e);
        }
    }
}
