//! The communication context: one framing, one transport handle, the
//! timing tunables and the per-context transaction id.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::config::{ErrorRecovery, RtuConfig, TcpConfig, TimingConfig};
use crate::engine::{receive_frame, LengthHint};
use crate::errors::{ConfigError, IoOperation, ModbusError, TransportError};
use crate::frame::{finalize, FrameBuf};
use crate::transport::{Framing, RtuTransport, TcpTransport, Transport};

#[derive(Debug, Clone)]
enum Settings {
    Rtu(RtuConfig),
    Tcp(TcpConfig),
}

/// A Modbus endpoint over one serial line or one socket.
///
/// A context is created configured but unconnected, opened with
/// [`connect`](Context::connect) (or [`listen`](Context::listen) /
/// [`accept`](Context::accept) for a TCP slave), used for any number of
/// synchronous exchanges and then closed. It is owned by a single caller;
/// a new query must not be issued before the previous exchange returned.
#[derive(Debug)]
pub struct Context {
    framing: Framing,
    settings: Settings,
    timing: TimingConfig,
    debug: bool,
    next_tid: u16,
    transport: Option<Transport>,
    listener: Option<TcpListener>,
}

impl Context {
    pub fn new_rtu(config: RtuConfig) -> Self {
        Self::new(Framing::Rtu, Settings::Rtu(config))
    }

    pub fn new_tcp(config: TcpConfig) -> Self {
        Self::new(Framing::Tcp, Settings::Tcp(config))
    }

    fn new(framing: Framing, settings: Settings) -> Self {
        Self {
            framing,
            settings,
            timing: TimingConfig::default(),
            debug: false,
            next_tid: 0,
            transport: None,
            listener: None,
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn set_timing(&mut self, timing: TimingConfig) {
        self.timing = timing;
    }

    /// Enables hex dumps of every sent and received frame at debug level.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Opens the transport: the serial device for RTU, an outgoing
    /// connection for TCP.
    pub async fn connect(&mut self) -> Result<(), ModbusError> {
        self.timing.validate()?;

        let transport = match &self.settings {
            Settings::Rtu(config) => {
                config.validate()?;
                Transport::Rtu(RtuTransport::open(config)?)
            }
            Settings::Tcp(config) => {
                config.validate()?;
                Transport::Tcp(TcpTransport::connect(config).await?)
            }
        };

        self.transport = Some(transport);
        Ok(())
    }

    /// Binds the configured TCP endpoint with a backlog of one and returns
    /// the bound address. Only valid on a TCP context.
    pub async fn listen(&mut self) -> Result<SocketAddr, ModbusError> {
        let config = match &self.settings {
            Settings::Tcp(config) => config,
            Settings::Rtu(_) => {
                return Err(ConfigError::tcp("listen mode requires a TCP context").into())
            }
        };
        config.validate()?;
        self.timing.validate()?;

        let endpoint = format!("{}:{}", config.address, config.port);
        let addr: SocketAddr = endpoint
            .parse()
            .map_err(|_| ConfigError::tcp(format!("invalid endpoint: {endpoint}")))?;

        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .and_then(|socket| {
                socket.set_reuse_address(true)?;
                socket.bind(&addr.into())?;
                socket.listen(1)?;
                socket.set_nonblocking(true)?;
                Ok(socket)
            })
            .map_err(|e| TransportError::io(IoOperation::Listen, endpoint.clone(), e))?;

        let listener = TcpListener::from_std(socket.into())
            .map_err(|e| TransportError::io(IoOperation::Listen, endpoint.clone(), e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io(IoOperation::Listen, endpoint, e))?;

        debug!("Listening on {}", local_addr);
        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Waits for one client on the listening socket and makes its
    /// connection the context transport.
    pub async fn accept(&mut self) -> Result<SocketAddr, ModbusError> {
        let listener = self
            .listener
            .as_ref()
            .ok_or(TransportError::NotConnected)?;

        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| TransportError::io(IoOperation::Accept, "accept failed", e))?;

        debug!("Accepted client {}", peer);
        self.transport = Some(Transport::Tcp(TcpTransport::from_stream(stream)?));
        Ok(peer)
    }

    /// Shuts down the transport and the listening socket, if any.
    pub async fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }
        self.listener = None;
    }

    /// Next TCP transaction id: pre-incremented, so the first query of a
    /// context carries id 1, wrapping through 0 after 0xFFFF.
    pub(crate) fn next_tid(&mut self) -> u16 {
        self.next_tid = self.next_tid.wrapping_add(1);
        self.next_tid
    }

    pub(crate) async fn send_frame(&mut self, frame: &mut FrameBuf) -> Result<(), ModbusError> {
        if self.transport.is_none() {
            return Err(TransportError::NotConnected.into());
        }

        finalize(self.framing, frame);

        if self.debug {
            debug!("Sending {} frame: {:02X?}", self.framing, frame.as_slice());
        }

        let transport = self.transport.as_mut().ok_or(TransportError::NotConnected)?;
        if let Err(e) = transport.write_all(frame.as_slice()).await {
            self.recover_after_error().await;
            return Err(e.into());
        }

        Ok(())
    }

    pub(crate) async fn recv_frame(
        &mut self,
        hint: LengthHint,
        frame: &mut FrameBuf,
    ) -> Result<(), ModbusError> {
        let framing = self.framing;
        let timing = self.timing.clone();
        let transport = self.transport.as_mut().ok_or(TransportError::NotConnected)?;

        match receive_frame(transport, framing, hint, &timing, frame).await {
            Ok(()) => {
                if self.debug {
                    debug!("Received {} frame: {:02X?}", framing, frame.as_slice());
                }
                Ok(())
            }
            Err(e) => {
                // A quiet line is not a broken line: timeouts feed the
                // exception-reply heuristic and skip recovery.
                if !e.is_timeout() {
                    self.recover_after_error().await;
                }
                Err(e)
            }
        }
    }

    /// RTU recovery flushes the line buffers; a connecting TCP context
    /// under reconnect-on-error closes and dials again once.
    async fn recover_after_error(&mut self) {
        if let Some(transport) = self.transport.as_mut() {
            if matches!(transport, Transport::Rtu(_)) {
                transport.discard_buffers();
                return;
            }
        } else {
            return;
        }

        let config = match &self.settings {
            Settings::Tcp(config)
                if config.error_recovery == ErrorRecovery::ReconnectOnError
                    && self.listener.is_none() =>
            {
                config.clone()
            }
            _ => return,
        };

        warn!(
            "TCP exchange failed, reconnecting to {}:{}",
            config.address, config.port
        );

        if let Some(transport) = self.transport.take() {
            transport.close().await;
        }

        match TcpTransport::connect(&config).await {
            Ok(transport) => self.transport = Some(Transport::Tcp(transport)),
            Err(e) => error!("Reconnect failed: {}", e),
        }
    }
}
