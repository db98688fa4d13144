//! Receive engine and frame size oracle.
//!
//! The master side knows the exact response size for each query it sends;
//! the slave side does not, and grows its expectation as the function code
//! and the multi-write byte count become visible. Both paths share one
//! read loop with a first-byte timeout and a shorter inter-byte timeout.

use tracing::trace;

use crate::config::TimingConfig;
use crate::errors::{FrameError, ModbusError, TransportError};
use crate::frame::{function, FrameBuf, MAX_FRAME_SIZE};
use crate::transport::{Framing, Transport};

/// How much of the incoming frame's length is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LengthHint {
    /// Master side: size computed from the query by the oracle.
    Known(usize),
    /// Slave side: size discovered incrementally while reading.
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiveState {
    /// Reading up to and including the function code.
    Function,
    /// Reading the fixed fields that follow the function code.
    Byte,
    /// The full frame length is known.
    Complete,
}

/// Expected size of the response to `query`, in bytes, including header
/// and checksum.
///
/// Pure in `(framing, function, count)`; reads nothing past the count
/// field.
pub(crate) fn expected_response_len(framing: Framing, query: &[u8]) -> usize {
    let h = framing.header_length();
    let checksum = framing.checksum_size();

    match query[h] {
        function::READ_COILS | function::READ_DISCRETE_INPUTS => {
            let count = usize::from(crate::frame::be16(query, h + 3));
            h + 2 + count.div_ceil(8) + checksum
        }
        function::READ_HOLDING_REGISTERS | function::READ_INPUT_REGISTERS => {
            let count = usize::from(crate::frame::be16(query, h + 3));
            h + 2 + 2 * count + checksum
        }
        function::READ_EXCEPTION_STATUS => h + 3 + checksum,
        // Write echoes and the report-slave-id placeholder.
        _ => h + 5 + checksum,
    }
}

/// Size of an exception response, the shortest legal reply.
pub(crate) fn exception_response_len(framing: Framing) -> usize {
    framing.header_length() + 2 + framing.checksum_size()
}

/// Fixed bytes that follow the function code of a query: address and
/// count/value for reads and single writes, plus the byte-count field for
/// multi-writes.
fn query_len_after_function(function: u8) -> usize {
    match function {
        function::READ_COILS
        | function::READ_DISCRETE_INPUTS
        | function::READ_HOLDING_REGISTERS
        | function::READ_INPUT_REGISTERS
        | function::WRITE_SINGLE_COIL
        | function::WRITE_SINGLE_REGISTER => 4,
        function::WRITE_MULTIPLE_COILS | function::WRITE_MULTIPLE_REGISTERS => 5,
        _ => 0,
    }
}

/// Variable remainder of a query once its fixed fields are in: the
/// multi-write payload announced by the byte-count field, then the
/// checksum.
fn query_len_after_meta(framing: Framing, frame: &[u8]) -> usize {
    let h = framing.header_length();
    let data = match frame[h] {
        function::WRITE_MULTIPLE_COILS | function::WRITE_MULTIPLE_REGISTERS => {
            usize::from(frame[h + 5])
        }
        _ => 0,
    };
    data + framing.checksum_size()
}

/// Reads one frame into `frame`.
///
/// Returns `Timeout` when the line goes quiet before the expected size is
/// reached; the bytes read so far stay in `frame` for the caller's
/// exception-reply heuristic. A zero-byte read maps to `ConnectionClosed`,
/// and an expectation beyond [`MAX_FRAME_SIZE`] to `TooManyData`.
pub(crate) async fn receive_frame(
    transport: &mut Transport,
    framing: Framing,
    hint: LengthHint,
    timing: &TimingConfig,
    frame: &mut FrameBuf,
) -> Result<(), ModbusError> {
    frame.clear();

    let (mut expected, mut state) = match hint {
        LengthHint::Known(size) => (size, ReceiveState::Complete),
        LengthHint::Undefined => (framing.header_length() + 1, ReceiveState::Function),
    };

    let first_byte_timeout = match hint {
        LengthHint::Known(_) => timing.response_timeout,
        LengthHint::Undefined => timing.request_timeout,
    };

    loop {
        if expected > MAX_FRAME_SIZE {
            return Err(FrameError::TooManyData {
                size: expected,
                max: MAX_FRAME_SIZE,
            }
            .into());
        }

        while frame.len() < expected {
            let limit = if frame.len() == 0 {
                first_byte_timeout
            } else {
                timing.byte_timeout
            };

            let read = transport.read_timed(frame.window(expected), limit).await?;
            if read == 0 {
                return Err(TransportError::ConnectionClosed.into());
            }
            frame.advance(read);
            trace!(received = frame.len(), expected, "frame bytes accumulated");
        }

        state = match state {
            ReceiveState::Complete => break,
            ReceiveState::Function => {
                expected += query_len_after_function(frame[framing.header_length()]);
                ReceiveState::Byte
            }
            ReceiveState::Byte => {
                expected += query_len_after_meta(framing, frame.as_slice());
                ReceiveState::Complete
            }
        };
    }

    Ok(())
}
