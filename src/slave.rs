//! Slave-side dispatch over a caller-owned [`Mapping`].

use tracing::{debug, trace};

use crate::context::Context;
use crate::crc::check_crc;
use crate::engine::LengthHint;
use crate::errors::{ExceptionCode, ModbusError};
use crate::frame::{
    be16, build_exception, function, pack_bits, start_response, unpack_bits, FrameBuf, COIL_OFF,
    COIL_ON, MAX_READ_BITS, MAX_READ_REGISTERS, MAX_WRITE_BITS, MAX_WRITE_REGISTERS,
};
use crate::mapping::Mapping;
use crate::transport::Framing;

impl Context {
    /// Receives one query, serves it from `mapping` and sends the reply.
    ///
    /// Returns once the reply (normal or exception) is on the wire. A
    /// query that fails the CRC check is dropped without a reply, as the
    /// sender cannot be trusted to be the addressee of one.
    pub async fn serve_request(&mut self, mapping: &mut Mapping) -> Result<(), ModbusError> {
        let mut query = FrameBuf::new();
        self.recv_frame(LengthHint::Undefined, &mut query).await?;
        check_crc(self.framing(), query.as_slice())?;

        let mut reply = build_reply(self.framing(), query.as_slice(), mapping);
        self.send_frame(&mut reply).await
    }
}

/// Dispatches one validated query against the mapping and produces the
/// un-finalized reply frame.
///
/// Validation order per function: known function code first, then value
/// ranges, then `address + count` against the destination table.
pub(crate) fn build_reply(framing: Framing, query: &[u8], mapping: &mut Mapping) -> FrameBuf {
    let h = framing.header_length();
    trace!(
        "Dispatching function {:#04X} for unit {}",
        query[h],
        query[framing.unit_offset()]
    );

    match query[h] {
        function::READ_COILS => read_bits_reply(framing, query, mapping.coils()),
        function::READ_DISCRETE_INPUTS => read_bits_reply(framing, query, mapping.discrete_inputs()),
        function::READ_HOLDING_REGISTERS => {
            read_registers_reply(framing, query, mapping.holding_registers())
        }
        function::READ_INPUT_REGISTERS => {
            read_registers_reply(framing, query, mapping.input_registers())
        }
        function::WRITE_SINGLE_COIL => write_single_coil_reply(framing, query, mapping),
        function::WRITE_SINGLE_REGISTER => write_single_register_reply(framing, query, mapping),
        function::WRITE_MULTIPLE_COILS => write_multiple_coils_reply(framing, query, mapping),
        function::WRITE_MULTIPLE_REGISTERS => {
            write_multiple_registers_reply(framing, query, mapping)
        }
        _ => reject(framing, query, ExceptionCode::IllegalFunction),
    }
}

fn reject(framing: Framing, query: &[u8], code: ExceptionCode) -> FrameBuf {
    debug!(
        "Query for function {:#04X} rejected: {}",
        query[framing.header_length()],
        code
    );
    build_exception(framing, query, code.code())
}

fn read_bits_reply(framing: Framing, query: &[u8], table: &[bool]) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let count = be16(query, h + 3);

    if count > MAX_READ_BITS {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    let count = usize::from(count);
    if address + count > table.len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    let mut reply = start_response(framing, query, query[h]);
    reply.push(count.div_ceil(8) as u8);
    pack_bits(&table[address..address + count], &mut reply);
    reply
}

fn read_registers_reply(framing: Framing, query: &[u8], table: &[u16]) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let count = be16(query, h + 3);

    if count > MAX_READ_REGISTERS {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    let count = usize::from(count);
    if address + count > table.len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    let mut reply = start_response(framing, query, query[h]);
    reply.push((2 * count) as u8);
    for &word in &table[address..address + count] {
        reply.push_u16(word);
    }
    reply
}

fn write_single_coil_reply(framing: Framing, query: &[u8], mapping: &mut Mapping) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let value = be16(query, h + 3);

    let state = match value {
        COIL_ON => true,
        COIL_OFF => false,
        _ => return reject(framing, query, ExceptionCode::IllegalDataValue),
    };
    if address >= mapping.coils().len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    mapping.coils_mut()[address] = state;

    // Echo the request; the checksum is recomputed when the reply is
    // finalized, never copied from the query.
    let mut reply = start_response(framing, query, query[h]);
    reply.push_u16(address as u16);
    reply.push_u16(value);
    reply
}

fn write_single_register_reply(framing: Framing, query: &[u8], mapping: &mut Mapping) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let value = be16(query, h + 3);

    if address >= mapping.holding_registers().len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    mapping.holding_registers_mut()[address] = value;

    let mut reply = start_response(framing, query, query[h]);
    reply.push_u16(address as u16);
    reply.push_u16(value);
    reply
}

fn write_multiple_coils_reply(framing: Framing, query: &[u8], mapping: &mut Mapping) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let count = be16(query, h + 3);
    let byte_count = usize::from(query[h + 5]);

    if count == 0 || count > MAX_WRITE_BITS {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    let count_usize = usize::from(count);
    if byte_count != count_usize.div_ceil(8) {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    if address + count_usize > mapping.coils().len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    let data = &query[h + 6..h + 6 + byte_count];
    unpack_bits(
        data,
        count_usize,
        &mut mapping.coils_mut()[address..address + count_usize],
    );

    let mut reply = start_response(framing, query, query[h]);
    reply.push_u16(address as u16);
    reply.push_u16(count);
    reply
}

fn write_multiple_registers_reply(
    framing: Framing,
    query: &[u8],
    mapping: &mut Mapping,
) -> FrameBuf {
    let h = framing.header_length();
    let address = usize::from(be16(query, h + 1));
    let count = be16(query, h + 3);
    let byte_count = usize::from(query[h + 5]);

    if count == 0 || count > MAX_WRITE_REGISTERS {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    let count_usize = usize::from(count);
    if byte_count != 2 * count_usize {
        return reject(framing, query, ExceptionCode::IllegalDataValue);
    }
    if address + count_usize > mapping.holding_registers().len() {
        return reject(framing, query, ExceptionCode::IllegalDataAddress);
    }

    for i in 0..count_usize {
        mapping.holding_registers_mut()[address + i] = be16(query, h + 6 + 2 * i);
    }

    let mut reply = start_response(framing, query, query[h]);
    reply.push_u16(address as u16);
    reply.push_u16(count);
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::crc16;
    use crate::frame::finalize;

    fn rtu_frame(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        frame.extend_from_slice(&crc16(body).to_le_bytes());
        frame
    }

    fn finalized(framing: Framing, query: &[u8], mapping: &mut Mapping) -> Vec<u8> {
        let mut reply = build_reply(framing, query, mapping);
        finalize(framing, &mut reply);
        reply.as_slice().to_vec()
    }

    #[test]
    fn test_read_holding_registers_reply() {
        let mut mapping = Mapping::new(0, 0, 10, 0);
        mapping.holding_registers_mut()[0] = 0x1234;
        mapping.holding_registers_mut()[1] = 0x5678;

        let query = rtu_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(&reply[..7], &[0x01, 0x03, 0x04, 0x12, 0x34, 0x56, 0x78]);
        assert!(check_crc(Framing::Rtu, &reply).is_ok());
    }

    #[test]
    fn test_write_single_coil_echoes_query_with_fresh_crc() {
        let mut mapping = Mapping::new(32, 0, 0, 0);

        let query = rtu_frame(&[0x01, 0x05, 0x00, 0x10, 0xFF, 0x00]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(reply, query);
        assert!(mapping.coils()[0x10]);

        let query = rtu_frame(&[0x01, 0x05, 0x00, 0x10, 0x00, 0x00]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);
        assert_eq!(reply, query);
        assert!(!mapping.coils()[0x10]);
    }

    #[test]
    fn test_out_of_range_read_is_illegal_data_address() {
        let mut mapping = Mapping::new(0, 0, 10, 0);

        let query = rtu_frame(&[0x01, 0x03, 0xFF, 0x00, 0x00, 0x01]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(&reply[..3], &[0x01, 0x83, 0x02]);
        assert_eq!(reply.len(), 5);
        assert!(check_crc(Framing::Rtu, &reply).is_ok());
    }

    #[test]
    fn test_write_multiple_registers_stores_and_confirms() {
        let mut mapping = Mapping::new(0, 0, 10, 0);

        let query = rtu_frame(&[
            0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02,
        ]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(mapping.holding_registers()[0], 0x000A);
        assert_eq!(mapping.holding_registers()[1], 0x0102);
        assert_eq!(&reply[..6], &[0x01, 0x10, 0x00, 0x00, 0x00, 0x02]);
    }

    #[test]
    fn test_tcp_read_coils_reply_bytes() {
        let mut mapping = Mapping::new(8, 0, 0, 0);
        let bits = [true, false, true, true, false, false, false, true];
        mapping.coils_mut().copy_from_slice(&bits);

        let query = [
            0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x01, 0x01, 0x00, 0x00, 0x00, 0x08,
        ];
        let reply = finalized(Framing::Tcp, &query, &mut mapping);

        assert_eq!(
            reply,
            &[0x00, 0x05, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x8D]
        );
    }

    #[test]
    fn test_unsupported_functions_rejected() {
        let mut mapping = Mapping::new(8, 8, 8, 8);

        for function in [0x07, 0x11, 0x2B] {
            let query = rtu_frame(&[0x01, function]);
            let reply = finalized(Framing::Rtu, &query, &mut mapping);
            assert_eq!(&reply[..3], &[0x01, function | 0x80, 0x01]);
        }
    }

    #[test]
    fn test_bad_coil_value_is_illegal_data_value() {
        let mut mapping = Mapping::new(32, 0, 0, 0);

        let query = rtu_frame(&[0x01, 0x05, 0x00, 0x10, 0x12, 0x34]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(&reply[..3], &[0x01, 0x85, 0x03]);
        assert!(!mapping.coils()[0x10]);
    }

    #[test]
    fn test_oversized_read_count_is_illegal_data_value() {
        let mut mapping = Mapping::new(0, 0, 10, 0);

        // 126 registers exceeds the per-read limit.
        let query = rtu_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x7E]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);
        assert_eq!(&reply[..3], &[0x01, 0x83, 0x03]);
    }

    #[test]
    fn test_byte_count_mismatch_rejected() {
        let mut mapping = Mapping::new(0, 0, 10, 0);

        // Count says 2 registers but the byte count field says 2 bytes.
        let query = rtu_frame(&[0x01, 0x10, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x0A]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);
        assert_eq!(&reply[..3], &[0x01, 0x90, 0x03]);
        assert_eq!(mapping.holding_registers()[0], 0);
    }

    #[test]
    fn test_zero_count_read_returns_empty_payload() {
        let mut mapping = Mapping::new(8, 0, 0, 0);

        let query = rtu_frame(&[0x01, 0x01, 0x00, 0x00, 0x00, 0x00]);
        let reply = finalized(Framing::Rtu, &query, &mut mapping);

        assert_eq!(&reply[..3], &[0x01, 0x01, 0x00]);
        assert_eq!(reply.len(), 5);
    }
}
