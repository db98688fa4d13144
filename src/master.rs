//! Master-side verbs.
//!
//! Every operation shares one skeleton: build the query, send it, then
//! [`check_response`](Context::check_response) drives the receive engine
//! with the oracle's expected size and validates what came back before the
//! function-specific decode runs.

use crate::context::Context;
use crate::crc::check_crc;
use crate::engine::{exception_response_len, expected_response_len, LengthHint};
use crate::errors::{ExceptionCode, FrameError, ModbusError};
use crate::frame::{
    function, start_query, unpack_bits, FrameBuf, COIL_OFF, COIL_ON, MAX_READ_BITS,
    MAX_READ_REGISTERS, MAX_WRITE_BITS, MAX_WRITE_REGISTERS,
};

impl Context {
    /// Reads `count` coils starting at `address` into `dest`.
    ///
    /// Returns the number of decoded values. Panics if `dest` holds fewer
    /// than `count` slots.
    pub async fn read_coils(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [bool],
    ) -> Result<usize, ModbusError> {
        self.read_bits(function::READ_COILS, slave, address, count, dest)
            .await
    }

    /// Reads `count` discrete inputs starting at `address` into `dest`.
    pub async fn read_discrete_inputs(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [bool],
    ) -> Result<usize, ModbusError> {
        self.read_bits(function::READ_DISCRETE_INPUTS, slave, address, count, dest)
            .await
    }

    /// Reads `count` holding registers starting at `address` into `dest`.
    pub async fn read_holding_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError> {
        self.read_registers(function::READ_HOLDING_REGISTERS, slave, address, count, dest)
            .await
    }

    /// Reads `count` input registers starting at `address` into `dest`.
    pub async fn read_input_registers(
        &mut self,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError> {
        self.read_registers(function::READ_INPUT_REGISTERS, slave, address, count, dest)
            .await
    }

    /// Switches a single coil on or off. The slave echoes the query.
    pub async fn write_single_coil(
        &mut self,
        slave: u8,
        address: u16,
        state: bool,
    ) -> Result<(), ModbusError> {
        let value = if state { COIL_ON } else { COIL_OFF };
        self.write_single(function::WRITE_SINGLE_COIL, slave, address, value)
            .await
    }

    /// Writes one holding register. The slave echoes the query.
    pub async fn write_single_register(
        &mut self,
        slave: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        self.write_single(function::WRITE_SINGLE_REGISTER, slave, address, value)
            .await
    }

    /// Writes a run of coils. Returns the count confirmed by the slave.
    pub async fn write_multiple_coils(
        &mut self,
        slave: u8,
        address: u16,
        states: &[bool],
    ) -> Result<usize, ModbusError> {
        if states.len() > usize::from(MAX_WRITE_BITS) {
            return Err(FrameError::TooManyData {
                size: states.len(),
                max: usize::from(MAX_WRITE_BITS),
            }
            .into());
        }

        let count = states.len() as u16;
        let tid = self.next_tid();
        let mut query = start_query(
            self.framing(),
            tid,
            slave,
            function::WRITE_MULTIPLE_COILS,
        );
        query.push_u16(address);
        query.push_u16(count);
        query.push(states.len().div_ceil(8) as u8);
        crate::frame::pack_bits(states, &mut query);

        self.send_frame(&mut query).await?;
        let response = self.check_response(&query).await?;

        let h = self.framing().header_length();
        Ok(usize::from(crate::frame::be16(response.as_slice(), h + 3)))
    }

    /// Writes a run of holding registers. Returns the count confirmed by
    /// the slave.
    pub async fn write_multiple_registers(
        &mut self,
        slave: u8,
        address: u16,
        values: &[u16],
    ) -> Result<usize, ModbusError> {
        if values.len() > usize::from(MAX_WRITE_REGISTERS) {
            return Err(FrameError::TooManyData {
                size: values.len(),
                max: usize::from(MAX_WRITE_REGISTERS),
            }
            .into());
        }

        let count = values.len() as u16;
        let tid = self.next_tid();
        let mut query = start_query(
            self.framing(),
            tid,
            slave,
            function::WRITE_MULTIPLE_REGISTERS,
        );
        query.push_u16(address);
        query.push_u16(count);
        query.push((values.len() * 2) as u8);
        for &value in values {
            query.push_u16(value);
        }

        self.send_frame(&mut query).await?;
        let response = self.check_response(&query).await?;

        let h = self.framing().header_length();
        Ok(usize::from(crate::frame::be16(response.as_slice(), h + 3)))
    }

    /// Asks the slave to identify itself; the device-specific reply bytes
    /// are copied into `dest` as-is.
    ///
    /// Returns the number of bytes copied. Panics if `dest` is too small
    /// for the reply payload.
    pub async fn report_slave_id(
        &mut self,
        slave: u8,
        dest: &mut [u8],
    ) -> Result<usize, ModbusError> {
        let tid = self.next_tid();
        let mut query = start_query(self.framing(), tid, slave, function::REPORT_SLAVE_ID);

        self.send_frame(&mut query).await?;
        let response = self.check_response(&query).await?;

        let h = self.framing().header_length();
        let end = response.len() - self.framing().checksum_size();
        let payload = &response.as_slice()[h + 1..end];

        assert!(
            dest.len() >= payload.len(),
            "destination buffer shorter than the reply payload"
        );
        dest[..payload.len()].copy_from_slice(payload);
        Ok(payload.len())
    }

    async fn read_bits(
        &mut self,
        function: u8,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [bool],
    ) -> Result<usize, ModbusError> {
        if count > MAX_READ_BITS {
            return Err(FrameError::TooManyData {
                size: usize::from(count),
                max: usize::from(MAX_READ_BITS),
            }
            .into());
        }
        assert!(
            dest.len() >= usize::from(count),
            "destination buffer shorter than the requested count"
        );

        let tid = self.next_tid();
        let mut query = start_query(self.framing(), tid, slave, function);
        query.push_u16(address);
        query.push_u16(count);

        self.send_frame(&mut query).await?;
        let response = self.check_response(&query).await?;

        let h = self.framing().header_length();
        let byte_count = usize::from(response[h + 1]);
        let data = &response.as_slice()[h + 2..h + 2 + byte_count];
        unpack_bits(data, usize::from(count), dest);

        Ok(usize::from(count))
    }

    async fn read_registers(
        &mut self,
        function: u8,
        slave: u8,
        address: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError> {
        if count > MAX_READ_REGISTERS {
            return Err(FrameError::TooManyData {
                size: usize::from(count),
                max: usize::from(MAX_READ_REGISTERS),
            }
            .into());
        }
        assert!(
            dest.len() >= usize::from(count),
            "destination buffer shorter than the requested count"
        );

        let tid = self.next_tid();
        let mut query = start_query(self.framing(), tid, slave, function);
        query.push_u16(address);
        query.push_u16(count);

        self.send_frame(&mut query).await?;
        let response = self.check_response(&query).await?;

        let h = self.framing().header_length();
        for (i, slot) in dest.iter_mut().enumerate().take(usize::from(count)) {
            *slot = crate::frame::be16(response.as_slice(), h + 2 + 2 * i);
        }

        Ok(usize::from(count))
    }

    async fn write_single(
        &mut self,
        function: u8,
        slave: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ModbusError> {
        let tid = self.next_tid();
        let mut query = start_query(self.framing(), tid, slave, function);
        query.push_u16(address);
        query.push_u16(value);

        self.send_frame(&mut query).await?;
        self.check_response(&query).await?;
        Ok(())
    }

    /// Receives and validates the response to `query`.
    ///
    /// A clean receive still has to pass the CRC check and carry the
    /// expected function code. A mid-frame timeout that left exactly an
    /// exception reply's worth of bytes is re-examined for a flagged
    /// function code before the timeout is surfaced.
    async fn check_response(&mut self, query: &FrameBuf) -> Result<FrameBuf, ModbusError> {
        let framing = self.framing();
        let h = framing.header_length();
        let expected = expected_response_len(framing, query.as_slice());
        let query_function = query[h];

        let mut response = FrameBuf::new();
        let received = self
            .recv_frame(LengthHint::Known(expected), &mut response)
            .await;

        match received {
            Ok(()) => {
                check_crc(framing, response.as_slice())?;
                self.validate_echo(query_function, &response)?;
                Ok(response)
            }
            Err(e) if e.is_timeout() && response.len() == exception_response_len(framing) => {
                check_crc(framing, response.as_slice())?;
                if response[h] == query_function | function::EXCEPTION_FLAG {
                    Err(self.exception_from(&response))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn validate_echo(
        &self,
        query_function: u8,
        response: &FrameBuf,
    ) -> Result<(), ModbusError> {
        let h = self.framing().header_length();
        let response_function = response[h];

        if response_function == query_function {
            Ok(())
        } else if response_function == query_function | function::EXCEPTION_FLAG {
            Err(self.exception_from(response))
        } else {
            Err(FrameError::UnexpectedResponse {
                expected: query_function,
                received: response_function,
            }
            .into())
        }
    }

    fn exception_from(&self, response: &FrameBuf) -> ModbusError {
        let code = response[self.framing().header_length() + 1];
        match ExceptionCode::from_code(code) {
            Some(code) => ModbusError::Exception(code),
            None => FrameError::InvalidExceptionCode { code }.into(),
        }
    }
}
