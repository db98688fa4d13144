//! CRC-16 for Modbus RTU framing.
//!
//! Polynomial x^16 + x^15 + x^2 + 1 (0xA001 reflected), initial value
//! 0xFFFF. The byte-at-a-time loop runs over two 256-entry tables, one per
//! result byte, derived from the polynomial at compile time.

use crate::errors::FrameError;
use crate::transport::Framing;

const fn crc16_tables() -> ([u8; 256], [u8; 256]) {
    let mut hi = [0u8; 256];
    let mut lo = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
            bit += 1;
        }
        hi[i] = (crc >> 8) as u8;
        lo[i] = (crc & 0xFF) as u8;
        i += 1;
    }
    (hi, lo)
}

static CRC16_TABLES: ([u8; 256], [u8; 256]) = crc16_tables();

/// Computes the CRC of `data`.
///
/// The returned value is the arithmetic CRC; RTU frames carry it low byte
/// first, so it is appended with `to_le_bytes` and verified with
/// `from_le_bytes`.
pub fn crc16(data: &[u8]) -> u16 {
    let (table_hi, table_lo) = &CRC16_TABLES;
    let mut hi: u8 = 0xFF;
    let mut lo: u8 = 0xFF;

    for &byte in data {
        let idx = usize::from(lo ^ byte);
        lo = hi ^ table_lo[idx];
        hi = table_hi[idx];
    }

    u16::from(hi) << 8 | u16::from(lo)
}

/// Verifies the trailing CRC of a received frame.
///
/// TCP framing carries no checksum, so every TCP frame passes.
pub fn check_crc(framing: Framing, frame: &[u8]) -> Result<(), FrameError> {
    if framing == Framing::Tcp {
        return Ok(());
    }

    if frame.len() < 4 {
        return Err(FrameError::too_short(
            frame.len(),
            "RTU frame shorter than address, function and CRC",
        ));
    }

    let payload = &frame[..frame.len() - 2];
    let calculated = crc16(payload);
    let received = u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);

    if calculated != received {
        return Err(FrameError::crc(calculated, received, payload));
    }

    Ok(())
}
