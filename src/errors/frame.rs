use thiserror::Error;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("CRC error: calculated={calculated:04X}, received={received:04X}, frame={frame_hex}")]
    Crc {
        calculated: u16,
        received: u16,
        frame_hex: String,
    },

    #[error("Frame overflow: {size} bytes, limit is {max}")]
    TooManyData { size: usize, max: usize },

    #[error("Frame too short: {size} bytes - {details}")]
    TooShort { size: usize, details: String },

    #[error("Invalid exception code {code:#04X}")]
    InvalidExceptionCode { code: u8 },

    #[error("Unexpected response: function {received:#04X} does not answer {expected:#04X}")]
    UnexpectedResponse { expected: u8, received: u8 },
}

impl FrameError {
    pub fn crc(calculated: u16, received: u16, frame: &[u8]) -> Self {
        Self::Crc {
            calculated,
            received,
            frame_hex: hex::encode(frame),
        }
    }

    pub fn too_short(size: usize, details: impl Into<String>) -> Self {
        Self::TooShort {
            size,
            details: details.into(),
        }
    }
}
