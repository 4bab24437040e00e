//! Error types.

use meshcore_packet::PacketError;
use thiserror::Error;

/// Failure to decode or encode a single frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame payload carried no code byte.
    #[error("empty frame")]
    EmptyFrame,

    /// Payload does not fit in a frame.
    #[error("frame too long: maximum {max} bytes, got {actual}")]
    FrameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// Unknown response or push code.
    #[error("unknown response code: 0x{0:02X}")]
    UnknownResponse(u8),

    /// Invalid data in frame.
    #[error("invalid frame data: {0}")]
    InvalidData(String),

    /// A field read ran past the end of the frame.
    #[error("decode failed: {0}")]
    Decode(#[from] PacketError),
}

/// Reason byte carried by an `Err` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareErrorCode {
    UnsupportedCommand,
    NotFound,
    TableFull,
    BadState,
    FileIoError,
    IllegalArg,
    Unknown(u8),
}

impl std::fmt::Display for FirmwareErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirmwareErrorCode::UnsupportedCommand => write!(f, "unsupported command"),
            FirmwareErrorCode::NotFound => write!(f, "not found"),
            FirmwareErrorCode::TableFull => write!(f, "table full"),
            FirmwareErrorCode::BadState => write!(f, "bad state"),
            FirmwareErrorCode::FileIoError => write!(f, "file I/O error"),
            FirmwareErrorCode::IllegalArg => write!(f, "illegal argument"),
            FirmwareErrorCode::Unknown(code) => write!(f, "unknown error (0x{:02X})", code),
        }
    }
}

impl From<u8> for FirmwareErrorCode {
    fn from(code: u8) -> Self {
        use crate::constants::*;
        match code {
            ERR_CODE_UNSUPPORTED_CMD => FirmwareErrorCode::UnsupportedCommand,
            ERR_CODE_NOT_FOUND => FirmwareErrorCode::NotFound,
            ERR_CODE_TABLE_FULL => FirmwareErrorCode::TableFull,
            ERR_CODE_BAD_STATE => FirmwareErrorCode::BadState,
            ERR_CODE_FILE_IO_ERROR => FirmwareErrorCode::FileIoError,
            ERR_CODE_ILLEGAL_ARG => FirmwareErrorCode::IllegalArg,
            _ => FirmwareErrorCode::Unknown(code),
        }
    }
}

impl From<FirmwareErrorCode> for u8 {
    fn from(code: FirmwareErrorCode) -> Self {
        use crate::constants::*;
        match code {
            FirmwareErrorCode::UnsupportedCommand => ERR_CODE_UNSUPPORTED_CMD,
            FirmwareErrorCode::NotFound => ERR_CODE_NOT_FOUND,
            FirmwareErrorCode::TableFull => ERR_CODE_TABLE_FULL,
            FirmwareErrorCode::BadState => ERR_CODE_BAD_STATE,
            FirmwareErrorCode::FileIoError => ERR_CODE_FILE_IO_ERROR,
            FirmwareErrorCode::IllegalArg => ERR_CODE_ILLEGAL_ARG,
            FirmwareErrorCode::Unknown(code) => code,
        }
    }
}

/// Failure reported by a [`Transport`](crate::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was never opened or has already been opened.
    #[error("transport not open")]
    NotOpen,

    /// The link went away.
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

/// Why an operation on a [`Connection`](crate::Connection) failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Writing to or opening the transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The device rejected the command.
    #[error("device rejected command: {}", reason_text(.0))]
    Firmware(Option<FirmwareErrorCode>),

    /// No correlated reply arrived in time.
    #[error("timed out waiting for device")]
    Timeout,

    /// The feature is turned off on the device.
    #[error("feature disabled on device")]
    Disabled,

    /// A reply could not be decoded.
    #[error("malformed reply: {0}")]
    Malformed(#[from] ProtocolError),

    /// Data exceeds the length the device accepts.
    #[error("data too long: {len} bytes (device accepts {max})")]
    DataTooLong {
        /// Length of the caller's data.
        len: usize,
        /// Maximum declared by the device.
        max: usize,
    },

    /// Caller input the wire format cannot carry.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The event bus backing the operation is gone.
    #[error("connection closed")]
    Closed,
}

fn reason_text(reason: &Option<FirmwareErrorCode>) -> String {
    match reason {
        Some(code) => code.to_string(),
        None => "no reason given".to_string(),
    }
}

impl From<PacketError> for Error {
    fn from(err: PacketError) -> Self {
        Error::Malformed(ProtocolError::Decode(err))
    }
}

/// Result type for connection operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_code_mapping() {
        for code in 1..=6u8 {
            let mapped = FirmwareErrorCode::from(code);
            assert!(!matches!(mapped, FirmwareErrorCode::Unknown(_)));
            assert_eq!(u8::from(mapped), code);
        }
        assert_eq!(FirmwareErrorCode::from(42), FirmwareErrorCode::Unknown(42));
        assert_eq!(u8::from(FirmwareErrorCode::Unknown(42)), 42);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Firmware(Some(FirmwareErrorCode::NotFound));
        assert_eq!(err.to_string(), "device rejected command: not found");

        let err = Error::Firmware(None);
        assert_eq!(err.to_string(), "device rejected command: no reason given");

        let err = Error::DataTooLong { len: 10, max: 8 };
        assert!(err.to_string().contains("10 bytes"));

        let err: Error = PacketError::truncated(3, 4, 1).into();
        assert!(matches!(err, Error::Malformed(ProtocolError::Decode(_))));
    }
}
