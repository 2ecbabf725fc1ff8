//! Error types for the xbee library.

use thiserror::Error;

/// The main error type for xbee operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A received frame has the wrong length for its identifier.
    #[error("frame 0x{identifier:02x} has invalid length {len}")]
    Length { identifier: u8, len: usize },

    /// Timed out waiting for a transmit status.
    #[error("timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The link is not initialized.
    #[error("not connected")]
    NotConnected,

    /// An internal channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// No mode is registered under this name.
    #[error("unknown mode: {name}")]
    UnknownMode { name: String },

    /// The mode has no connection type with this name.
    #[error("unknown connection type: {name}")]
    UnknownConType { name: String },

    /// No connection type handles this API identifier.
    #[error("unknown API identifier 0x{0:02x}")]
    UnknownIdentifier(u8),

    /// The connection type does not support the operation.
    #[error("{con_type} does not support {operation}")]
    NotSupported {
        con_type: &'static str,
        operation: &'static str,
    },

    /// The address does not satisfy the connection type's rule.
    #[error("invalid address for {con_type}: {reason}")]
    InvalidAddress {
        con_type: &'static str,
        reason: &'static str,
    },

    /// Invalid parameter passed to an operation.
    #[error("invalid parameter: {reason}")]
    InvalidParam { reason: String },

    /// Invalid link configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// All frame IDs are waiting for a status.
    #[error("no free frame ID")]
    NoFreeFrameId,

    /// The module reported a non-zero transmit or AT status.
    #[error("{con_type} transmission failed with status 0x{status:02x}")]
    TxFailed { con_type: &'static str, status: u8 },
}

/// Frame-specific errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame has a zero length field.
    #[error("empty frame")]
    Empty,

    /// Frame payload exceeds maximum size.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// A start delimiter arrived before the current frame was complete.
    #[error("truncated frame: start delimiter after {got} bytes")]
    Truncated { got: usize },

    /// Checksum does not match the frame data.
    #[error("checksum mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    ChecksumMismatch { expected: u8, got: u8 },
}

/// Result type alias for xbee operations.
pub type Result<T> = std::result::Result<T, Error>;
