//! API identifiers for XBee Series 1 frames.
//!
//! The identifier is the first byte of the frame data and selects the
//! layout of the rest of the frame.

/// Series 1 API frame identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ApiId {
    // Host to module (0x00-0x7F)
    /// Transmit request, 64-bit destination.
    Tx64 = 0x00,
    /// Transmit request, 16-bit destination.
    Tx16 = 0x01,
    /// Local AT command, applied immediately.
    AtCommand = 0x08,
    /// Local AT command, queued until `AC` or `WR`.
    AtCommandQueued = 0x09,
    /// Remote AT command request.
    RemoteAtCommand = 0x17,

    // Module to host (0x80-0xFF)
    /// Received data, 64-bit source.
    Rx64 = 0x80,
    /// Received data, 16-bit source.
    Rx16 = 0x81,
    /// Received I/O samples, 64-bit source.
    RxIo64 = 0x82,
    /// Received I/O samples, 16-bit source.
    RxIo16 = 0x83,
    /// Local AT command response.
    AtResponse = 0x88,
    /// Transmit status.
    TxStatus = 0x89,
    /// Modem status.
    ModemStatus = 0x8A,
    /// Remote AT command response.
    RemoteAtResponse = 0x97,
}

impl ApiId {
    /// Attempts to parse an identifier from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Tx64),
            0x01 => Some(Self::Tx16),
            0x08 => Some(Self::AtCommand),
            0x09 => Some(Self::AtCommandQueued),
            0x17 => Some(Self::RemoteAtCommand),
            0x80 => Some(Self::Rx64),
            0x81 => Some(Self::Rx16),
            0x82 => Some(Self::RxIo64),
            0x83 => Some(Self::RxIo16),
            0x88 => Some(Self::AtResponse),
            0x89 => Some(Self::TxStatus),
            0x8A => Some(Self::ModemStatus),
            0x97 => Some(Self::RemoteAtResponse),
            _ => None,
        }
    }

    /// Returns true if the module sends this frame to the host.
    #[must_use]
    pub const fn is_rx(&self) -> bool {
        (*self as u8) >= 0x80
    }

    /// Returns true if the host sends this frame to the module.
    #[must_use]
    pub const fn is_tx(&self) -> bool {
        !self.is_rx()
    }
}

impl From<ApiId> for u8 {
    fn from(id: ApiId) -> Self {
        id as Self
    }
}
