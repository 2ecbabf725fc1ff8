//! Received packets and status codes.

use bytes::Bytes;

use crate::types::address::ConAddress;
use crate::types::io::IoSamples;

/// Receive option: sent to the broadcast address.
pub const RX_OPT_ADDRESS_BROADCAST: u8 = 0x02;

/// Receive option: sent to the broadcast PAN.
pub const RX_OPT_PAN_BROADCAST: u8 = 0x04;

/// A packet delivered to a connection.
///
/// Which fields are set depends on the connection type: data frames
/// carry `rssi`, `options` and `data`; AT responses carry `frame_id`,
/// `at_command`, `status` and `data`; I/O frames carry `io`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    /// Remote end the packet came from.
    pub address: ConAddress,
    /// Frame ID echoed by the module.
    pub frame_id: Option<u8>,
    /// Status byte (AT status or modem status).
    pub status: Option<u8>,
    /// Received signal strength as -dBm.
    pub rssi: Option<u8>,
    /// Receive options bit field.
    pub options: u8,
    /// AT command the response belongs to.
    pub at_command: Option<[u8; 2]>,
    /// Payload or AT register value.
    pub data: Bytes,
    /// Decoded I/O samples.
    pub io: Option<IoSamples>,
}

impl Packet {
    /// Returns the signal strength in dBm.
    #[must_use]
    pub fn rssi_dbm(&self) -> Option<i16> {
        self.rssi.map(|r| -i16::from(r))
    }

    /// Returns true if the packet was sent to the broadcast address.
    #[must_use]
    pub const fn is_broadcast(&self) -> bool {
        self.options & RX_OPT_ADDRESS_BROADCAST != 0
    }

    /// Returns true if the packet was sent to the broadcast PAN.
    #[must_use]
    pub const fn is_pan_broadcast(&self) -> bool {
        self.options & RX_OPT_PAN_BROADCAST != 0
    }

    /// Returns the AT command as text, if this is an AT response.
    #[must_use]
    pub fn at_command_str(&self) -> Option<String> {
        self.at_command
            .map(|cmd| String::from_utf8_lossy(&cmd).into_owned())
    }

    /// Returns the AT status, if this is an AT response.
    #[must_use]
    pub fn at_status(&self) -> Option<AtStatus> {
        self.at_command.and(self.status).map(AtStatus::from_byte)
    }
}

/// Status reported in a transmit status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Delivered.
    Success,
    /// No acknowledgement from the remote.
    NoAck,
    /// Clear channel assessment failed.
    CcaFailure,
    /// Purged (coordinator timed out an indirect transmission).
    Purged,
    /// A status this library does not know.
    Other(u8),
}

impl TxStatus {
    /// Parses a status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Success,
            1 => Self::NoAck,
            2 => Self::CcaFailure,
            3 => Self::Purged,
            other => Self::Other(other),
        }
    }
}

/// Status reported in an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtStatus {
    /// Command accepted.
    Ok,
    /// Command failed.
    Error,
    /// Unknown command.
    InvalidCommand,
    /// Parameter out of range.
    InvalidParameter,
    /// Remote module did not respond.
    NoResponse,
    /// A status this library does not know.
    Other(u8),
}

impl AtStatus {
    /// Parses a status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::Ok,
            1 => Self::Error,
            2 => Self::InvalidCommand,
            3 => Self::InvalidParameter,
            4 => Self::NoResponse,
            other => Self::Other(other),
        }
    }
}

/// Status reported in a modem status frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemStatus {
    /// Hardware reset.
    HardwareReset,
    /// Watchdog timer reset.
    WatchdogReset,
    /// Associated with a coordinator.
    Associated,
    /// Disassociated.
    Disassociated,
    /// Synchronization lost.
    SyncLost,
    /// Coordinator realignment.
    CoordinatorRealignment,
    /// Coordinator started.
    CoordinatorStarted,
    /// A status this library does not know.
    Other(u8),
}

impl ModemStatus {
    /// Parses a status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::HardwareReset,
            1 => Self::WatchdogReset,
            2 => Self::Associated,
            3 => Self::Disassociated,
            4 => Self::SyncLost,
            5 => Self::CoordinatorRealignment,
            6 => Self::CoordinatorStarted,
            other => Self::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_helpers() {
        let pkt = Packet {
            rssi: Some(0x28),
            options: RX_OPT_ADDRESS_BROADCAST,
            ..Packet::default()
        };
        assert_eq!(pkt.rssi_dbm(), Some(-40));
        assert!(pkt.is_broadcast());
        assert!(!pkt.is_pan_broadcast());
        assert_eq!(pkt.at_status(), None);
    }

    #[test]
    fn test_at_status() {
        let pkt = Packet {
            at_command: Some(*b"MY"),
            status: Some(2),
            ..Packet::default()
        };
        assert_eq!(pkt.at_status(), Some(AtStatus::InvalidCommand));
        assert_eq!(pkt.at_command_str().as_deref(), Some("MY"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(TxStatus::from_byte(0), TxStatus::Success);
        assert_eq!(TxStatus::from_byte(2), TxStatus::CcaFailure);
        assert_eq!(TxStatus::from_byte(9), TxStatus::Other(9));
        assert_eq!(ModemStatus::from_byte(6), ModemStatus::CoordinatorStarted);
    }
}
