//! Mode drivers.
//!
//! A mode describes one radio family: how its link is brought up and torn
//! down, which API mode its frames use, and the table of connection types
//! it supports. Each connection type names the API identifier its receive
//! parser handles and, if it can transmit, the identifier its builder
//! produces.

pub mod xbee1;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::connection::ConSettings;
use crate::error::{Error, Result};
use crate::protocol::ApiMode;
use crate::transport::Transport;
use crate::types::{ConAddress, Packet};

/// Status information a received frame carries for an earlier transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame ID of the transmission.
    pub id: u8,
    /// Status byte reported by the module.
    pub ret_val: u8,
}

/// Result of running a receive parser over one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RxOutcome {
    /// Status for a pending transmission, if the frame carries one.
    pub frame_info: Option<FrameInfo>,
    /// Remote end the frame came from.
    pub address: ConAddress,
    /// Packet to deliver to a connection, if any.
    pub packet: Option<Packet>,
}

/// Receive parser. The buffer starts with the API identifier.
pub type RxFn = fn(&[u8]) -> Result<RxOutcome>;

/// Transmit builder. Returns frame data starting with the API identifier.
pub type TxFn = fn(u8, &TxRequest<'_>) -> Result<Bytes>;

/// Brings up a mode's link.
pub type InitFn = for<'a> fn(&'a mut dyn Transport) -> BoxFuture<'a, Result<()>>;

/// Tears down a mode's link.
pub type ShutdownFn = for<'a> fn(&'a mut dyn Transport) -> BoxFuture<'a, Result<()>>;

/// Receive side of a connection type.
#[derive(Debug, Clone, Copy)]
pub struct RxHandler {
    /// API identifier this parser handles.
    pub identifier: u8,
    /// The parser.
    pub func: RxFn,
}

/// Transmit side of a connection type.
#[derive(Debug, Clone, Copy)]
pub struct TxHandler {
    /// API identifier this builder produces.
    pub identifier: u8,
    /// The builder.
    pub func: TxFn,
}

/// Everything a transmit builder needs for one frame.
#[derive(Debug, Clone, Copy)]
pub struct TxRequest<'a> {
    /// Frame ID, or 0 when no status is wanted.
    pub frame_id: u8,
    /// Destination.
    pub address: &'a ConAddress,
    /// Connection settings.
    pub settings: &'a ConSettings,
    /// Payload (for AT connections: command followed by parameter).
    pub data: &'a [u8],
}

/// Which parts of an address a connection type requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRule {
    /// No remote end; the address must be empty.
    None,
    /// A 16-bit address is required.
    Addr16,
    /// A 64-bit address is required.
    Addr64,
    /// Either a 16-bit or a 64-bit address is required.
    Any,
}

impl AddressRule {
    /// Checks an address against this rule.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` naming the connection type.
    pub fn check(self, con_type: &'static str, address: &ConAddress) -> Result<()> {
        let reason = match self {
            Self::None if !address.is_empty() => "connection type takes no address",
            Self::Addr16 if address.addr16.is_none() => "16-bit address required",
            Self::Addr64 if address.addr64.is_none() => "64-bit address required",
            Self::Any if address.is_empty() => "16-bit or 64-bit address required",
            _ => return Ok(()),
        };
        Err(Error::InvalidAddress { con_type, reason })
    }
}

/// A connection type: one class of traffic a mode can carry.
#[derive(Debug)]
pub struct ConType {
    /// Name used to open connections of this type.
    pub name: &'static str,
    /// Transmissions get a frame ID.
    pub allow_frame_id: bool,
    /// Transmissions wait for their status.
    pub use_timeout: bool,
    /// Address requirement.
    pub address_rule: AddressRule,
    /// Receive parser.
    pub rx: Option<RxHandler>,
    /// Transmit builder.
    pub tx: Option<TxHandler>,
}

impl ConType {
    /// Returns the identifier of frames this type receives.
    #[must_use]
    pub fn rx_identifier(&self) -> Option<u8> {
        self.rx.map(|h| h.identifier)
    }

    /// Returns the identifier of frames this type sends.
    #[must_use]
    pub fn tx_identifier(&self) -> Option<u8> {
        self.tx.map(|h| h.identifier)
    }

    /// Runs the receive parser.
    pub fn parse(&self, buf: &[u8]) -> Result<RxOutcome> {
        let handler = self.rx.ok_or(Error::NotSupported {
            con_type: self.name,
            operation: "rx",
        })?;
        (handler.func)(buf)
    }

    /// Runs the transmit builder.
    pub fn build(&self, request: &TxRequest<'_>) -> Result<Bytes> {
        let handler = self.tx.ok_or(Error::NotSupported {
            con_type: self.name,
            operation: "tx",
        })?;
        (handler.func)(handler.identifier, request)
    }
}

/// A mode driver.
pub struct Mode {
    /// Name used to select the mode.
    pub name: &'static str,
    /// Framing used on the link.
    pub api_mode: ApiMode,
    /// Connection types, in lookup order.
    pub con_types: &'static [&'static ConType],
    /// Link bring-up.
    pub init: InitFn,
    /// Link teardown.
    pub shutdown: ShutdownFn,
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mode")
            .field("name", &self.name)
            .field("api_mode", &self.api_mode)
            .field("con_types", &self.con_type_names())
            .finish_non_exhaustive()
    }
}

impl Mode {
    /// Looks up a connection type by name.
    #[must_use]
    pub fn con_type(&self, name: &str) -> Option<&'static ConType> {
        self.con_types.iter().copied().find(|ct| ct.name == name)
    }

    /// Returns every connection type that receives frames with this identifier.
    #[must_use]
    pub fn rx_con_types(&self, identifier: u8) -> Vec<&'static ConType> {
        self.con_types
            .iter()
            .copied()
            .filter(|ct| ct.rx_identifier() == Some(identifier))
            .collect()
    }

    /// Returns the connection type names in table order.
    #[must_use]
    pub fn con_type_names(&self) -> Vec<&'static str> {
        self.con_types.iter().map(|ct| ct.name).collect()
    }
}

static MODES: &[&Mode] = &[&xbee1::MODE];

/// Returns all registered modes.
#[must_use]
pub fn modes() -> &'static [&'static Mode] {
    MODES
}

/// Looks up a mode by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Mode> {
    MODES.iter().copied().find(|m| m.name == name)
}
