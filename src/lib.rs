//! # xbee
//!
//! An async Rust client library for Digi XBee Series 1 (802.15.4) radios
//! running API firmware.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - API frame codec with mode 2 escaping
//! - Typed connections per frame type and remote address
//! - Transmit status tracking with frame IDs and timeouts
//! - AT command helpers for the local module
//!
//! ## Quick Start
//!
//! ```no_run
//! use xbee::{Addr16, SerialConfig, XBee};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xbee::Error> {
//!     let mut radio = XBee::setup("xbee1", SerialConfig::new("/dev/ttyUSB0")).await?;
//!
//!     let commands = radio.commands().await?;
//!     println!("serial number: {}", commands.serial_number().await?);
//!
//!     // Talk to the module at 16-bit address 0x0002
//!     let peer = radio.con_new("16-bit Data", Addr16(0x0002)).await?;
//!     peer.tx(b"hello").await?;
//!     let reply = peer.rx().await?;
//!     println!("reply: {:?}", reply.data);
//!
//!     radio.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - API frame codec and frame identifiers
//! - [`types`] - Addresses, packets and I/O samples
//! - [`mode`] - Mode drivers and their connection type tables
//! - [`transport`] - Transport implementations (currently serial)
//! - [`connection`] - Connections, routing and frame IDs
//! - [`event`] - Link notifications
//! - [`commands`] - AT command helpers
//! - [`client`] - High-level [`XBee`] client

pub mod client;
pub mod commands;
pub mod connection;
pub mod error;
pub mod event;
pub mod mode;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::XBee;
pub use commands::CommandHandler;
pub use connection::{ConSettings, Connection, ConnectionId, DEFAULT_TIMEOUT, Routed};
pub use error::{Error, FrameError, Result};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use mode::{AddressRule, ConType, Mode};
pub use protocol::{ApiId, ApiMode};
pub use transport::{SerialConfig, SerialTransport, Transport, list_ports};
pub use types::{
    Addr16, Addr64, AtStatus, ConAddress, IoSample, IoSamples, ModemStatus, Packet, TxStatus,
};
