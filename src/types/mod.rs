//! Data types for XBee entities.
//!
//! This module contains the core data structures used throughout the library:
//! - 16-bit and 64-bit addresses
//! - Received packets and status codes
//! - I/O samples

pub mod address;
pub mod io;
pub mod packet;

pub use address::{Addr16, Addr64, ConAddress};
pub use io::{IoSample, IoSamples};
pub use packet::{AtStatus, ModemStatus, Packet, TxStatus};
