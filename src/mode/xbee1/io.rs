//! 16-bit and 64-bit addressed I/O sample connection types.
//!
//! These are receive-only: the module sends them when `ATIR` sampling or
//! change detection (`ATIC`) is enabled on a remote.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::mode::xbee1::require_len;
use crate::mode::{AddressRule, ConType, RxHandler, RxOutcome};
use crate::protocol::ApiId;
use crate::types::{Addr16, Addr64, ConAddress, IoSamples, Packet};

/// RX I/O 64 header: identifier, source, RSSI, options.
const IO64_HEADER: usize = 11;

/// RX I/O 16 header: identifier, source, RSSI, options.
const IO16_HEADER: usize = 5;

fn io_packet(buf: &[u8], header: usize, address: ConAddress) -> Result<RxOutcome> {
    let samples = &buf[header..];
    let io = IoSamples::parse(samples).ok_or(Error::Length {
        identifier: buf[0],
        len: buf.len(),
    })?;

    Ok(RxOutcome {
        frame_info: None,
        address,
        packet: Some(Packet {
            address,
            rssi: Some(buf[header - 2]),
            options: buf[header - 1],
            data: Bytes::copy_from_slice(samples),
            io: Some(io),
            ..Packet::default()
        }),
    })
}

fn io_64bit_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, IO64_HEADER)?;

    let mut addr = [0u8; 8];
    addr.copy_from_slice(&buf[1..9]);
    io_packet(buf, IO64_HEADER, ConAddress::from(Addr64::from_bytes(addr)))
}

fn io_16bit_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, IO16_HEADER)?;

    let addr = Addr16::from_bytes([buf[1], buf[2]]);
    io_packet(buf, IO16_HEADER, ConAddress::from(addr))
}

/// I/O samples from a 16-bit network address.
pub static IO_16BIT: ConType = ConType {
    name: "16-bit I/O",
    allow_frame_id: false,
    use_timeout: false,
    address_rule: AddressRule::Addr16,
    rx: Some(RxHandler {
        identifier: ApiId::RxIo16 as u8,
        func: io_16bit_rx,
    }),
    tx: None,
};

/// I/O samples from a 64-bit IEEE address.
pub static IO_64BIT: ConType = ConType {
    name: "64-bit I/O",
    allow_frame_id: false,
    use_timeout: false,
    address_rule: AddressRule::Addr64,
    rx: Some(RxHandler {
        identifier: ApiId::RxIo64 as u8,
        func: io_64bit_rx,
    }),
    tx: None,
};
