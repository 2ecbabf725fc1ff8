//! XBee Series 1 (802.15.4) mode.
//!
//! Series 1 modules running API firmware with escaping enabled (`ATAP2`).
//! The connection types are:
//!
//! | Name              | rx   | tx   |
//! |-------------------|------|------|
//! | Transmit Status   | 0x89 | -    |
//! | Modem Status      | 0x8a | -    |
//! | Local AT          | 0x88 | 0x08 |
//! | Local AT (queued) | 0x88 | 0x09 |
//! | Remote AT         | 0x97 | 0x17 |
//! | 16-bit Data       | 0x81 | 0x01 |
//! | 64-bit Data       | 0x80 | 0x00 |
//! | 16-bit I/O        | 0x83 | -    |
//! | 64-bit I/O        | 0x82 | -    |

pub mod at;
pub mod data;
pub mod io;

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::mode::{AddressRule, ConType, FrameInfo, Mode, RxHandler, RxOutcome, TxRequest};
use crate::protocol::{ApiId, ApiMode};
use crate::transport::Transport;
use crate::types::{ConAddress, Packet};

pub use at::{LOCAL_AT, LOCAL_AT_QUEUED, REMOTE_AT};
pub use data::{DATA_16BIT, DATA_64BIT};
pub use io::{IO_16BIT, IO_64BIT};

/// Maximum RF payload of a Series 1 module.
pub const MAX_PAYLOAD: usize = 100;

/// Transmit option: disable MAC acknowledgement.
pub const TX_OPT_DISABLE_ACK: u8 = 0x01;

/// Remote AT option: apply changes immediately.
pub const TX_OPT_APPLY_CHANGES: u8 = 0x02;

/// Transmit option: send to the broadcast PAN.
pub const TX_OPT_BROADCAST_PAN: u8 = 0x04;

/// Fails with `Error::Length` unless the frame has at least `min` bytes.
pub(crate) fn require_len(buf: &[u8], min: usize) -> Result<()> {
    if buf.len() < min {
        return Err(Error::Length {
            identifier: buf.first().copied().unwrap_or_default(),
            len: buf.len(),
        });
    }
    Ok(())
}

/// Fails with `Error::InvalidParam` if the payload exceeds [`MAX_PAYLOAD`].
pub(crate) fn check_payload(request: &TxRequest<'_>) -> Result<()> {
    if request.data.len() > MAX_PAYLOAD {
        return Err(Error::InvalidParam {
            reason: format!(
                "payload of {} bytes exceeds maximum {MAX_PAYLOAD}",
                request.data.len()
            ),
        });
    }
    Ok(())
}

fn init(transport: &mut dyn Transport) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if let Err(e) = transport.connect().await {
            tracing::warn!("connect failed: {}", e);
            // Release whatever the failed attempt left open
            if let Err(cleanup) = transport.disconnect().await {
                tracing::debug!("cleanup after failed connect: {}", cleanup);
            }
            return Err(e);
        }
        Ok(())
    })
}

fn shutdown(transport: &mut dyn Transport) -> BoxFuture<'_, Result<()>> {
    Box::pin(async move {
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }
        transport.disconnect().await
    })
}

fn transmit_status_rx(buf: &[u8]) -> Result<RxOutcome> {
    if buf.len() != 3 {
        return Err(Error::Length {
            identifier: ApiId::TxStatus.into(),
            len: buf.len(),
        });
    }

    Ok(RxOutcome {
        frame_info: Some(FrameInfo {
            id: buf[1],
            ret_val: buf[2],
        }),
        address: ConAddress::none(),
        packet: None,
    })
}

fn modem_status_rx(buf: &[u8]) -> Result<RxOutcome> {
    if buf.len() != 2 {
        return Err(Error::Length {
            identifier: ApiId::ModemStatus.into(),
            len: buf.len(),
        });
    }

    Ok(RxOutcome {
        frame_info: None,
        address: ConAddress::none(),
        packet: Some(Packet {
            status: Some(buf[1]),
            ..Packet::default()
        }),
    })
}

/// Status of an earlier data transmission.
pub static TRANSMIT_STATUS: ConType = ConType {
    name: "Transmit Status",
    allow_frame_id: false,
    use_timeout: false,
    address_rule: AddressRule::None,
    rx: Some(RxHandler {
        identifier: ApiId::TxStatus as u8,
        func: transmit_status_rx,
    }),
    tx: None,
};

/// Unsolicited modem status (reset, association).
pub static MODEM_STATUS: ConType = ConType {
    name: "Modem Status",
    allow_frame_id: false,
    use_timeout: false,
    address_rule: AddressRule::None,
    rx: Some(RxHandler {
        identifier: ApiId::ModemStatus as u8,
        func: modem_status_rx,
    }),
    tx: None,
};

static CON_TYPES: &[&ConType] = &[
    &TRANSMIT_STATUS,
    &MODEM_STATUS,
    &LOCAL_AT,
    &LOCAL_AT_QUEUED,
    &REMOTE_AT,
    &DATA_16BIT,
    &DATA_64BIT,
    &IO_16BIT,
    &IO_64BIT,
];

/// The Series 1 mode.
pub static MODE: Mode = Mode {
    name: "xbee1",
    api_mode: ApiMode::Escaped,
    con_types: CON_TYPES,
    init,
    shutdown,
};
