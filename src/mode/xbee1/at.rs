//! Local and remote AT command connection types.
//!
//! Local response format:
//! ```text
//! [0x88] [frame_id:1] [command:2] [status:1] [value...]
//! ```
//!
//! Remote response format:
//! ```text
//! [0x97] [frame_id:1] [src64:8BE] [src16:2BE] [command:2] [status:1] [value...]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mode::xbee1::{TX_OPT_APPLY_CHANGES, check_payload, require_len};
use crate::mode::{AddressRule, ConType, FrameInfo, RxHandler, RxOutcome, TxHandler, TxRequest};
use crate::protocol::ApiId;
use crate::types::{Addr16, Addr64, ConAddress, Packet};

/// Minimum local AT response: identifier, frame ID, command, status.
const LOCAL_RESPONSE_MIN: usize = 5;

/// Minimum remote AT response: adds the 64-bit and 16-bit source.
const REMOTE_RESPONSE_MIN: usize = 15;

fn require_command(request: &TxRequest<'_>) -> Result<()> {
    if request.data.len() < 2 {
        return Err(Error::InvalidParam {
            reason: format!(
                "AT request needs a 2-byte command, got {} bytes",
                request.data.len()
            ),
        });
    }
    Ok(())
}

fn local_at_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, LOCAL_RESPONSE_MIN)?;

    let frame_id = buf[1];
    let status = buf[4];

    Ok(RxOutcome {
        frame_info: Some(FrameInfo {
            id: frame_id,
            ret_val: status,
        }),
        address: ConAddress::none(),
        packet: Some(Packet {
            frame_id: Some(frame_id),
            status: Some(status),
            at_command: Some([buf[2], buf[3]]),
            data: Bytes::copy_from_slice(&buf[LOCAL_RESPONSE_MIN..]),
            ..Packet::default()
        }),
    })
}

fn local_at_tx(identifier: u8, request: &TxRequest<'_>) -> Result<Bytes> {
    require_command(request)?;
    check_payload(request)?;

    let mut buf = BytesMut::with_capacity(2 + request.data.len());
    buf.put_u8(identifier);
    buf.put_u8(request.frame_id);
    buf.put_slice(request.data);
    Ok(buf.freeze())
}

fn remote_at_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, REMOTE_RESPONSE_MIN)?;

    let frame_id = buf[1];
    let mut addr64 = [0u8; 8];
    addr64.copy_from_slice(&buf[2..10]);
    let addr16 = Addr16::from_bytes([buf[10], buf[11]]);
    let status = buf[14];

    let address = ConAddress {
        addr16: (addr16 != Addr16::UNKNOWN).then_some(addr16),
        addr64: Some(Addr64::from_bytes(addr64)),
    };

    Ok(RxOutcome {
        frame_info: Some(FrameInfo {
            id: frame_id,
            ret_val: status,
        }),
        address,
        packet: Some(Packet {
            address,
            frame_id: Some(frame_id),
            status: Some(status),
            at_command: Some([buf[12], buf[13]]),
            data: Bytes::copy_from_slice(&buf[REMOTE_RESPONSE_MIN..]),
            ..Packet::default()
        }),
    })
}

fn remote_at_tx(identifier: u8, request: &TxRequest<'_>) -> Result<Bytes> {
    require_command(request)?;
    check_payload(request)?;

    let addr64 = request.address.addr64.map_or([0u8; 8], Addr64::to_bytes);
    let addr16 = request.address.addr16.unwrap_or(Addr16::UNKNOWN);
    let options = if request.settings.queue_changes {
        0
    } else {
        TX_OPT_APPLY_CHANGES
    };

    let mut buf = BytesMut::with_capacity(13 + request.data.len());
    buf.put_u8(identifier);
    buf.put_u8(request.frame_id);
    buf.put_slice(&addr64);
    buf.put_slice(&addr16.to_bytes());
    buf.put_u8(options);
    buf.put_slice(request.data);
    Ok(buf.freeze())
}

/// AT commands to the local module, applied immediately.
pub static LOCAL_AT: ConType = ConType {
    name: "Local AT",
    allow_frame_id: true,
    use_timeout: true,
    address_rule: AddressRule::None,
    rx: Some(RxHandler {
        identifier: ApiId::AtResponse as u8,
        func: local_at_rx,
    }),
    tx: Some(TxHandler {
        identifier: ApiId::AtCommand as u8,
        func: local_at_tx,
    }),
};

/// AT commands to the local module, held until `AC` or `WR`.
pub static LOCAL_AT_QUEUED: ConType = ConType {
    name: "Local AT (queued)",
    allow_frame_id: true,
    use_timeout: true,
    address_rule: AddressRule::None,
    rx: Some(RxHandler {
        identifier: ApiId::AtResponse as u8,
        func: local_at_rx,
    }),
    tx: Some(TxHandler {
        identifier: ApiId::AtCommandQueued as u8,
        func: local_at_tx,
    }),
};

/// AT commands to a remote module.
pub static REMOTE_AT: ConType = ConType {
    name: "Remote AT",
    allow_frame_id: true,
    use_timeout: true,
    address_rule: AddressRule::Any,
    rx: Some(RxHandler {
        identifier: ApiId::RemoteAtResponse as u8,
        func: remote_at_rx,
    }),
    tx: Some(TxHandler {
        identifier: ApiId::RemoteAtCommand as u8,
        func: remote_at_tx,
    }),
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConSettings;
    use crate::mode::xbee1::MAX_PAYLOAD;

    #[test]
    fn test_local_at_rx() {
        let outcome = local_at_rx(&[0x88, 0x01, b'M', b'Y', 0x00, 0x12, 0x34]).unwrap();
        assert_eq!(
            outcome.frame_info,
            Some(FrameInfo {
                id: 0x01,
                ret_val: 0x00
            })
        );
        let pkt = outcome.packet.unwrap();
        assert_eq!(pkt.at_command, Some(*b"MY"));
        assert_eq!(pkt.status, Some(0));
        assert_eq!(&pkt.data[..], &[0x12, 0x34]);
    }

    #[test]
    fn test_local_at_rx_too_short() {
        assert!(matches!(
            local_at_rx(&[0x88, 0x01, b'M', b'Y']),
            Err(Error::Length {
                identifier: 0x88,
                len: 4
            })
        ));
    }

    #[test]
    fn test_local_at_tx() {
        let settings = ConSettings::default();
        let request = TxRequest {
            frame_id: 0x52,
            address: &ConAddress::none(),
            settings: &settings,
            data: b"NJ",
        };
        let frame = LOCAL_AT.build(&request).unwrap();
        assert_eq!(&frame[..], &[0x08, 0x52, b'N', b'J']);

        let frame = LOCAL_AT_QUEUED.build(&request).unwrap();
        assert_eq!(frame[0], 0x09);
    }

    #[test]
    fn test_local_at_tx_requires_command() {
        let settings = ConSettings::default();
        let request = TxRequest {
            frame_id: 1,
            address: &ConAddress::none(),
            settings: &settings,
            data: b"N",
        };
        assert!(matches!(
            LOCAL_AT.build(&request),
            Err(Error::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_remote_at_rx() {
        let mut buf = vec![0x97, 0x05];
        buf.extend_from_slice(&[0x00, 0x13, 0xa2, 0x00, 0x40, 0x01, 0x02, 0x03]);
        buf.extend_from_slice(&[0xff, 0xfe]);
        buf.extend_from_slice(b"NI");
        buf.push(0x00);
        buf.extend_from_slice(b"node");

        let outcome = remote_at_rx(&buf).unwrap();
        assert_eq!(
            outcome.address.addr64,
            Some(Addr64::from_u64(0x0013_a200_4001_0203))
        );
        assert_eq!(outcome.address.addr16, None);
        let pkt = outcome.packet.unwrap();
        assert_eq!(pkt.address, outcome.address);
        assert_eq!(pkt.at_command, Some(*b"NI"));
        assert_eq!(&pkt.data[..], b"node");
    }

    #[test]
    fn test_remote_at_tx() {
        let settings = ConSettings::default();
        let address = ConAddress::from(Addr64::from_u64(0x0013_a200_4001_0203));
        let request = TxRequest {
            frame_id: 3,
            address: &address,
            settings: &settings,
            data: b"D0\x05",
        };
        let frame = REMOTE_AT.build(&request).unwrap();
        assert_eq!(
            &frame[..],
            &[
                0x17, 0x03, 0x00, 0x13, 0xa2, 0x00, 0x40, 0x01, 0x02, 0x03, 0xff, 0xfe, 0x02,
                b'D', b'0', 0x05
            ]
        );
    }

    #[test]
    fn test_remote_at_tx_queued_16bit() {
        let settings = ConSettings::default().queue_changes(true);
        let address = ConAddress::from(Addr16(0x1234));
        let request = TxRequest {
            frame_id: 3,
            address: &address,
            settings: &settings,
            data: b"WR",
        };
        let frame = REMOTE_AT.build(&request).unwrap();
        assert_eq!(&frame[2..10], &[0u8; 8]);
        assert_eq!(&frame[10..13], &[0x12, 0x34, 0x00]);
    }

    #[test]
    fn test_at_tx_rejects_large_payload() {
        let settings = ConSettings::default();
        let address = ConAddress::from(Addr16(1));
        let mut data = b"NI".to_vec();
        data.resize(MAX_PAYLOAD + 1, b'x');
        let request = TxRequest {
            frame_id: 1,
            address: &address,
            settings: &settings,
            data: &data,
        };
        for con_type in [&LOCAL_AT, &LOCAL_AT_QUEUED, &REMOTE_AT] {
            assert!(
                matches!(con_type.build(&request), Err(Error::InvalidParam { .. })),
                "{}",
                con_type.name
            );
        }

        let request = TxRequest {
            data: &data[..MAX_PAYLOAD],
            ..request
        };
        assert_eq!(LOCAL_AT.build(&request).unwrap().len(), MAX_PAYLOAD + 2);
    }
}
