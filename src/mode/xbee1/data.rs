//! 16-bit and 64-bit addressed data connection types.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mode::xbee1::{
    TX_OPT_BROADCAST_PAN, TX_OPT_DISABLE_ACK, check_payload, require_len,
};
use crate::mode::{AddressRule, ConType, RxHandler, RxOutcome, TxHandler, TxRequest};
use crate::protocol::ApiId;
use crate::types::{Addr16, Addr64, ConAddress, Packet};

/// RX 64 header: identifier, source, RSSI, options.
const RX64_HEADER: usize = 11;

/// RX 16 header: identifier, source, RSSI, options.
const RX16_HEADER: usize = 5;

/// Builds the transmit options byte from connection settings.
fn tx_options(request: &TxRequest<'_>) -> u8 {
    let mut options = 0;
    if request.settings.disable_ack {
        options |= TX_OPT_DISABLE_ACK;
    }
    if request.settings.broadcast_pan {
        options |= TX_OPT_BROADCAST_PAN;
    }
    options
}

/// Parses the `[rssi] [options] [data...]` tail shared by RX 16 and RX 64.
fn data_packet(address: ConAddress, tail: &[u8]) -> RxOutcome {
    RxOutcome {
        frame_info: None,
        address,
        packet: Some(Packet {
            address,
            rssi: Some(tail[0]),
            options: tail[1],
            data: Bytes::copy_from_slice(&tail[2..]),
            ..Packet::default()
        }),
    }
}

fn data_64bit_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, RX64_HEADER)?;

    let mut addr = [0u8; 8];
    addr.copy_from_slice(&buf[1..9]);
    Ok(data_packet(
        ConAddress::from(Addr64::from_bytes(addr)),
        &buf[9..],
    ))
}

fn data_64bit_tx(identifier: u8, request: &TxRequest<'_>) -> Result<Bytes> {
    check_payload(request)?;
    let addr = request.address.addr64.ok_or(Error::InvalidAddress {
        con_type: DATA_64BIT.name,
        reason: "64-bit address required",
    })?;

    let mut buf = BytesMut::with_capacity(11 + request.data.len());
    buf.put_u8(identifier);
    buf.put_u8(request.frame_id);
    buf.put_slice(addr.as_bytes());
    buf.put_u8(tx_options(request));
    buf.put_slice(request.data);
    Ok(buf.freeze())
}

fn data_16bit_rx(buf: &[u8]) -> Result<RxOutcome> {
    require_len(buf, RX16_HEADER)?;

    let addr = Addr16::from_bytes([buf[1], buf[2]]);
    Ok(data_packet(ConAddress::from(addr), &buf[3..]))
}

fn data_16bit_tx(identifier: u8, request: &TxRequest<'_>) -> Result<Bytes> {
    check_payload(request)?;
    let addr = request.address.addr16.ok_or(Error::InvalidAddress {
        con_type: DATA_16BIT.name,
        reason: "16-bit address required",
    })?;

    let mut buf = BytesMut::with_capacity(5 + request.data.len());
    buf.put_u8(identifier);
    buf.put_u8(request.frame_id);
    buf.put_u16(addr.0);
    buf.put_u8(tx_options(request));
    buf.put_slice(request.data);
    Ok(buf.freeze())
}

/// Data to and from a 16-bit network address.
pub static DATA_16BIT: ConType = ConType {
    name: "16-bit Data",
    allow_frame_id: true,
    use_timeout: true,
    address_rule: AddressRule::Addr16,
    rx: Some(RxHandler {
        identifier: ApiId::Rx16 as u8,
        func: data_16bit_rx,
    }),
    tx: Some(TxHandler {
        identifier: ApiId::Tx16 as u8,
        func: data_16bit_tx,
    }),
};

/// Data to and from a 64-bit IEEE address.
pub static DATA_64BIT: ConType = ConType {
    name: "64-bit Data",
    allow_frame_id: true,
    use_timeout: true,
    address_rule: AddressRule::Addr64,
    rx: Some(RxHandler {
        identifier: ApiId::Rx64 as u8,
        func: data_64bit_rx,
    }),
    tx: Some(TxHandler {
        identifier: ApiId::Tx64 as u8,
        func: data_64bit_tx,
    }),
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConSettings;
    use crate::mode::xbee1::MAX_PAYLOAD;

    #[test]
    fn test_data_16bit_rx() {
        let outcome = data_16bit_rx(&[0x81, 0x12, 0x34, 0x28, 0x02, b'h', b'i']).unwrap();
        assert!(outcome.frame_info.is_none());
        assert_eq!(outcome.address, ConAddress::from(Addr16(0x1234)));

        let pkt = outcome.packet.unwrap();
        assert_eq!(pkt.rssi_dbm(), Some(-40));
        assert!(pkt.is_broadcast());
        assert_eq!(&pkt.data[..], b"hi");
    }

    #[test]
    fn test_data_16bit_rx_empty_payload() {
        let outcome = data_16bit_rx(&[0x81, 0x12, 0x34, 0x28, 0x00]).unwrap();
        assert!(outcome.packet.unwrap().data.is_empty());
        assert!(data_16bit_rx(&[0x81, 0x12, 0x34, 0x28]).is_err());
    }

    #[test]
    fn test_data_64bit_rx() {
        let mut buf = vec![0x80, 0x00, 0x13, 0xa2, 0x00, 0x40, 0x0a, 0x0b, 0x0c, 0x30, 0x00];
        buf.extend_from_slice(b"hello");

        let outcome = data_64bit_rx(&buf).unwrap();
        assert_eq!(
            outcome.address.addr64,
            Some(Addr64::from_u64(0x0013_a200_400a_0b0c))
        );
        assert_eq!(&outcome.packet.unwrap().data[..], b"hello");
    }

    #[test]
    fn test_data_16bit_tx() {
        let settings = ConSettings::default().disable_ack(true);
        let address = ConAddress::from(Addr16(0x5678));
        let request = TxRequest {
            frame_id: 0x01,
            address: &address,
            settings: &settings,
            data: b"ping",
        };
        let frame = DATA_16BIT.build(&request).unwrap();
        assert_eq!(
            &frame[..],
            &[0x01, 0x01, 0x56, 0x78, 0x01, b'p', b'i', b'n', b'g']
        );
    }

    #[test]
    fn test_data_64bit_tx() {
        let settings = ConSettings::default().broadcast_pan(true);
        let address = ConAddress::from(Addr64::BROADCAST);
        let request = TxRequest {
            frame_id: 0x09,
            address: &address,
            settings: &settings,
            data: b"x",
        };
        let frame = DATA_64BIT.build(&request).unwrap();
        assert_eq!(
            &frame[..],
            &[0x00, 0x09, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0x04, b'x']
        );
    }

    #[test]
    fn test_tx_rejects_large_payload() {
        let settings = ConSettings::default();
        let address = ConAddress::from(Addr16(1));
        let data = [0u8; MAX_PAYLOAD + 1];
        let request = TxRequest {
            frame_id: 1,
            address: &address,
            settings: &settings,
            data: &data,
        };
        assert!(matches!(
            DATA_16BIT.build(&request),
            Err(Error::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_tx_requires_address() {
        let settings = ConSettings::default();
        let address = ConAddress::none();
        let request = TxRequest {
            frame_id: 1,
            address: &address,
            settings: &settings,
            data: b"x",
        };
        assert!(matches!(
            DATA_64BIT.build(&request),
            Err(Error::InvalidAddress {
                con_type: "64-bit Data",
                ..
            })
        ));
    }
}
