//! Frame encoding and the streaming frame decoder.
//!
//! Wire layout: `[0x7F x P] header(1) address(1|8) cmd(1) len(1) payload(len)
//! crc32(4, LE)`. See spec §3/§4.2.

use crate::error::{Error, Result};
use crate::protocol::address::Address;
use crate::protocol::crc::crc32;

pub const PREAMBLE_BYTE: u8 = 0x7F;
pub const PREAMBLE_TX_COUNT: usize = 12;
pub const PREAMBLE_RX_MIN: usize = 5;

const HEADER_BASE: u8 = 0x80;
const HEADER_BASE_MASK: u8 = 0xF0;
const FLAG_64BIT: u8 = 0x02;
const FLAG_RESPONSE: u8 = 0x01;

/// A decoded frame from the bus, always a response (direction bit set).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRecord {
    pub address: RxAddress,
    pub cmd: u8,
    pub payload: Vec<u8>,
    pub raw: Vec<u8>,
}

/// Exactly one of `Short`/`Uid` is populated, per the header's 64-bit flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxAddress {
    Short(u8),
    Uid(String),
}

impl RxAddress {
    pub fn short(&self) -> Option<u8> {
        match self {
            RxAddress::Short(id) => Some(*id),
            RxAddress::Uid(_) => None,
        }
    }

    pub fn uid(&self) -> Option<&str> {
        match self {
            RxAddress::Uid(uid) => Some(uid),
            RxAddress::Short(_) => None,
        }
    }
}

/// Encode a (address, cmd, payload) tuple into a wire frame, preamble included.
pub fn encode(address: Address, cmd: u8, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > u8::MAX as usize {
        return Err(Error::PayloadTooLarge(payload.len()));
    }

    let mut header = HEADER_BASE;
    if address.is_long() {
        header |= FLAG_64BIT;
    }

    let mut body = Vec::with_capacity(3 + 8 + payload.len());
    body.push(header);
    body.extend_from_slice(&address.to_wire_bytes());
    body.push(cmd);
    body.push(payload.len() as u8);
    body.extend_from_slice(payload);

    let crc = crc32(&body);

    let mut frame = Vec::with_capacity(PREAMBLE_TX_COUNT + body.len() + 4);
    frame.extend(std::iter::repeat(PREAMBLE_BYTE).take(PREAMBLE_TX_COUNT));
    frame.extend_from_slice(&body);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Validate a candidate header byte: base nibble must be 0x8, direction
/// bit must be 1 (response). Returns the address length in bytes on match.
fn validate_header(header: u8) -> Option<usize> {
    if header & HEADER_BASE_MASK != HEADER_BASE {
        return None;
    }
    if header & FLAG_RESPONSE == 0 {
        return None;
    }
    Some(if header & FLAG_64BIT != 0 { 8 } else { 1 })
}

/// Streaming decoder. Consumes complete frames from the front of `buf`,
/// leaving any trailing partial bytes (and up to `PREAMBLE_RX_MIN - 1`
/// bytes of in-progress preamble) in place.
pub fn decode_frames(buf: &mut Vec<u8>) -> Vec<ReceiveRecord> {
    let mut records = Vec::new();

    loop {
        // Scan for a run of >= PREAMBLE_RX_MIN preamble bytes followed by
        // a non-preamble byte, which becomes the candidate header position.
        let mut run = 0usize;
        let mut hdr_pos = None;
        for (i, &b) in buf.iter().enumerate() {
            if b == PREAMBLE_BYTE {
                run += 1;
            } else {
                if run >= PREAMBLE_RX_MIN {
                    hdr_pos = Some(i);
                    break;
                }
                run = 0;
            }
        }

        let Some(hdr_pos) = hdr_pos else {
            // No confirmed header yet; keep a trailing preamble-sized tail
            // so an in-progress run isn't lost across decode calls.
            let keep = buf.len().min(PREAMBLE_RX_MIN);
            let drop = buf.len() - keep;
            buf.drain(0..drop);
            break;
        };

        let header = buf[hdr_pos];
        let Some(addr_len) = validate_header(header) else {
            buf.drain(0..=hdr_pos);
            continue;
        };

        let len_idx = hdr_pos + 1 + addr_len + 1;
        if buf.len() <= len_idx {
            break;
        }

        let data_len = buf[len_idx] as usize;
        let total_frame_len = 1 + addr_len + 1 + 1 + data_len + 4;
        if buf.len() < hdr_pos + total_frame_len {
            break;
        }

        let frame_end = hdr_pos + total_frame_len;
        let crc_payload = &buf[hdr_pos..frame_end - 4];
        let wire_crc = u32::from_le_bytes(buf[frame_end - 4..frame_end].try_into().unwrap());

        if crc32(crc_payload) != wire_crc {
            buf.drain(0..=hdr_pos);
            continue;
        }

        let raw = buf[hdr_pos..frame_end].to_vec();
        let addr_bytes = &raw[1..1 + addr_len];
        let address = if addr_len == 8 {
            RxAddress::Uid(hex::encode_upper(addr_bytes))
        } else {
            RxAddress::Short(addr_bytes[0])
        };
        let cmd = raw[1 + addr_len];
        let payload = raw[1 + addr_len + 2..1 + addr_len + 2 + data_len].to_vec();

        records.push(ReceiveRecord {
            address,
            cmd,
            payload,
            raw,
        });
        buf.drain(0..frame_end);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S1 — round-trip short-address frame (response form, header 0x81).
    #[test]
    fn s1_round_trip_short_address_frame() {
        let header = 0x81u8;
        let mut body = vec![header, 0x05, 0xC1, 0x00];
        let crc = crc32(&body);

        let mut wire = vec![PREAMBLE_BYTE; PREAMBLE_TX_COUNT];
        wire.append(&mut body);
        wire.extend_from_slice(&crc.to_le_bytes());

        assert_eq!(crc, 0x6D84_E2D0);

        let records = decode_frames(&mut wire);
        assert_eq!(records.len(), 1);
        let rec = &records[0];
        assert_eq!(rec.address, RxAddress::Short(0x05));
        assert_eq!(rec.cmd, 0xC1);
        assert!(rec.payload.is_empty());
        assert!(wire.is_empty());
    }

    /// S2 — long-address scan response.
    #[test]
    fn s2_long_address_scan_response() {
        let uid = [0x01u8, 2, 3, 4, 5, 6, 7, 8];
        let header = 0x83u8;
        let mut body = vec![header];
        body.extend_from_slice(&uid);
        body.push(0x11);
        body.push(0x08);
        body.extend_from_slice(&uid);
        let crc = crc32(&body);

        let mut wire = vec![PREAMBLE_BYTE; 7];
        wire.append(&mut body);
        wire.extend_from_slice(&crc.to_le_bytes());

        let records = decode_frames(&mut wire);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, RxAddress::Uid("0102030405060708".into()));
    }

    #[test]
    fn decoder_rejects_request_direction_frames() {
        let mut wire = encode(Address::Short(0x02), 0x81, &[]).unwrap();
        // encode() always produces direction=0 (request) frames, which the
        // decoder (which only accepts responses) must reject outright.
        assert!(decode_frames(&mut wire).is_empty());
    }

    /// S6 — reader resync after leading garbage.
    #[test]
    fn s6_decoder_accepts_a_genuine_response_after_garbage() {
        let mut body = vec![0x81u8, 0x02, 0xC1, 0x00];
        let crc = crc32(&body);
        let mut wire = vec![0xAA, 0xBB];
        wire.extend(std::iter::repeat(PREAMBLE_BYTE).take(PREAMBLE_TX_COUNT));
        wire.append(&mut body);
        wire.extend_from_slice(&crc.to_le_bytes());

        let records = decode_frames(&mut wire);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, RxAddress::Short(0x02));
        assert!(wire.is_empty());
    }

    #[test]
    fn incomplete_frame_is_retained_for_next_call() {
        let mut wire = vec![PREAMBLE_BYTE; PREAMBLE_TX_COUNT];
        wire.extend_from_slice(&[0x81, 0x02, 0xC1]); // missing len/payload/crc
        let records = decode_frames(&mut wire);
        assert!(records.is_empty());
        assert!(!wire.is_empty());

        wire.push(0x00);
        let crc = crc32(&[0x81, 0x02, 0xC1, 0x00]);
        wire.extend_from_slice(&crc.to_le_bytes());
        let records = decode_frames(&mut wire);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn crc_mismatch_is_dropped_and_resynchronizes() {
        let mut wire = vec![PREAMBLE_BYTE; PREAMBLE_TX_COUNT];
        wire.extend_from_slice(&[0x81, 0x02, 0xC1, 0x00]);
        wire.extend_from_slice(&[0, 0, 0, 0]); // bad CRC

        // Append a genuine frame right after so we can prove resync happened.
        let mut good = vec![0x81u8, 0x03, 0xC1, 0x00];
        let good_crc = crc32(&good);
        let mut tail = vec![PREAMBLE_BYTE; PREAMBLE_TX_COUNT];
        tail.append(&mut good);
        tail.extend_from_slice(&good_crc.to_le_bytes());
        wire.extend(tail);

        let records = decode_frames(&mut wire);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, RxAddress::Short(0x03));
    }

    #[test]
    fn payload_too_large_is_rejected() {
        let payload = vec![0u8; 256];
        let err = encode(Address::Short(0x01), 0xC1, &payload).unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge(256)));
    }
}
