//! `tokio_util::codec` wiring around the frame encoder/decoder, so the
//! transport drives the wire protocol through `FramedRead`/`FramedWrite`
//! the way the teacher's bitaxe-raw control channel drives its own codec.

use std::collections::VecDeque;
use std::io;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::address::Address;
use crate::protocol::frame::{self, ReceiveRecord};

/// An outbound (address, cmd, payload) tuple, ready to be framed.
#[derive(Debug, Clone)]
pub struct OutboundFrame {
    pub address: Address,
    pub cmd: u8,
    pub payload: Vec<u8>,
}

#[derive(Default)]
pub struct FrameCodec {
    pending: VecDeque<ReceiveRecord>,
}

impl Encoder<OutboundFrame> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> io::Result<()> {
        let wire = frame::encode(item.address, item.cmd, &item.payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
        dst.extend_from_slice(&wire);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = ReceiveRecord;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<ReceiveRecord>> {
        if self.pending.is_empty() {
            let mut buf = src.to_vec();
            let records = frame::decode_frames(&mut buf);
            src.advance(src.len() - buf.len());
            self.pending.extend(records);
        }
        Ok(self.pending.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::RxAddress;

    #[test]
    fn decodes_a_frame_written_into_bytesmut() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame::encode(Address::Short(0x05), 0xC1, &[]).unwrap());

        // Flip the direction bit to make it a response, matching how a node
        // would reply; encode() always builds a host-issued request.
        buf[frame::PREAMBLE_TX_COUNT] |= 0x01;

        let record = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(record.address, RxAddress::Short(0x05));
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_yields_none_and_keeps_bytes() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[frame::PREAMBLE_BYTE; frame::PREAMBLE_TX_COUNT]);
        buf.extend_from_slice(&[0x81, 0x05]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(!buf.is_empty());
    }
}
