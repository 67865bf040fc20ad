//! The gRPC message framing codec (C3): the 5-byte length-prefixed message
//! envelope carried inside `DATA` frames, and the opaque protobuf
//! encode/decode step on top of it. A `DATA` frame may split a message
//! across frame boundaries or pack several messages into one frame; this
//! module buffers across both.

use bytes::{Buf, Bytes, BytesMut};
use prost::Message;

use crate::error::Error;
use crate::status::Code;

const COMPRESSED_FLAG_MASK: u8 = 0x1;
const PREFIX_LEN: usize = 5;

/// Reassembles whole gRPC messages out of a stream of raw `DATA` payloads.
/// One instance per direction per `Call`.
pub struct MessageDecoder {
    buf: BytesMut,
    max_message_size: usize,
}

impl MessageDecoder {
    pub fn new(max_message_size: usize) -> MessageDecoder {
        MessageDecoder {
            buf: BytesMut::new(),
            max_message_size,
        }
    }

    /// Feeds raw bytes from one `DATA` frame in.
    pub fn push(&mut self, bytes: Bytes) {
        self.buf.extend_from_slice(&bytes);
    }

    /// Pulls out every whole message currently buffered, leaving any
    /// trailing partial message for the next `push`. `compression` is
    /// rejected outright: this engine only ever negotiates `identity`.
    pub fn drain_messages(&mut self) -> Result<Vec<Bytes>, Error> {
        let mut out = Vec::new();
        loop {
            if self.buf.len() < PREFIX_LEN {
                return Ok(out);
            }
            let compressed = self.buf[0] & COMPRESSED_FLAG_MASK != 0;
            let len = u32::from_be_bytes([self.buf[1], self.buf[2], self.buf[3], self.buf[4]]) as usize;

            if compressed {
                return Err(crate::status::Status::new(
                    Code::Unimplemented,
                    "grpc-encoding: only identity compression is supported",
                )
                .into());
            }
            if len > self.max_message_size {
                return Err(crate::status::Status::new(
                    Code::ResourceExhausted,
                    format!("message of {len} bytes exceeds the {} byte limit", self.max_message_size),
                )
                .into());
            }
            if self.buf.len() < PREFIX_LEN + len {
                return Ok(out);
            }

            self.buf.advance(PREFIX_LEN);
            out.push(self.buf.split_to(len).freeze());
        }
    }

    /// True if a partial message is buffered after the peer half-closed —
    /// a truncated final message, which is always an error.
    pub fn has_partial_message(&self) -> bool {
        !self.buf.is_empty()
    }
}

/// Frames one already-encoded protobuf payload as one gRPC message (the
/// 5-byte prefix, uncompressed). The caller (`Call::send_message`) is
/// responsible for splitting this across as many `DATA` frames as
/// flow-control allows; this function only produces the logical envelope.
pub fn encode_envelope(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PREFIX_LEN + payload.len());
    buf.extend_from_slice(&[0u8]);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf.freeze()
}

/// Encodes a typed protobuf message into one framed gRPC message.
pub fn encode_message<M: Message>(msg: &M) -> Bytes {
    encode_envelope(&msg.encode_to_vec())
}

/// Decodes one already-deframed message body into its declared protobuf
/// type. Failures here are a codec error (§7): INTERNAL on the server,
/// surfaced identically to the client.
pub fn decode_message<M: Message + Default>(body: &[u8]) -> Result<M, Error> {
    M::decode(body).map_err(Error::codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_message_split_across_pushes() {
        let mut dec = MessageDecoder::new(4096);
        let envelope = encode_envelope(b"hello");
        let (first, second) = envelope.split_at(3);
        dec.push(Bytes::copy_from_slice(first));
        assert!(dec.drain_messages().unwrap().is_empty());
        dec.push(Bytes::copy_from_slice(second));
        let msgs = dec.drain_messages().unwrap();
        assert_eq!(msgs, vec![Bytes::from_static(b"hello")]);
    }

    #[test]
    fn packs_multiple_messages_in_one_push() {
        let mut dec = MessageDecoder::new(4096);
        let mut combined = BytesMut::new();
        combined.extend_from_slice(&encode_envelope(b"a"));
        combined.extend_from_slice(&encode_envelope(b"bb"));
        dec.push(combined.freeze());
        let msgs = dec.drain_messages().unwrap();
        assert_eq!(msgs, vec![Bytes::from_static(b"a"), Bytes::from_static(b"bb")]);
    }

    #[test]
    fn oversized_message_is_resource_exhausted() {
        let mut dec = MessageDecoder::new(4);
        dec.push(encode_envelope(b"too long"));
        let err = dec.drain_messages().unwrap_err();
        match err {
            Error::Status(s) => assert_eq!(s.code(), Code::ResourceExhausted),
            _ => panic!("expected a Status error"),
        }
    }
}
