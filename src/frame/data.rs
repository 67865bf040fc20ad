use bytes::Bytes;

use crate::frame::head::{Head, Kind, StreamId};

const END_STREAM: u8 = 0x1;
const PADDED: u8 = 0x8;

/// A `DATA` frame: raw gRPC message bytes (already length-prefixed by the
/// gRPC framing codec, C3) carried on one HTTP/2 stream.
#[derive(Debug)]
pub struct Data {
    stream_id: StreamId,
    payload: Bytes,
    flags: u8,
}

impl Data {
    pub fn new(stream_id: StreamId, payload: Bytes) -> Data {
        Data {
            stream_id,
            payload,
            flags: 0,
        }
    }

    pub fn set_end_stream(&mut self) {
        self.flags |= END_STREAM;
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags & END_STREAM == END_STREAM
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<Data, super::Error> {
        if head.flag() & PADDED == PADDED {
            if payload.is_empty() {
                return Err(super::Error::TooMuchPadding);
            }
            let pad_len = payload[0] as usize;
            payload = payload.split_off(1);
            if pad_len > payload.len() {
                return Err(super::Error::TooMuchPadding);
            }
            payload.truncate(payload.len() - pad_len);
        }

        Ok(Data {
            stream_id: head.stream_id(),
            payload,
            flags: head.flag() & END_STREAM,
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::Data, self.flags, self.stream_id);
        head.encode(self.payload.len(), dst);
        dst.extend_from_slice(&self.payload);
    }
}
