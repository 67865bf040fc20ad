use bytes::Bytes;

use crate::error::Reason;
use crate::frame::head::{Head, Kind, StreamId};

/// A `GOAWAY` frame: the sender will not initiate, or accept, any stream with
/// an id above `last_stream_id` on this connection.
#[derive(Debug, Clone)]
pub struct GoAway {
    last_stream_id: StreamId,
    error_code: Reason,
    debug_data: Bytes,
}

impl GoAway {
    pub fn new(last_stream_id: StreamId, error_code: Reason) -> GoAway {
        GoAway {
            last_stream_id,
            error_code,
            debug_data: Bytes::new(),
        }
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.error_code
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<GoAway, super::Error> {
        if payload.len() < 8 {
            return Err(super::Error::InvalidPayloadLength);
        }

        let last_stream_id = StreamId::from(u32::from_be_bytes([
            payload[0] & 0x7f,
            payload[1],
            payload[2],
            payload[3],
        ]));
        let error_code = Reason::from_u32(u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]));

        let _ = head;
        Ok(GoAway {
            last_stream_id,
            error_code,
            debug_data: Bytes::copy_from_slice(&payload[8..]),
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::GoAway, 0, StreamId::ZERO);
        head.encode(8 + self.debug_data.len(), dst);
        dst.extend_from_slice(&u32::from(self.last_stream_id).to_be_bytes());
        dst.extend_from_slice(&(self.error_code as u32).to_be_bytes());
        dst.extend_from_slice(&self.debug_data);
    }
}
