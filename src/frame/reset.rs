use crate::error::Reason;
use crate::frame::head::{Head, Kind, StreamId};

/// An `RST_STREAM` frame: abruptly terminates one stream without affecting
/// the rest of the connection.
#[derive(Debug, Clone, Copy)]
pub struct Reset {
    stream_id: StreamId,
    error_code: Reason,
}

impl Reset {
    pub fn new(stream_id: StreamId, error_code: Reason) -> Reset {
        Reset {
            stream_id,
            error_code,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.error_code
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Reset, super::Error> {
        if payload.len() != 4 {
            return Err(super::Error::InvalidPayloadLength);
        }
        if head.stream_id().is_zero() {
            return Err(super::Error::InvalidStreamId);
        }

        Ok(Reset {
            stream_id: head.stream_id(),
            error_code: Reason::from_u32(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])),
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::Reset, 0, self.stream_id);
        head.encode(4, dst);
        dst.extend_from_slice(&(self.error_code as u32).to_be_bytes());
    }
}
