use crate::frame::head::{Head, Kind, StreamId};

/// A `WINDOW_UPDATE` frame: replenishes either the connection-level window
/// (stream id 0) or one stream's window.
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdate {
    stream_id: StreamId,
    increment: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, increment: u32) -> WindowUpdate {
        WindowUpdate {
            stream_id,
            increment,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn size_increment(&self) -> u32 {
        self.increment
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<WindowUpdate, super::Error> {
        if payload.len() != 4 {
            return Err(super::Error::InvalidPayloadLength);
        }

        let increment = u32::from_be_bytes([payload[0] & 0x7f, payload[1], payload[2], payload[3]]);
        Ok(WindowUpdate {
            stream_id: head.stream_id(),
            increment,
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::WindowUpdate, 0, self.stream_id);
        head.encode(4, dst);
        dst.extend_from_slice(&self.increment.to_be_bytes());
    }
}
