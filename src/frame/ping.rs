use crate::frame::head::{Head, Kind, StreamId};

const ACK: u8 = 0x1;

pub type PingPayload = [u8; 8];

/// A `PING` frame, used as a liveness probe in either direction. The peer
/// must echo the payload back with `ACK` set; unsolicited pings from the
/// peer are ACKed by the connection state (C2) without surfacing to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    payload: PingPayload,
    ack: bool,
}

impl Ping {
    pub fn new(payload: PingPayload) -> Ping {
        Ping { payload, ack: false }
    }

    pub fn pong(payload: PingPayload) -> Ping {
        Ping { payload, ack: true }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> PingPayload {
        self.payload
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Ping, super::Error> {
        if !head.stream_id().is_zero() {
            return Err(super::Error::InvalidStreamId);
        }
        if payload.len() != 8 {
            return Err(super::Error::BadFrameSize);
        }

        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);

        Ok(Ping {
            payload: buf,
            ack: head.flag() & ACK == ACK,
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let flag = if self.ack { ACK } else { 0 };
        let head = Head::new(Kind::Ping, flag, StreamId::ZERO);
        head.encode(8, dst);
        dst.extend_from_slice(&self.payload);
    }
}
