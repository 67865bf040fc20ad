//! The per-Call state machine (§4.3 of the spec): `Idle -> Open ->
//! HalfClosed{Local,Remote} -> Closed`, tracked independently for the send
//! and receive directions so that `HalfClosedLocal`/`HalfClosedRemote` fall
//! out of the pair rather than needing their own explicit transitions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Idle,
    Open,
    Closed,
}

/// Joint stream state, derived from the two half-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

#[derive(Debug, Clone, Copy)]
pub struct State {
    send: Endpoint,
    recv: Endpoint,
}

impl State {
    pub fn new() -> State {
        State {
            send: Endpoint::Idle,
            recv: Endpoint::Idle,
        }
    }

    pub fn joint(&self) -> StreamState {
        match (self.send, self.recv) {
            (Endpoint::Idle, Endpoint::Idle) => StreamState::Idle,
            (Endpoint::Closed, Endpoint::Closed) => StreamState::Closed,
            (Endpoint::Closed, _) => StreamState::HalfClosedLocal,
            (_, Endpoint::Closed) => StreamState::HalfClosedRemote,
            _ => StreamState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.joint(), StreamState::Closed)
    }

    pub fn can_send_message(&self) -> bool {
        matches!(self.send, Endpoint::Open)
    }

    pub fn can_recv_message(&self) -> bool {
        matches!(self.recv, Endpoint::Open)
    }

    /// `SendHeaders`: idle send side opens.
    pub fn send_headers(&mut self) {
        debug_assert_eq!(self.send, Endpoint::Idle);
        self.send = Endpoint::Open;
    }

    /// `RecvHeaders`: idle recv side opens (peer's initial metadata).
    pub fn recv_headers(&mut self) {
        debug_assert_eq!(self.recv, Endpoint::Idle);
        self.recv = Endpoint::Open;
    }

    /// `SendEOS`: local `END_STREAM` sent.
    pub fn send_close(&mut self) {
        self.send = Endpoint::Closed;
    }

    /// `RecvEOS`: peer `END_STREAM` (or trailers) observed.
    pub fn recv_close(&mut self) {
        self.recv = Endpoint::Closed;
    }

    /// `Reset`: local cancel or peer `RST_STREAM` — both sides close at once.
    pub fn reset(&mut self) {
        self.send = Endpoint::Closed;
        self.recv = Endpoint::Closed;
    }
}

impl Default for State {
    fn default() -> State {
        State::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_unary() {
        let mut s = State::new();
        assert_eq!(s.joint(), StreamState::Idle);

        s.send_headers();
        s.recv_headers();
        assert_eq!(s.joint(), StreamState::Open);
        assert!(s.can_send_message());
        assert!(s.can_recv_message());

        s.send_close();
        assert_eq!(s.joint(), StreamState::HalfClosedLocal);
        assert!(!s.can_send_message());
        assert!(s.can_recv_message());

        s.recv_close();
        assert_eq!(s.joint(), StreamState::Closed);
        assert!(s.is_closed());
    }

    #[test]
    fn reset_closes_both_sides_immediately() {
        let mut s = State::new();
        s.send_headers();
        s.recv_headers();
        s.reset();
        assert!(s.is_closed());
    }
}
