//! Flow-control window bookkeeping, shared between the connection-level and
//! per-stream windows (RFC 7540 §6.9). Kept as a small, dependency-free type
//! so it can be unit tested in isolation from the connection state machine.

use crate::proto::WindowSize;

/// One half (send or receive) of one flow-control window.
#[derive(Debug, Clone, Copy)]
pub struct FlowControl {
    /// Window size as known to the peer. Can go negative transiently if the
    /// peer lowers `SETTINGS_INITIAL_WINDOW_SIZE` after data was already in
    /// flight (RFC 7540 §6.9.2).
    window_size: i64,
}

impl FlowControl {
    pub fn new(initial: WindowSize) -> FlowControl {
        FlowControl {
            window_size: i64::from(initial),
        }
    }

    /// The window size available right now, never negative.
    pub fn available(&self) -> WindowSize {
        if self.window_size < 0 {
            0
        } else {
            self.window_size as WindowSize
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.window_size <= 0
    }

    /// Applies a `WINDOW_UPDATE` increment.
    pub fn inc_window(&mut self, incr: u32) -> Result<(), crate::error::Error> {
        let new = self.window_size + i64::from(incr);
        if new > i64::from(crate::proto::MAX_WINDOW_SIZE) {
            return Err(crate::error::Error::protocol(
                crate::error::Reason::FlowControlError,
                "window increment overflowed SETTINGS_MAX_WINDOW_SIZE",
            ));
        }
        self.window_size = new;
        Ok(())
    }

    /// Accounts for `sz` bytes of `DATA` actually written to the wire. The
    /// caller must have already checked `available() >= sz`.
    pub fn send_data(&mut self, sz: usize) {
        debug_assert!(sz as i64 <= self.window_size.max(0));
        self.window_size -= sz as i64;
    }

    /// Reflects a peer settings change to `SETTINGS_INITIAL_WINDOW_SIZE`:
    /// the delta is applied directly to the outstanding window (RFC 7540
    /// §6.9.2), not just to future streams.
    pub fn apply_initial_window_delta(&mut self, delta: i64) {
        self.window_size += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_never_negative() {
        let mut fc = FlowControl::new(10);
        fc.send_data(10);
        assert_eq!(fc.available(), 0);
        fc.apply_initial_window_delta(-5);
        assert_eq!(fc.available(), 0);
        assert!(fc.is_exhausted());
    }

    #[test]
    fn window_update_replenishes() {
        let mut fc = FlowControl::new(0);
        fc.inc_window(100).unwrap();
        assert_eq!(fc.available(), 100);
        fc.send_data(40);
        assert_eq!(fc.available(), 60);
    }
}
