//! The HTTP/2 connection state machine (C2): stream ids, settings
//! negotiation, flow control, and the single read/write loop that drives a
//! [`Connection`]. Everything gRPC-specific (message framing, metadata,
//! status) lives one layer up, in the crate root modules; this module only
//! knows about HTTP/2.

mod connection;
mod flow_control;
mod store;
mod stream_state;
mod streams;

pub use self::connection::{Connection, Handle, Incoming, StreamEvent};
pub use self::flow_control::FlowControl;
pub use self::stream_state::{StreamState, State};
pub use self::streams::{Config, Streams};

pub type WindowSize = u32;

pub const DEFAULT_INITIAL_WINDOW_SIZE: WindowSize = 65_535;
pub const MAX_WINDOW_SIZE: WindowSize = (1 << 31) - 1;
pub const DEFAULT_RESET_STREAM_SECS: u64 = 30;
pub const DEFAULT_RESET_STREAM_MAX: usize = 10;
pub const DEFAULT_MAX_CONCURRENT_STREAMS: u32 = 100;
pub const DEFAULT_MAX_RECV_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Which side of the connection this instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    pub fn is_server(self) -> bool {
        matches!(self, Role::Server)
    }
}
