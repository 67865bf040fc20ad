//! Tunable limits (C10, ambient): window sizes, frame sizes, concurrency
//! caps, and the receive-side message size bound. Exposed as a builder so a
//! user can override any one knob without constructing the whole struct by
//! hand.

use crate::frame::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_SETTINGS_HEADER_TABLE_SIZE};
use crate::proto::{
    DEFAULT_INITIAL_WINDOW_SIZE, DEFAULT_MAX_CONCURRENT_STREAMS, DEFAULT_MAX_RECV_MESSAGE_SIZE,
    DEFAULT_RESET_STREAM_MAX,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub max_concurrent_streams: u32,
    pub initial_window_size: u32,
    pub max_recv_message_size: usize,
    /// `SETTINGS_MAX_FRAME_SIZE` we advertise: the largest `DATA`/`HEADERS`
    /// frame payload we're willing to receive.
    pub max_frame_size: u32,
    /// `SETTINGS_HEADER_TABLE_SIZE` we advertise, and the size of our own
    /// HPACK decoder table.
    pub header_table_size: u32,
    /// How many `RST_STREAM` frames the peer may send within
    /// [`crate::proto::DEFAULT_RESET_STREAM_SECS`] before it's treated as
    /// abuse (mitigates a rapid-reset stream flood) and the connection is
    /// closed with `ENHANCE_YOUR_CALM`.
    pub max_concurrent_reset_streams: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            max_concurrent_streams: DEFAULT_MAX_CONCURRENT_STREAMS,
            initial_window_size: DEFAULT_INITIAL_WINDOW_SIZE,
            max_recv_message_size: DEFAULT_MAX_RECV_MESSAGE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            header_table_size: DEFAULT_SETTINGS_HEADER_TABLE_SIZE,
            max_concurrent_reset_streams: DEFAULT_RESET_STREAM_MAX,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn max_concurrent_streams(mut self, max: u32) -> Builder {
        self.config.max_concurrent_streams = max;
        self
    }

    pub fn initial_window_size(mut self, size: u32) -> Builder {
        self.config.initial_window_size = size;
        self
    }

    pub fn max_recv_message_size(mut self, size: usize) -> Builder {
        self.config.max_recv_message_size = size;
        self
    }

    pub fn max_frame_size(mut self, size: u32) -> Builder {
        self.config.max_frame_size = size;
        self
    }

    pub fn header_table_size(mut self, size: u32) -> Builder {
        self.config.header_table_size = size;
        self
    }

    pub fn max_concurrent_reset_streams(mut self, max: usize) -> Builder {
        self.config.max_concurrent_reset_streams = max;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
