//! Write-side framing (C1): encodes outbound frames and batches them into as
//! few transport writes as possible. A single `send_message` on a small
//! unary call typically produces a `HEADERS` + `DATA` pair that should reach
//! the wire in one `write_all`, not two.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::frame::{Data, GoAway, Headers, Ping, Reset, Settings, WindowUpdate};
use crate::hpack::Encoder;

/// One frame queued for the wire. Mirrors [`crate::frame::Frame`] but split
/// out so the write path does not need a decoder half.
pub enum OutFrame {
    Data(Data),
    Headers(Headers),
    Settings(Settings),
    Ping(Ping),
    GoAway(GoAway),
    Reset(Reset),
    WindowUpdate(WindowUpdate),
}

pub struct FramedWrite<W> {
    io: W,
    hpack: Encoder,
    buf: Vec<u8>,
}

impl<W> FramedWrite<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(io: W) -> FramedWrite<W> {
        FramedWrite {
            io,
            hpack: Encoder::new(),
            buf: Vec::with_capacity(4 * 1024),
        }
    }

    /// Appends one frame's wire bytes to the pending write buffer without
    /// touching the transport. Call [`FramedWrite::flush`] to actually
    /// write; callers batch several `encode` calls (e.g. trailers after the
    /// last message) before flushing once.
    pub fn encode(&mut self, frame: OutFrame) {
        match frame {
            OutFrame::Data(f) => f.encode(&mut self.buf),
            OutFrame::Headers(f) => f.encode(&mut self.hpack, &mut self.buf),
            OutFrame::Settings(f) => f.encode(&mut self.buf),
            OutFrame::Ping(f) => f.encode(&mut self.buf),
            OutFrame::GoAway(f) => f.encode(&mut self.buf),
            OutFrame::Reset(f) => f.encode(&mut self.buf),
            OutFrame::WindowUpdate(f) => f.encode(&mut self.buf),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    pub async fn flush(&mut self) -> Result<(), crate::error::Error> {
        if !self.buf.is_empty() {
            self.io.write_all(&self.buf).await?;
            self.buf.clear();
        }
        self.io.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), crate::error::Error> {
        self.flush().await?;
        self.io.shutdown().await?;
        Ok(())
    }
}
