//! The transport adapter (C1): owns the byte-duplex stream, turns it into
//! framed reads and writes. `Codec` is the thing the connection state
//! machine (C2, `proto::Connection`) drives; it never interprets frame
//! *semantics*, only wire shape.

mod framed_read;
mod framed_write;

pub use self::framed_read::FramedRead;
pub use self::framed_write::{FramedWrite, OutFrame};

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

/// The client connection preface (RFC 7540 §3.5). Sent by the client before
/// its first `SETTINGS` frame; the server reads it off the wire before
/// sending its own `SETTINGS`.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

pub struct Codec<T> {
    pub read: FramedRead<ReadHalf<T>>,
    pub write: FramedWrite<WriteHalf<T>>,
}

impl<T> Codec<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: T, header_table_size: usize) -> Codec<T> {
        let (r, w) = tokio::io::split(io);
        Codec {
            read: FramedRead::new(r, header_table_size),
            write: FramedWrite::new(w),
        }
    }
}
