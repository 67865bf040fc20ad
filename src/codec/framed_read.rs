//! Frame boundary detection and assembly on the read side (C1/C2): turns a
//! byte stream into a sequence of [`Frame`]s, reassembling `HEADERS` +
//! `CONTINUATION` into one logical header block before handing it to HPACK.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::frame::{self, Data, Frame, GoAway, Head, Headers, Kind, Ping, Reset, Settings, StreamId, WindowUpdate};
use crate::hpack::Decoder;

struct PartialHeaders {
    head: Head,
    stream_id: StreamId,
    block: BytesMut,
}

pub struct FramedRead<R> {
    io: R,
    hpack: Decoder,
    max_frame_size: usize,
    partial: Option<PartialHeaders>,
}

impl<R> FramedRead<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(io: R, header_table_size: usize) -> FramedRead<R> {
        FramedRead {
            io,
            hpack: Decoder::new(header_table_size),
            max_frame_size: frame::DEFAULT_MAX_FRAME_LEN,
            partial: None,
        }
    }

    pub fn set_max_frame_size(&mut self, max: usize) {
        self.max_frame_size = max;
    }

    async fn read_payload(&mut self, head: &Head, len: usize) -> Result<Bytes, crate::error::Error> {
        if len > self.max_frame_size {
            return Err(frame::Error::InvalidPayloadLength.into());
        }
        let _ = head;
        let mut buf = vec![0u8; len];
        self.io.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    /// Reads frames from the transport until a fully-formed [`Frame`] is
    /// ready to hand to the connection state machine, or the transport
    /// reaches EOF (`Ok(None)`).
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, crate::error::Error> {
        loop {
            let mut header = [0u8; frame::HEADER_LEN];
            match self.io.read_exact(&mut header).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e.into()),
            }

            let (head, len) = Head::parse(&header);
            let payload = self.read_payload(&head, len).await?;

            if let Some(frame) = self.assemble(head, payload)? {
                return Ok(Some(frame));
            }
            // Otherwise: a non-terminal CONTINUATION, or a frame kind this
            // engine ignores (PRIORITY, PUSH_PROMISE, unknown extension
            // frames) — loop to read the next one.
        }
    }

    fn assemble(&mut self, head: Head, payload: Bytes) -> Result<Option<Frame>, crate::error::Error> {
        const END_HEADERS: u8 = 0x4;

        match head.kind() {
            Kind::Data => Ok(Some(Frame::Data(Data::load(head, payload)?))),
            Kind::Settings => Ok(Some(Frame::Settings(Settings::load(head, &payload)?))),
            Kind::Ping => Ok(Some(Frame::Ping(Ping::load(head, &payload)?))),
            Kind::GoAway => Ok(Some(Frame::GoAway(GoAway::load(head, &payload)?))),
            Kind::Reset => Ok(Some(Frame::Reset(Reset::load(head, &payload)?))),
            Kind::WindowUpdate => Ok(Some(Frame::WindowUpdate(WindowUpdate::load(head, &payload)?))),
            Kind::Headers => {
                if self.partial.is_some() {
                    return Err(frame::Error::MalformedHeader.into());
                }
                if head.flag() & END_HEADERS == END_HEADERS {
                    Ok(Some(Frame::Headers(Headers::load(head, &payload, &mut self.hpack)?)))
                } else {
                    let mut block = BytesMut::new();
                    block.extend_from_slice(&payload);
                    self.partial = Some(PartialHeaders {
                        stream_id: head.stream_id(),
                        head,
                        block,
                    });
                    Ok(None)
                }
            }
            Kind::Continuation => {
                let mut partial = self
                    .partial
                    .take()
                    .ok_or(frame::Error::MalformedHeader)?;
                if partial.stream_id != head.stream_id() {
                    return Err(frame::Error::MalformedHeader.into());
                }
                partial.block.extend_from_slice(&payload);

                if head.flag() & END_HEADERS == END_HEADERS {
                    let block = partial.block.freeze();
                    Ok(Some(Frame::Headers(Headers::load(partial.head, &block, &mut self.hpack)?)))
                } else {
                    self.partial = Some(partial);
                    Ok(None)
                }
            }
            // PRIORITY and PUSH_PROMISE are accepted but ignored: priority
            // has no meaning for gRPC's single-endpoint calls and server
            // push is always disabled in our outbound SETTINGS.
            Kind::Priority | Kind::PushPromise | Kind::Unknown(_) => Ok(None),
        }
    }
}
