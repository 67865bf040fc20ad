//! The Call object (C4): one RPC on one HTTP/2 stream. `Call` itself only
//! knows about gRPC framing — metadata, whole-message byte payloads, and
//! terminal status. Protobuf typing is layered on top by the cardinality
//! wrappers (C5); `Call` never deserializes a message, only reassembles it.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Reason};
use crate::frame::{Pseudo, StreamId};
use crate::message_codec::{self, MessageDecoder};
use crate::metadata::MetadataMap;
use crate::proto::{Handle, Role, StreamEvent};
use crate::status::{Code, Status};

pub(crate) struct CallParts {
    pub handle: Handle,
    pub id: StreamId,
    pub role: Role,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
    pub path: String,
    pub max_recv_message_size: usize,
    pub deadline: Option<Instant>,
}

/// One RPC, bound to one HTTP/2 stream on some `Connection`. Shared by
/// client stubs and server handlers; cardinality wrappers borrow it
/// mutably and add the protobuf typing and the per-shape send/recv shape.
pub struct Call {
    handle: Handle,
    id: StreamId,
    role: Role,
    events: mpsc::UnboundedReceiver<StreamEvent>,
    decoder: MessageDecoder,
    ready: VecDeque<Bytes>,
    path: String,
    send_closed: bool,
    recv_closed: bool,
    initial_metadata_sent: bool,
    terminal: Option<Status>,
    deadline: Option<Instant>,
}

impl Call {
    pub(crate) fn new(parts: CallParts) -> Call {
        Call {
            handle: parts.handle,
            id: parts.id,
            role: parts.role,
            events: parts.events,
            decoder: MessageDecoder::new(parts.max_recv_message_size),
            ready: VecDeque::new(),
            path: parts.path,
            send_closed: false,
            recv_closed: false,
            initial_metadata_sent: false,
            terminal: None,
            deadline: parts.deadline,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_send_closed(&self) -> bool {
        self.send_closed
    }

    pub fn is_recv_closed(&self) -> bool {
        self.recv_closed
    }

    /// Server-only: sends the response's initial metadata (`:status: 200`
    /// plus any custom headers) ahead of the first message. Optional — the
    /// first `send_message`/`send_status` call sends it implicitly with an
    /// empty metadata set if the handler never calls this explicitly.
    pub async fn send_initial_metadata(&mut self, metadata: &MetadataMap) -> Result<(), Error> {
        if !self.role.is_server() {
            return Err(Error::protocol(Reason::InternalError, "only a server sends initial metadata explicitly"));
        }
        if self.initial_metadata_sent {
            return Err(Error::protocol(Reason::InternalError, "initial metadata already sent"));
        }
        self.initial_metadata_sent = true;

        let mut fields = vec![("content-type".to_owned(), Bytes::from_static(b"application/grpc+proto"))];
        fields.extend(metadata.to_wire_fields());
        self.handle
            .send_headers(self.id, Pseudo::response(http::StatusCode::OK), fields, false)
            .await
    }

    /// Encodes and sends one whole message. `payload` is already
    /// protobuf-encoded; framing (the 5-byte envelope) happens here.
    pub async fn send_message(&mut self, payload: Bytes) -> Result<(), Error> {
        if self.send_closed {
            return Err(Error::protocol(Reason::StreamClosed, "send side already closed"));
        }
        if self.role.is_server() && !self.initial_metadata_sent {
            self.send_initial_metadata(&MetadataMap::new()).await?;
        }
        let framed = message_codec::encode_envelope(&payload);
        self.handle.send_data(self.id, framed, false).await
    }

    /// Client-only: half-closes the send side with no further content.
    pub async fn close_send(&mut self) -> Result<(), Error> {
        if self.send_closed {
            return Ok(());
        }
        self.send_closed = true;
        self.handle.send_data(self.id, Bytes::new(), true).await
    }

    /// Server-only: emits the terminating trailers (or, if no prior
    /// `send_initial_metadata`/`send_message`, a trailers-only response).
    pub async fn send_status(&mut self, status: Status) -> Result<(), Error> {
        if self.send_closed {
            return Ok(());
        }
        self.send_closed = true;

        let mut fields = Vec::new();
        let pseudo = if self.initial_metadata_sent {
            Pseudo::default()
        } else {
            fields.push(("content-type".to_owned(), Bytes::from_static(b"application/grpc+proto")));
            Pseudo::response(http::StatusCode::OK)
        };
        self.initial_metadata_sent = true;
        fields.extend(status.to_trailer_fields());

        self.handle.send_headers(self.id, pseudo, fields, true).await
    }

    /// Cancels the call locally: `RST_STREAM(CANCEL)`, terminal status
    /// `CANCELLED`.
    pub fn cancel(&mut self, reason: impl Into<String>) {
        if self.terminal.is_none() {
            self.terminal = Some(Status::new(Code::Cancelled, reason.into()));
        }
        self.send_closed = true;
        self.recv_closed = true;
        self.handle.reset(self.id, Reason::Cancel);
    }

    /// Waits for the peer's initial metadata. Fails with the trailers-only
    /// status if the peer closed the stream before sending any body.
    pub async fn recv_initial_metadata(&mut self) -> Result<MetadataMap, Error> {
        loop {
            match self.next_event().await? {
                StreamEvent::Headers { pseudo, fields, end_stream } => {
                    if end_stream {
                        let status = Self::trailers_only_status(pseudo, &fields);
                        self.recv_closed = true;
                        self.terminal = Some(status.clone());
                        return Err(status.into());
                    }
                    return Ok(MetadataMap::from_wire_fields(&fields));
                }
                other => self.absorb_non_headers(other)?,
            }
        }
    }

    /// Waits for the next whole message, or `Ok(None)` once the peer has
    /// ended the stream with an `OK` status.
    pub async fn recv_message(&mut self) -> Result<Option<Bytes>, Error> {
        loop {
            if let Some(raw) = self.ready.pop_front() {
                return Ok(Some(raw));
            }
            if let Some(status) = self.terminal.clone() {
                return if status.is_ok() { Ok(None) } else { Err(status.into()) };
            }

            match self.next_event().await? {
                StreamEvent::Headers { end_stream, pseudo, fields } => {
                    if end_stream {
                        self.terminal = Some(Self::trailers_only_status(pseudo, &fields));
                        self.recv_closed = true;
                    }
                    // Initial metadata the caller never consumed via
                    // `recv_initial_metadata`; nothing to do with it here.
                }
                StreamEvent::Data { bytes, end_stream } => {
                    self.decoder.push(bytes);
                    self.ready.extend(self.decoder.drain_messages()?);
                    if end_stream {
                        self.recv_closed = true;
                        if self.decoder.has_partial_message() {
                            return Err(Error::codec("stream ended mid-message"));
                        }
                        if self.terminal.is_none() {
                            // END_STREAM on a DATA frame with no separate
                            // trailers HEADERS: treat as implicit OK.
                            self.terminal = Some(Status::ok());
                        }
                    }
                }
                StreamEvent::Trailers { fields } => {
                    self.recv_closed = true;
                    self.terminal = Some(Status::from_trailer_fields(&fields));
                }
                StreamEvent::Reset(reason) => {
                    return Err(Error::protocol(reason, "stream reset by peer"));
                }
                StreamEvent::ConnectionClosed(err) => return Err(err),
            }
        }
    }

    fn absorb_non_headers(&mut self, event: StreamEvent) -> Result<(), Error> {
        match event {
            StreamEvent::Data { bytes, end_stream } => {
                self.decoder.push(bytes);
                self.ready.extend(self.decoder.drain_messages()?);
                if end_stream {
                    self.recv_closed = true;
                }
                Ok(())
            }
            StreamEvent::Trailers { fields } => {
                self.recv_closed = true;
                self.terminal = Some(Status::from_trailer_fields(&fields));
                Ok(())
            }
            StreamEvent::Reset(reason) => Err(Error::protocol(reason, "stream reset by peer")),
            StreamEvent::ConnectionClosed(err) => Err(err),
            StreamEvent::Headers { .. } => {
                Err(Error::protocol(Reason::ProtocolError, "unexpected second initial HEADERS"))
            }
        }
    }

    async fn next_event(&mut self) -> Result<StreamEvent, Error> {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    ev = self.events.recv() => ev.ok_or_else(|| self.closed_error()),
                    _ = tokio::time::sleep_until(deadline) => {
                        self.handle.reset(self.id, Reason::Cancel);
                        let status = Status::new(Code::DeadlineExceeded, "deadline exceeded");
                        self.terminal = Some(status.clone());
                        self.recv_closed = true;
                        self.send_closed = true;
                        Err(status.into())
                    }
                }
            }
            None => self.events.recv().await.ok_or_else(|| self.closed_error()),
        }
    }

    fn closed_error(&self) -> Error {
        match &self.terminal {
            Some(status) => status.clone().into(),
            None => Error::transport("connection closed before the stream completed"),
        }
    }

    fn trailers_only_status(pseudo: Pseudo, fields: &[(String, Bytes)]) -> Status {
        if let Some(http_status) = pseudo.status {
            if http_status != http::StatusCode::OK {
                return Status::new(Code::from_http(http_status), format!("non-200 response: {http_status}"));
            }
        }
        Status::from_trailer_fields(fields)
    }
}

impl Drop for Call {
    /// A `Call` dropped before both directions reached a terminal state is
    /// an incomplete RPC, not a completed one: reset the stream so the peer
    /// doesn't hang waiting for trailers or more data that will never come.
    /// A no-op if `send_status`/`cancel` already closed both sides.
    fn drop(&mut self) {
        if !self.send_closed || !self.recv_closed {
            self.handle.reset(self.id, Reason::Cancel);
        }
    }
}
