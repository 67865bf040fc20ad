//! The connection state machine (C2): a single task that owns the codec,
//! the stream table, and both flow-control windows, and drives everything
//! through one `tokio::select!` loop. There is one reader and one writer
//! *responsibility*, but they share one task and one `&mut self` — nothing
//! here needs `Arc<Mutex<_>>` because nothing outside this task ever touches
//! `Streams` or the codec directly; everyone else talks to it over a
//! [`Handle`].

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::codec::{Codec, OutFrame, PREFACE};
use crate::config::Config as ClientConfig;
use crate::error::{Error, Reason};
use crate::frame::{self, Data, Frame, GoAway, Headers, Ping, Pseudo, Reset, Settings, StreamId, WindowUpdate};
use crate::proto::streams::{Config as StreamsConfig, StreamEvent, Streams};
use crate::proto::Role;

pub use crate::proto::streams::StreamEvent;

/// A brand-new peer-initiated stream, handed to whatever is accepting
/// connections server-side. Carries the events channel so the accept loop
/// can build a `Call` without the connection task knowing what a `Call` is.
#[derive(Debug)]
pub struct Incoming {
    pub id: StreamId,
    pub pseudo: Pseudo,
    pub fields: Vec<(String, Bytes)>,
    pub events: mpsc::UnboundedReceiver<StreamEvent>,
}

enum Command {
    Open {
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
        reply: oneshot::Sender<Result<(StreamId, mpsc::UnboundedReceiver<StreamEvent>), Error>>,
    },
    SendHeaders {
        id: StreamId,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
        end_stream: bool,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    SendData {
        id: StreamId,
        data: Bytes,
        end_stream: bool,
        reply: oneshot::Sender<Result<(), Error>>,
    },
    Reset {
        id: StreamId,
        reason: Reason,
    },
    Ping {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// The caller-facing side of a connection: cheap to clone, safe to share
/// across every `Call` that multiplexes over the same transport.
#[derive(Clone)]
pub struct Handle {
    tx: mpsc::UnboundedSender<Command>,
}

impl Handle {
    /// Opens a new client-initiated stream and sends its initial metadata.
    /// Returns the allocated stream id and the channel the connection task
    /// will push [`StreamEvent`]s for this stream to.
    pub async fn open(
        &self,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
    ) -> Result<(StreamId, mpsc::UnboundedReceiver<StreamEvent>), Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Open { pseudo, fields, reply })
            .map_err(|_| Error::transport("connection task gone"))?;
        rx.await.map_err(|_| Error::transport("connection task gone"))?
    }

    pub async fn send_headers(
        &self,
        id: StreamId,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
        end_stream: bool,
    ) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SendHeaders {
                id,
                pseudo,
                fields,
                end_stream,
                reply,
            })
            .map_err(|_| Error::transport("connection task gone"))?;
        rx.await.map_err(|_| Error::transport("connection task gone"))?
    }

    pub async fn send_data(&self, id: StreamId, data: Bytes, end_stream: bool) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::SendData {
                id,
                data,
                end_stream,
                reply,
            })
            .map_err(|_| Error::transport("connection task gone"))?;
        rx.await.map_err(|_| Error::transport("connection task gone"))?
    }

    pub fn reset(&self, id: StreamId, reason: Reason) {
        let _ = self.tx.send(Command::Reset { id, reason });
    }

    pub async fn ping(&self) -> Result<(), Error> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Ping { reply })
            .map_err(|_| Error::transport("connection task gone"))?;
        rx.await.map_err(|_| Error::transport("connection task gone"))
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }
}

/// A `DATA` frame buffered because the outbound window could not absorb it
/// yet. Flushed opportunistically the next time a `WINDOW_UPDATE` arrives.
struct PendingSend {
    data: Bytes,
    end_stream: bool,
    reply: oneshot::Sender<Result<(), Error>>,
}

pub struct Connection<T> {
    codec: Codec<T>,
    role: Role,
    streams: Streams,
    next_local_stream_id: StreamId,
    last_peer_stream_id: StreamId,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    incoming_tx: Option<mpsc::UnboundedSender<Incoming>>,
    pending: std::collections::HashMap<StreamId, PendingSend, fnv::FnvBuildHasher>,
    peer_max_frame_size: usize,
    go_away_sent: bool,
    /// Set once the peer sends `GOAWAY`: the highest id, among streams we
    /// initiated, that the peer guarantees it processed. `None` means the
    /// peer hasn't started draining.
    peer_last_processed_id: Option<StreamId>,
    max_concurrent_reset_streams: usize,
    reset_stream_count: usize,
    reset_stream_window_start: Instant,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Performs the HTTP/2 preface exchange and sends this side's initial
    /// `SETTINGS`, then returns the connection task object (not yet
    /// running — call [`Connection::run`]), a [`Handle`] for issuing
    /// commands, and, for a server, the receiver of newly accepted streams.
    pub async fn handshake(
        mut io: T,
        role: Role,
        config: &ClientConfig,
    ) -> Result<(Connection<T>, Handle, Option<mpsc::UnboundedReceiver<Incoming>>), Error> {
        match role {
            Role::Client => {
                io.write_all(PREFACE).await?;
            }
            Role::Server => {
                let mut buf = [0u8; 24];
                io.read_exact(&mut buf).await?;
                if buf != *PREFACE {
                    return Err(Error::protocol(Reason::ProtocolError, "bad connection preface"));
                }
            }
        }

        let mut codec = Codec::new(io, config.header_table_size as usize);
        let mut settings = Settings::new();
        settings.set_max_concurrent_streams(Some(config.max_concurrent_streams));
        settings.set_initial_window_size(Some(config.initial_window_size));
        settings.set_max_frame_size(Some(config.max_frame_size));
        settings.set_header_table_size(Some(config.header_table_size));
        codec.write.encode(OutFrame::Settings(settings));
        codec.write.flush().await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = match role {
            Role::Server => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(rx))
            }
            Role::Client => (None, None),
        };

        let streams = Streams::new(StreamsConfig {
            init_local_window_sz: config.initial_window_size,
            init_remote_window_sz: crate::proto::DEFAULT_INITIAL_WINDOW_SIZE,
            max_concurrent_streams: config.max_concurrent_streams,
        });

        let conn = Connection {
            codec,
            role,
            streams,
            next_local_stream_id: if role.is_server() { StreamId::from(2) } else { StreamId::from(1) },
            last_peer_stream_id: StreamId::ZERO,
            cmd_rx,
            incoming_tx,
            pending: std::collections::HashMap::default(),
            peer_max_frame_size: frame::DEFAULT_MAX_FRAME_LEN,
            go_away_sent: false,
            peer_last_processed_id: None,
            max_concurrent_reset_streams: config.max_concurrent_reset_streams,
            reset_stream_count: 0,
            reset_stream_window_start: Instant::now(),
        };

        Ok((conn, Handle { tx: cmd_tx }, incoming_rx))
    }

    /// Drives the connection until the transport closes, a protocol error
    /// occurs, or every [`Handle`] is dropped and no streams remain live.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                frame = self.codec.read.read_frame() => {
                    match frame {
                        Ok(Some(f)) => {
                            if let Err(e) = self.process_frame(f).await {
                                self.fail(e).await;
                                return;
                            }
                        }
                        Ok(None) => {
                            self.fail(Error::transport("connection closed by peer")).await;
                            return;
                        }
                        Err(e) => {
                            self.fail(e).await;
                            return;
                        }
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Shutdown) | None => {
                            let _ = self.send_go_away(Reason::NoError).await;
                            let _ = self.codec.write.shutdown().await;
                            return;
                        }
                        Some(cmd) => {
                            if let Err(e) = self.process_command(cmd).await {
                                tracing::debug!(error = %e, "command failed");
                            }
                        }
                    }
                }
            }
        }
    }

    async fn fail(&mut self, err: Error) {
        tracing::debug!(error = %err, "connection failing");
        self.streams.broadcast_closed(err);
    }

    async fn send_go_away(&mut self, reason: Reason) -> Result<(), Error> {
        if self.go_away_sent {
            return Ok(());
        }
        self.go_away_sent = true;
        self.codec.write.encode(OutFrame::GoAway(GoAway::new(self.last_peer_stream_id, reason)));
        self.codec.write.flush().await
    }

    // -- inbound frames -----------------------------------------------

    async fn process_frame(&mut self, frame: Frame) -> Result<(), Error> {
        match frame {
            Frame::Settings(s) => self.on_settings(s).await,
            Frame::Ping(p) => self.on_ping(p).await,
            Frame::WindowUpdate(w) => self.on_window_update(w).await,
            Frame::Headers(h) => self.on_headers(h).await,
            Frame::Data(d) => self.on_data(d).await,
            Frame::Reset(r) => self.on_reset(r),
            Frame::GoAway(g) => self.on_go_away(g).await,
        }
    }

    /// A `GOAWAY` is the peer starting to drain, not necessarily a hard
    /// failure: streams it has already agreed to process (id <=
    /// `last_stream_id`) are left to run to completion, and only streams we
    /// initiated above that watermark are failed locally, since the peer
    /// never promised to have looked at them. A non-`NoError` code still
    /// tears down the whole connection, matching the old behavior for an
    /// actual protocol violation.
    async fn on_go_away(&mut self, g: GoAway) -> Result<(), Error> {
        tracing::debug!(last_stream_id = %g.last_stream_id(), error = %g.reason(), "received GOAWAY");
        let last_processed = g.last_stream_id();
        self.peer_last_processed_id = Some(last_processed);

        for id in self.streams.ids() {
            let locally_initiated = match self.role {
                Role::Client => id.is_client_initiated(),
                Role::Server => id.is_server_initiated(),
            };
            if locally_initiated && id > last_processed {
                self.streams.send_event(
                    &id,
                    StreamEvent::ConnectionClosed(Error::protocol(
                        Reason::RefusedStream,
                        "peer is draining (GOAWAY)",
                    )),
                );
                self.streams.remove(&id);
                self.pending.remove(&id);
            }
        }

        if g.reason() != Reason::NoError {
            return Err(Error::protocol(g.reason(), "peer sent GOAWAY"));
        }
        Ok(())
    }

    async fn on_settings(&mut self, settings: Settings) -> Result<(), Error> {
        if settings.is_ack() {
            return Ok(());
        }
        if let Some(frame_size) = settings.max_frame_size() {
            self.peer_max_frame_size = frame_size as usize;
        }
        if let Some(new_window) = settings.initial_window_size() {
            let delta = i64::from(new_window) - i64::from(crate::proto::DEFAULT_INITIAL_WINDOW_SIZE);
            for id in self.streams.ids() {
                if let Some(entry) = self.streams.get_mut(&id) {
                    entry.send_flow.apply_initial_window_delta(delta);
                }
            }
        }
        self.codec.write.encode(OutFrame::Settings(Settings::ack()));
        self.codec.write.flush().await
    }

    async fn on_ping(&mut self, ping: Ping) -> Result<(), Error> {
        if ping.is_ack() {
            return Ok(());
        }
        self.codec.write.encode(OutFrame::Ping(Ping::pong(ping.payload())));
        self.codec.write.flush().await
    }

    async fn on_window_update(&mut self, w: WindowUpdate) -> Result<(), Error> {
        if w.stream_id().is_zero() {
            self.streams.send_flow.inc_window(w.size_increment())?;
            let ids = self.streams.ids();
            for id in ids {
                self.try_flush_pending(id).await?;
            }
        } else if let Some(entry) = self.streams.get_mut(&w.stream_id()) {
            entry.send_flow.inc_window(w.size_increment())?;
            self.try_flush_pending(w.stream_id()).await?;
        }
        Ok(())
    }

    async fn on_headers(&mut self, h: Headers) -> Result<(), Error> {
        let id = h.stream_id();
        let end_stream = h.is_end_stream();
        let (pseudo, fields) = h.into_parts();

        if !self.streams.contains(&id) {
            if self.role.is_server() && id.is_client_initiated() {
                return self.accept_new_stream(id, pseudo, fields, end_stream).await;
            }
            return Err(Error::protocol(Reason::ProtocolError, "HEADERS for unknown stream"));
        }

        let entry = self.streams.get_mut(&id).expect("checked contains");
        if entry.state.can_recv_message() {
            // Trailing headers after a body.
            entry.state.recv_close();
            self.streams.send_event(&id, StreamEvent::Trailers { fields });
        } else {
            entry.state.recv_headers();
            if end_stream {
                entry.state.recv_close();
            }
            self.streams.send_event(
                &id,
                StreamEvent::Headers {
                    pseudo,
                    fields,
                    end_stream,
                },
            );
        }
        self.reap_if_closed(id);
        Ok(())
    }

    async fn accept_new_stream(
        &mut self,
        id: StreamId,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
        end_stream: bool,
    ) -> Result<(), Error> {
        if self.streams.num_active() >= self.streams.max_concurrent_streams() {
            self.codec.write.encode(OutFrame::Reset(Reset::new(id, Reason::RefusedStream)));
            return self.codec.write.flush().await;
        }
        self.last_peer_stream_id = id;
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.insert(id, tx);
        if let Some(entry) = self.streams.get_mut(&id) {
            entry.state.recv_headers();
            if end_stream {
                entry.state.recv_close();
            }
        }
        if let Some(incoming_tx) = &self.incoming_tx {
            let _ = incoming_tx.send(Incoming {
                id,
                pseudo,
                fields,
                events: rx,
            });
        }
        self.reap_if_closed(id);
        Ok(())
    }

    async fn on_data(&mut self, d: Data) -> Result<(), Error> {
        let id = d.stream_id();
        let end_stream = d.is_end_stream();
        let len = d.payload().len() as u32;

        self.streams.recv_flow.send_data(len as usize);
        if let Some(entry) = self.streams.get_mut(&id) {
            entry.recv_flow.send_data(len as usize);
        } else {
            return Err(Error::protocol(Reason::StreamClosed, "DATA for unknown stream"));
        }

        // Simplified auto-update policy: replenish exactly what was spent,
        // on every frame. No batching/threshold heuristics.
        self.codec.write.encode(OutFrame::WindowUpdate(WindowUpdate::new(StreamId::ZERO, len)));
        self.codec.write.encode(OutFrame::WindowUpdate(WindowUpdate::new(id, len)));
        if let Some(entry) = self.streams.get_mut(&id) {
            entry.recv_flow.inc_window(len)?;
        }
        self.streams.recv_flow.inc_window(len)?;
        self.codec.write.flush().await?;

        if end_stream {
            if let Some(entry) = self.streams.get_mut(&id) {
                entry.state.recv_close();
            }
        }
        self.streams.send_event(&id, StreamEvent::Data { bytes: d.into_payload(), end_stream });
        self.reap_if_closed(id);
        Ok(())
    }

    fn on_reset(&mut self, r: Reset) -> Result<(), Error> {
        let id = r.stream_id();
        if let Some(entry) = self.streams.get_mut(&id) {
            entry.state.reset();
        }
        self.streams.send_event(&id, StreamEvent::Reset(r.reason()));
        self.streams.remove(&id);
        self.pending.remove(&id);
        self.note_peer_reset()
    }

    /// A flood of `RST_STREAM` frames (open a stream, reset it immediately,
    /// repeat) costs the peer almost nothing but makes us do real work per
    /// stream; close the connection once too many arrive inside one window.
    fn note_peer_reset(&mut self) -> Result<(), Error> {
        let now = Instant::now();
        if now.duration_since(self.reset_stream_window_start) > Duration::from_secs(crate::proto::DEFAULT_RESET_STREAM_SECS)
        {
            self.reset_stream_window_start = now;
            self.reset_stream_count = 0;
        }
        self.reset_stream_count += 1;
        if self.reset_stream_count > self.max_concurrent_reset_streams {
            return Err(Error::protocol(Reason::EnhanceYourCalm, "too many stream resets"));
        }
        Ok(())
    }

    fn reap_if_closed(&mut self, id: StreamId) {
        if let Some(entry) = self.streams.get(&id) {
            if entry.state.is_closed() {
                self.streams.remove(&id);
            }
        }
    }

    // -- outbound commands ----------------------------------------------

    async fn process_command(&mut self, cmd: Command) -> Result<(), Error> {
        match cmd {
            Command::Open { pseudo, fields, reply } => {
                let result = self.do_open(pseudo, fields).await;
                let _ = reply.send(result);
                Ok(())
            }
            Command::SendHeaders {
                id,
                pseudo,
                fields,
                end_stream,
                reply,
            } => {
                let result = self.do_send_headers(id, pseudo, fields, end_stream).await;
                let _ = reply.send(result);
                Ok(())
            }
            Command::SendData { id, data, end_stream, reply } => self.do_send_data(id, data, end_stream, reply).await,
            Command::Reset { id, reason } => {
                self.codec.write.encode(OutFrame::Reset(Reset::new(id, reason)));
                self.codec.write.flush().await?;
                if let Some(entry) = self.streams.get_mut(&id) {
                    entry.state.reset();
                }
                self.streams.remove(&id);
                self.pending.remove(&id);
                Ok(())
            }
            Command::Ping { reply } => {
                self.codec.write.encode(OutFrame::Ping(Ping::new([0u8; 8])));
                self.codec.write.flush().await?;
                let _ = reply.send(());
                Ok(())
            }
            Command::Shutdown => unreachable!("handled in run()"),
        }
    }

    async fn do_open(
        &mut self,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
    ) -> Result<(StreamId, mpsc::UnboundedReceiver<StreamEvent>), Error> {
        if self.peer_last_processed_id.is_some() {
            return Err(Error::protocol(Reason::RefusedStream, "peer is draining (GOAWAY received)"));
        }
        if self.streams.num_active() >= self.streams.max_concurrent_streams() {
            return Err(Error::protocol(Reason::RefusedStream, "max concurrent streams reached"));
        }
        let id = self.next_local_stream_id;
        self.next_local_stream_id = id.next();

        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.insert(id, tx);
        if let Some(entry) = self.streams.get_mut(&id) {
            entry.state.send_headers();
        }

        let headers = Headers::new(id, pseudo, fields);
        self.codec.write.encode(OutFrame::Headers(headers));
        self.codec.write.flush().await?;

        Ok((id, rx))
    }

    async fn do_send_headers(
        &mut self,
        id: StreamId,
        pseudo: Pseudo,
        fields: Vec<(String, Bytes)>,
        end_stream: bool,
    ) -> Result<(), Error> {
        let entry = self
            .streams
            .get_mut(&id)
            .ok_or_else(|| Error::protocol(Reason::StreamClosed, "stream gone"))?;
        if !entry.state.can_send_message() {
            entry.state.send_headers();
        }
        if end_stream {
            entry.state.send_close();
        }

        let mut h = Headers::new(id, pseudo, fields);
        if end_stream {
            h.set_end_stream();
        }
        self.codec.write.encode(OutFrame::Headers(h));
        self.codec.write.flush().await?;
        self.reap_if_closed(id);
        Ok(())
    }

    async fn do_send_data(
        &mut self,
        id: StreamId,
        data: Bytes,
        end_stream: bool,
        reply: oneshot::Sender<Result<(), Error>>,
    ) -> Result<(), Error> {
        if !self.streams.contains(&id) {
            let _ = reply.send(Err(Error::protocol(Reason::StreamClosed, "stream gone")));
            return Ok(());
        }
        self.buffer_send(id, data, end_stream, reply);
        self.try_flush_pending(id).await
    }

    fn buffer_send(&mut self, id: StreamId, data: Bytes, end_stream: bool, reply: oneshot::Sender<Result<(), Error>>) {
        // At most one in-flight write per stream: callers serialize sends
        // through `Call`, so a second `SendData` before the first settles
        // cannot happen in practice.
        self.pending.insert(id, PendingSend { data, end_stream, reply });
    }

    /// Writes as much of `id`'s pending `DATA` as the connection- and
    /// stream-level windows allow, chunked to the peer's advertised max
    /// frame size. Replies to the caller once the whole payload is written.
    async fn try_flush_pending(&mut self, id: StreamId) -> Result<(), Error> {
        loop {
            if !self.pending.contains_key(&id) {
                return Ok(());
            }

            // A zero-length DATA frame (end-of-stream with no final bytes)
            // doesn't consume flow-control window and can go out immediately.
            let pending_is_empty = self.pending.get(&id).map_or(true, |p| p.data.is_empty());

            let conn_avail = self.streams.send_flow.available();
            let stream_avail = match self.streams.get(&id) {
                Some(entry) => entry.send_flow.available(),
                None => return Ok(()),
            };
            let avail = conn_avail.min(stream_avail) as usize;
            if avail == 0 && !pending_is_empty {
                return Ok(());
            }

            let pending = match self.pending.get_mut(&id) {
                Some(p) => p,
                None => return Ok(()),
            };

            let chunk_len = avail.min(self.peer_max_frame_size).min(pending.data.len());
            let chunk = pending.data.split_to(chunk_len);
            let is_last_chunk = pending.data.is_empty();
            let frame_end_stream = is_last_chunk && pending.end_stream;

            self.streams.send_flow.send_data(chunk_len);
            if let Some(entry) = self.streams.get_mut(&id) {
                entry.send_flow.send_data(chunk_len);
            }

            let mut frame = Data::new(id, chunk);
            if frame_end_stream {
                frame.set_end_stream();
            }
            self.codec.write.encode(OutFrame::Data(frame));
            self.codec.write.flush().await?;

            if is_last_chunk {
                let pending = self.pending.remove(&id).expect("just matched");
                if pending.end_stream {
                    if let Some(entry) = self.streams.get_mut(&id) {
                        entry.state.send_close();
                    }
                    self.reap_if_closed(id);
                }
                let _ = pending.reply.send(Ok(()));
                return Ok(());
            }
        }
    }
}
