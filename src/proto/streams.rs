//! Per-stream bookkeeping the connection task owns exclusively: state,
//! both-direction flow control, and the channel used to deliver inbound
//! frame events to whatever is consuming this stream (a `Call` on the
//! user-facing side, or the accept loop for a brand-new server stream that
//! doesn't have a `Call` yet).

use tokio::sync::mpsc;

use crate::frame::{Pseudo, StreamId};
use crate::proto::flow_control::FlowControl;
use crate::proto::store::Store;
use crate::proto::stream_state::State;
use crate::proto::WindowSize;

/// Events the HTTP/2 engine (C2) delivers up to the gRPC framing layer (C3)
/// for one stream, in transport order.
#[derive(Debug)]
pub enum StreamEvent {
    /// The peer's `HEADERS` frame: initial metadata, or (if `end_stream`) a
    /// trailers-only response.
    Headers {
        pseudo: Pseudo,
        fields: Vec<(String, bytes::Bytes)>,
        end_stream: bool,
    },
    /// Raw `DATA` payload. Whole-message reassembly happens one layer up.
    Data { bytes: bytes::Bytes, end_stream: bool },
    /// The peer's trailing `HEADERS` frame, following a body.
    Trailers { fields: Vec<(String, bytes::Bytes)> },
    /// The peer reset the stream.
    Reset(crate::error::Reason),
    /// The connection is tearing down; no more events will follow.
    ConnectionClosed(crate::error::Error),
}

pub(crate) struct StreamEntry {
    pub state: State,
    pub send_flow: FlowControl,
    pub recv_flow: FlowControl,
    pub events: mpsc::UnboundedSender<StreamEvent>,
}

pub struct Config {
    pub init_local_window_sz: WindowSize,
    pub init_remote_window_sz: WindowSize,
    pub max_concurrent_streams: u32,
}

pub struct Streams {
    store: Store<StreamEntry>,
    config: Config,
    /// Connection-level send window (bytes we may still write).
    pub send_flow: FlowControl,
    /// Connection-level receive window (bytes the peer may still write).
    pub recv_flow: FlowControl,
    num_active: u32,
}

impl Streams {
    pub fn new(config: Config) -> Streams {
        Streams {
            send_flow: FlowControl::new(crate::proto::DEFAULT_INITIAL_WINDOW_SIZE),
            recv_flow: FlowControl::new(crate::proto::DEFAULT_INITIAL_WINDOW_SIZE),
            store: Store::new(),
            config,
            num_active: 0,
        }
    }

    pub fn max_concurrent_streams(&self) -> u32 {
        self.config.max_concurrent_streams
    }

    pub fn num_active(&self) -> u32 {
        self.num_active
    }

    pub fn insert(&mut self, id: StreamId, events: mpsc::UnboundedSender<StreamEvent>) {
        self.store.insert(
            id,
            StreamEntry {
                state: State::new(),
                // `send_flow` is bounded by what the peer told us it can
                // absorb; `recv_flow` is what we told the peer we can absorb.
                send_flow: FlowControl::new(self.config.init_remote_window_sz),
                recv_flow: FlowControl::new(self.config.init_local_window_sz),
                events,
            },
        );
        self.num_active += 1;
    }

    pub fn get(&self, id: &StreamId) -> Option<&StreamEntry> {
        self.store.get(id)
    }

    pub fn get_mut(&mut self, id: &StreamId) -> Option<&mut StreamEntry> {
        self.store.get_mut(id)
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.store.contains(id)
    }

    pub fn remove(&mut self, id: &StreamId) {
        if self.store.remove(id).is_some() {
            self.num_active = self.num_active.saturating_sub(1);
        }
    }

    pub fn send_event(&self, id: &StreamId, event: StreamEvent) {
        if let Some(entry) = self.store.get(id) {
            // A closed Call handle drops its receiver; send() failing is
            // then just "nobody cares anymore", not an error.
            let _ = entry.events.send(event);
        }
    }

    pub fn broadcast_closed(&mut self, err: crate::error::Error) {
        for (_, entry) in self.store.iter() {
            let _ = entry.events.send(StreamEvent::ConnectionClosed(clone_err(&err)));
        }
        self.store.drain_ids();
        self.num_active = 0;
    }

    pub fn ids(&self) -> Vec<StreamId> {
        self.store.iter().map(|(id, _)| *id).collect()
    }
}

fn clone_err(err: &crate::error::Error) -> crate::error::Error {
    // `Error` isn't `Clone` (it wraps a `Status`, which carries arbitrary
    // trailing metadata); re-derive an equivalent UNAVAILABLE for fan-out.
    crate::error::Error::transport(err.to_string())
}
