//! Cardinality wrappers (C5): four thin, typed adapters over one untyped
//! [`Call`], each giving the caller exactly the send/recv shape its RPC
//! signature promises. None of these hold any state beyond the `Call`
//! itself — they are disposable views, not separate objects with their own
//! lifecycle.

use bytes::Bytes;
use prost::Message;

use crate::call::Call;
use crate::error::Error;
use crate::status::{Code, Status};

/// The (request-streaming, response-streaming) shape of one RPC method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    UnaryUnary,
    UnaryStream,
    StreamUnary,
    StreamStream,
}

fn decode<M: Message + Default>(raw: &Bytes) -> Result<M, Error> {
    crate::message_codec::decode_message(raw)
}

fn encode<M: Message>(msg: &M) -> Bytes {
    crate::message_codec::encode_message(msg)
}

/// Send one request, close-send, and receive exactly one response. A
/// second inbound message before the stream closes is an internal error —
/// the peer violated the cardinality it registered for.
pub struct UnaryUnary<'a> {
    call: &'a mut Call,
}

impl<'a> UnaryUnary<'a> {
    pub fn new(call: &'a mut Call) -> UnaryUnary<'a> {
        UnaryUnary { call }
    }

    pub async fn invoke<Req: Message, Resp: Message + Default>(&mut self, request: &Req) -> Result<Resp, Error> {
        self.call.send_message(encode(request)).await?;
        self.call.close_send().await?;
        let raw = self
            .call
            .recv_message()
            .await?
            .ok_or_else(|| Status::new(Code::Unknown, "unary call ended with no response message"))?;
        let response = decode(&raw)?;
        if self.call.recv_message().await?.is_some() {
            return Err(Status::new(Code::Internal, "unary call received more than one response message").into());
        }
        Ok(response)
    }
}

/// Send one request, close-send, then expose the response as a finite
/// sequence of messages ending at trailers.
pub struct UnaryStream<'a> {
    call: &'a mut Call,
    sent: bool,
}

impl<'a> UnaryStream<'a> {
    pub fn new(call: &'a mut Call) -> UnaryStream<'a> {
        UnaryStream { call, sent: false }
    }

    pub async fn start<Req: Message>(&mut self, request: &Req) -> Result<(), Error> {
        self.call.send_message(encode(request)).await?;
        self.call.close_send().await?;
        self.sent = true;
        Ok(())
    }

    /// Yields the next response message, or `None` once the call completed
    /// with `OK`.
    pub async fn next<Resp: Message + Default>(&mut self) -> Result<Option<Resp>, Error> {
        debug_assert!(self.sent, "start() must be called before next()");
        match self.call.recv_message().await? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }
}

/// Expose the outbound side as a sink; once the caller closes it, receive
/// exactly one aggregate response.
pub struct StreamUnary<'a> {
    call: &'a mut Call,
}

impl<'a> StreamUnary<'a> {
    pub fn new(call: &'a mut Call) -> StreamUnary<'a> {
        StreamUnary { call }
    }

    pub async fn send<Req: Message>(&mut self, request: &Req) -> Result<(), Error> {
        self.call.send_message(encode(request)).await
    }

    pub async fn finish<Resp: Message + Default>(&mut self) -> Result<Resp, Error> {
        self.call.close_send().await?;
        let raw = self
            .call
            .recv_message()
            .await?
            .ok_or_else(|| Status::new(Code::Unknown, "stream-unary call ended with no response message"))?;
        decode(&raw)
    }
}

/// Both sides full duplex; the caller interleaves sends and receives
/// however the protocol requires.
pub struct StreamStream<'a> {
    call: &'a mut Call,
}

impl<'a> StreamStream<'a> {
    pub fn new(call: &'a mut Call) -> StreamStream<'a> {
        StreamStream { call }
    }

    pub async fn send<Req: Message>(&mut self, request: &Req) -> Result<(), Error> {
        self.call.send_message(encode(request)).await
    }

    pub async fn close_send(&mut self) -> Result<(), Error> {
        self.call.close_send().await
    }

    pub async fn recv<Resp: Message + Default>(&mut self) -> Result<Option<Resp>, Error> {
        match self.call.recv_message().await? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }
}
