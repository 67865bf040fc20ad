//! Top-level error types.
//!
//! `Reason` is the HTTP/2 error code space (RFC 7540 §7); `Error` is what
//! every public, fallible operation in this crate returns. The four
//! propagation classes below line up with the error-handling design: a
//! `Status` coming back from a peer, a connection-wide `Protocol` violation,
//! a broken `Transport`, or a local `Codec` failure decoding a message.

use std::fmt;

use crate::status::Status;

/// HTTP/2 error codes, used on `RST_STREAM` and `GOAWAY` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Reason {
    NoError = 0x0,
    ProtocolError = 0x1,
    InternalError = 0x2,
    FlowControlError = 0x3,
    SettingsTimeout = 0x4,
    StreamClosed = 0x5,
    FrameSizeError = 0x6,
    RefusedStream = 0x7,
    Cancel = 0x8,
    CompressionError = 0x9,
    ConnectError = 0xa,
    EnhanceYourCalm = 0xb,
    InadequateSecurity = 0xc,
    Http11Required = 0xd,
}

impl Reason {
    pub fn from_u32(v: u32) -> Reason {
        match v {
            0x1 => Reason::ProtocolError,
            0x2 => Reason::InternalError,
            0x3 => Reason::FlowControlError,
            0x4 => Reason::SettingsTimeout,
            0x5 => Reason::StreamClosed,
            0x6 => Reason::FrameSizeError,
            0x7 => Reason::RefusedStream,
            0x8 => Reason::Cancel,
            0x9 => Reason::CompressionError,
            0xa => Reason::ConnectError,
            0xb => Reason::EnhanceYourCalm,
            0xc => Reason::InadequateSecurity,
            0xd => Reason::Http11Required,
            _ => Reason::NoError,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors surfaced by the protocol engine to user code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-OK `grpc-status` from the peer, or a locally constructed status
    /// returned by a handler.
    #[error("{0}")]
    Status(#[from] Status),

    /// A connection-level HTTP/2 protocol violation. The connection has
    /// already sent (or received) `GOAWAY` by the time this is observed.
    #[error("protocol error: {reason} ({detail})")]
    Protocol { reason: Reason, detail: String },

    /// The underlying byte transport failed or closed unexpectedly.
    #[error("transport error: {0}")]
    Transport(String),

    /// A message failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// The call, or its connection, was cancelled locally.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    pub fn protocol(reason: Reason, detail: impl Into<String>) -> Error {
        Error::Protocol {
            reason,
            detail: detail.into(),
        }
    }

    pub fn transport(detail: impl fmt::Display) -> Error {
        Error::Transport(detail.to_string())
    }

    pub fn codec(detail: impl fmt::Display) -> Error {
        Error::Codec(detail.to_string())
    }

    /// Renders this error as the `Status` that should be delivered to the
    /// caller of a `Call`, per the classification policy in §7.
    pub fn into_status(self) -> Status {
        match self {
            Error::Status(s) => s,
            Error::Protocol { reason, detail } => {
                Status::new(crate::status::Code::Unavailable, format!("{reason}: {detail}"))
            }
            Error::Transport(detail) => Status::new(crate::status::Code::Unavailable, detail),
            Error::Codec(detail) => Status::new(crate::status::Code::Internal, detail),
            Error::Cancelled(detail) => Status::new(crate::status::Code::Cancelled, detail),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::transport(e)
    }
}
