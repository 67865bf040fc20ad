//! `g2rpc`: a gRPC-over-HTTP/2 protocol engine. A client and server runtime
//! that speaks the gRPC wire protocol over an arbitrary async duplex
//! transport, multiplexing many concurrent RPCs — the four gRPC
//! cardinalities, carrying protobuf payloads — over one connection.
//!
//! This crate is the protocol engine, not a full gRPC stack: TCP/Unix
//! connect, TLS, and `.proto`-to-Rust codegen are collaborators that sit
//! outside it. [`client::Channel`] and [`server::Server`] each take an
//! already-established [`tokio::io::AsyncRead`] + [`tokio::io::AsyncWrite`]
//! transport.

pub mod call;
pub mod cardinality;
pub mod codec;
pub mod config;
pub mod error;
pub mod frame;
mod hpack;
pub mod message_codec;
pub mod metadata;
pub mod proto;
pub mod registry;
pub mod server;
pub mod client;
pub mod status;
pub mod timeout;

pub use call::Call;
pub use cardinality::{Cardinality, StreamStream, StreamUnary, UnaryStream, UnaryUnary};
pub use client::Channel;
pub use config::Config;
pub use error::{Error, Reason};
pub use metadata::{MetadataKey, MetadataMap, MetadataValue};
pub use registry::Registry;
pub use server::Server;
pub use status::{Code, Status};
