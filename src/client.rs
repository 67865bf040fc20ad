//! The client surface (C7): opens a connection over a caller-supplied
//! duplex transport and starts outbound calls against it. TLS, TCP/Unix
//! connect, and name resolution are all collaborators that hand this layer
//! an already-established byte stream.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::call::{Call, CallParts};
use crate::config::Config;
use crate::error::Error;
use crate::frame::Pseudo;
use crate::metadata::MetadataMap;
use crate::proto::{Connection, Handle, Role};

/// A client-side gRPC connection: one transport, many multiplexed calls.
/// Cheap to clone — every clone shares the same underlying connection task.
#[derive(Clone)]
pub struct Channel {
    handle: Handle,
    authority: String,
    scheme: &'static str,
    config: Config,
}

impl Channel {
    /// Performs the HTTP/2 handshake over `io` and spawns the connection's
    /// driving task. The returned `JoinHandle` resolves when the connection
    /// task exits; dropping it does not stop the connection (that's what
    /// [`Channel::shutdown`] is for).
    pub async fn connect<T>(io: T, authority: impl Into<String>, config: Config) -> Result<(Channel, JoinHandle<()>), Error>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (conn, handle, _incoming) = Connection::handshake(io, Role::Client, &config).await?;
        let task = tokio::spawn(conn.run());

        Ok((
            Channel {
                handle,
                authority: authority.into(),
                scheme: "http",
                config,
            },
            task,
        ))
    }

    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Starts a new RPC: allocates a stream, sends the request's initial
    /// metadata, and returns the raw [`Call`]. Method stubs wrap this in
    /// the cardinality adapter matching the method's signature.
    pub async fn start_call(
        &self,
        path: impl Into<String>,
        metadata: MetadataMap,
        timeout: Option<Duration>,
    ) -> Result<Call, Error> {
        let path = path.into();

        let mut fields = vec![
            ("content-type".to_owned(), Bytes::from_static(b"application/grpc+proto")),
            ("te".to_owned(), Bytes::from_static(b"trailers")),
            ("user-agent".to_owned(), Bytes::from_static(b"g2rpc/0.1")),
        ];
        if let Some(timeout) = timeout {
            fields.push(("grpc-timeout".to_owned(), Bytes::from(crate::timeout::format(timeout))));
        }
        fields.extend(metadata.to_wire_fields());

        let pseudo = Pseudo::request(http::Method::POST, self.scheme, &self.authority, &path);
        let (id, events) = self.handle.open(pseudo, fields).await?;
        let deadline = timeout.map(|d| Instant::now() + d);

        Ok(Call::new(CallParts {
            handle: self.handle.clone(),
            id,
            role: Role::Client,
            events,
            path,
            max_recv_message_size: self.config.max_recv_message_size,
            deadline,
        }))
    }
}
