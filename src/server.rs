//! Server dispatch (C6): accepts connections, reads each new HTTP/2 stream's
//! request headers, resolves `:path` against the service registry, and
//! spawns a handler task bound to the resulting [`Call`]. An unknown method
//! gets a trailers-only `UNIMPLEMENTED` without ever reaching user code.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;

use crate::call::{Call, CallParts};
use crate::config::Config;
use crate::error::Error;
use crate::proto::{Connection, Handle, Incoming, Role};
use crate::registry::Registry;
use crate::status::{Code, Status};

#[derive(Clone, Default)]
pub struct Builder {
    registry: Registry,
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn config(mut self, config: Config) -> Builder {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Registry) -> Builder {
        self.registry = registry;
        self
    }

    pub fn build(self) -> Server {
        Server {
            registry: Arc::new(self.registry),
            config: self.config,
        }
    }
}

/// A gRPC server bound to no particular transport: call [`Server::serve_connection`]
/// once per accepted socket (the accept loop itself — `TcpListener`, Unix
/// socket, TLS handshake — is the caller's collaborator).
#[derive(Clone)]
pub struct Server {
    registry: Arc<Registry>,
    config: Config,
}

impl Server {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Drives one accepted connection to completion: HTTP/2 handshake,
    /// then dispatch every peer-initiated stream to its registered handler
    /// until the transport closes.
    pub async fn serve_connection<T>(&self, io: T) -> Result<(), Error>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (conn, handle, incoming_rx) = Connection::handshake(io, Role::Server, &self.config).await?;
        tokio::spawn(conn.run());

        let mut incoming_rx = incoming_rx.expect("Role::Server handshake always yields an incoming-stream channel");
        while let Some(incoming) = incoming_rx.recv().await {
            self.dispatch(handle.clone(), incoming);
        }
        Ok(())
    }

    fn dispatch(&self, handle: Handle, incoming: Incoming) {
        let registry = self.registry.clone();
        let max_recv_message_size = self.config.max_recv_message_size;

        tokio::spawn(async move {
            let path = incoming.pseudo.path.clone().unwrap_or_default();
            let deadline = incoming
                .fields
                .iter()
                .find(|(name, _)| name == "grpc-timeout")
                .and_then(|(_, value)| std::str::from_utf8(value).ok())
                .and_then(crate::timeout::parse)
                .map(|d| Instant::now() + d);

            let call = Call::new(CallParts {
                handle,
                id: incoming.id,
                role: Role::Server,
                events: incoming.events,
                path: path.clone(),
                max_recv_message_size,
                deadline,
            });

            match registry.lookup(&path) {
                Some(method) => {
                    let handler = method.handler.clone();
                    match deadline {
                        // The handler future owns `call`; if the timeout wins
                        // the race, the future (and the `Call` inside it) is
                        // simply dropped here, which resets the stream via
                        // `Call`'s own `Drop` impl.
                        Some(deadline) => {
                            tokio::select! {
                                (call, result) = (handler)(call) => finish_call(call, result).await,
                                _ = tokio::time::sleep_until(deadline) => {
                                    tracing::debug!(%path, "handler exceeded deadline, dropping");
                                }
                            }
                        }
                        None => {
                            let (call, result) = (handler)(call).await;
                            finish_call(call, result).await;
                        }
                    }
                }
                None => {
                    let mut call = call;
                    let _ = call
                        .send_status(Status::new(Code::Unimplemented, format!("unknown method {path}")))
                        .await;
                }
            }
        });
    }
}

/// Ensures a handler's completion is actually reflected on the wire: if the
/// handler already closed the stream itself (explicit `send_status`), this
/// is a no-op; otherwise the handler's outcome is turned into the closing
/// trailers it never sent.
async fn finish_call(mut call: Call, result: Result<(), Status>) {
    if !call.is_send_closed() {
        let status = match result {
            Ok(()) => Status::ok(),
            Err(status) => status,
        };
        let _ = call.send_status(status).await;
    }
}
