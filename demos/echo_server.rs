//! A `/echo.Echo/Say` unary-unary server over a real TCP socket. Pair with
//! `echo_client`: `cargo run --example echo_server`, then in another
//! terminal `cargo run --example echo_client`.

use g2rpc::registry::{BoxFuture, HandlerOutput};
use g2rpc::{Cardinality, Call, Code, Config, Registry, Server, Status};
use tokio::net::TcpListener;

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoRequest {
    #[prost(string, tag = "1")]
    pub text: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct EchoResponse {
    #[prost(string, tag = "1")]
    pub text: String,
}

async fn handle_say(mut call: Call) -> HandlerOutput {
    let request: EchoRequest = match call.recv_message().await {
        Ok(Some(raw)) => match g2rpc::message_codec::decode_message(&raw) {
            Ok(req) => req,
            Err(_) => return (call, Err(Status::new(Code::Internal, "malformed request body"))),
        },
        Ok(None) => {
            return (call, Err(Status::new(Code::InvalidArgument, "expected exactly one request message")));
        }
        Err(err) => return (call, Err(err.into_status())),
    };

    let response = EchoResponse { text: request.text };
    let result = call.send_message(g2rpc::message_codec::encode_message(&response)).await;
    (call, result.map_err(|err| err.into_status()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let mut registry = Registry::new();
    registry.add_method("echo.Echo", "Say", Cardinality::UnaryUnary, |call: Call| {
        Box::pin(handle_say(call)) as BoxFuture<'static, HandlerOutput>
    });

    let server = Server::builder().registry(registry).config(Config::default()).build();

    let listener = TcpListener::bind("127.0.0.1:50051").await?;
    println!("echo server listening on 127.0.0.1:50051");

    loop {
        let (socket, peer) = listener.accept().await?;
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(err) = server.serve_connection(socket).await {
                eprintln!("connection from {peer} ended: {err}");
            }
        });
    }
}
