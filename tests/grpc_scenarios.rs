//! End-to-end scenarios (a real `Channel` talking to a real `Server` over an
//! in-process duplex transport standing in for a TCP/TLS socket) covering
//! the four cardinalities, unknown-method dispatch, mid-stream transport
//! failure, and deadline propagation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use g2rpc::registry::{BoxFuture, HandlerOutput};
use g2rpc::{
    message_codec, Call, Cardinality, Channel, Code, Config, Error, MetadataMap, Registry, Server, Status,
    StreamUnary, UnaryStream, UnaryUnary,
};
use tokio::task::JoinHandle;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TestMessage {
    #[prost(int32, tag = "1")]
    pub value: i32,
}

async fn start_pair(registry: Registry, config: Config) -> (Channel, JoinHandle<()>, JoinHandle<()>) {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let server = Server::builder().registry(registry).config(config.clone()).build();
    let server_task = tokio::spawn(async move {
        let _ = server.serve_connection(server_io).await;
    });
    let (channel, client_task) = Channel::connect(client_io, "test.local", config).await.unwrap();
    (channel, client_task, server_task)
}

#[tokio::test]
async fn unary_echo() {
    let mut registry = Registry::new();
    registry.add_method("echo.Echo", "Say", Cardinality::UnaryUnary, |mut call: Call| {
        Box::pin(async move {
            let result = async {
                let raw = call
                    .recv_message()
                    .await?
                    .ok_or_else(|| Status::new(Code::InvalidArgument, "expected one request"))?;
                let req: TestMessage = message_codec::decode_message(&raw)?;
                call.send_message(message_codec::encode_message(&req)).await?;
                Ok(())
            }
            .await;
            (call, result.map_err(|err: Error| err.into_status()))
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel.start_call("/echo.Echo/Say", MetadataMap::new(), None).await.unwrap();

    let response: TestMessage = UnaryUnary::new(&mut call).invoke(&TestMessage { value: 42 }).await.unwrap();
    assert_eq!(response.value, 42);
}

#[tokio::test]
async fn server_streaming() {
    let mut registry = Registry::new();
    registry.add_method("count.Count", "UpTo", Cardinality::UnaryStream, |mut call: Call| {
        Box::pin(async move {
            let result = async {
                let raw = call
                    .recv_message()
                    .await?
                    .ok_or_else(|| Status::new(Code::InvalidArgument, "expected one request"))?;
                let req: TestMessage = message_codec::decode_message(&raw)?;
                for n in 1..=req.value {
                    let msg = TestMessage { value: n };
                    call.send_message(message_codec::encode_message(&msg)).await?;
                }
                Ok(())
            }
            .await;
            (call, result.map_err(|err: Error| err.into_status()))
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel.start_call("/count.Count/UpTo", MetadataMap::new(), None).await.unwrap();

    let mut stream = UnaryStream::new(&mut call);
    stream.start(&TestMessage { value: 3 }).await.unwrap();

    let mut got = Vec::new();
    while let Some(msg) = stream.next::<TestMessage>().await.unwrap() {
        got.push(msg.value);
    }
    assert_eq!(got, vec![1, 2, 3]);
}

#[tokio::test]
async fn client_streaming() {
    let mut registry = Registry::new();
    registry.add_method("sum.Sum", "OfAll", Cardinality::StreamUnary, |mut call: Call| {
        Box::pin(async move {
            let mut total = 0i32;
            let result: Result<(), Error> = loop {
                match call.recv_message().await {
                    Ok(Some(raw)) => match message_codec::decode_message::<TestMessage>(&raw) {
                        Ok(msg) => total += msg.value,
                        Err(err) => break Err(err),
                    },
                    Ok(None) => break Ok(()),
                    Err(err) => break Err(err),
                }
            };
            if let Err(err) = result {
                return (call, Err(err.into_status()));
            }

            let response = TestMessage { value: total };
            let send_result = call.send_message(message_codec::encode_message(&response)).await;
            (call, send_result.map_err(|err| err.into_status()))
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel.start_call("/sum.Sum/OfAll", MetadataMap::new(), None).await.unwrap();

    let mut sink = StreamUnary::new(&mut call);
    sink.send(&TestMessage { value: 1 }).await.unwrap();
    sink.send(&TestMessage { value: 2 }).await.unwrap();
    sink.send(&TestMessage { value: 3 }).await.unwrap();
    let response: TestMessage = sink.finish().await.unwrap();
    assert_eq!(response.value, 6);
}

#[tokio::test]
async fn unknown_method_is_trailers_only_unimplemented() {
    let (channel, _client_task, _server_task) = start_pair(Registry::new(), Config::default()).await;
    let mut call = channel.start_call("/nope.Svc/Miss", MetadataMap::new(), None).await.unwrap();

    match call.recv_message().await.unwrap_err() {
        Error::Status(status) => assert_eq!(status.code(), Code::Unimplemented),
        other => panic!("expected a Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn handler_that_forgets_send_status_still_closes_the_stream() {
    // A handler returning `Ok(())` without ever calling `send_status` used
    // to leave the stream entry in the connection's table forever, with the
    // peer's `recv_message` hanging. Dispatch's `finish_call` now derives
    // the closing status from the handler's own return value.
    let mut registry = Registry::new();
    registry.add_method("broken.Broken", "Bail", Cardinality::UnaryUnary, |call: Call| {
        Box::pin(async move { (call, Ok(())) }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel.start_call("/broken.Broken/Bail", MetadataMap::new(), None).await.unwrap();
    call.send_message(message_codec::encode_message(&TestMessage { value: 1 })).await.unwrap();
    call.close_send().await.unwrap();

    // The handler returned `Ok(())` without ever sending a message or a
    // status, so `finish_call` derives `Status::ok()` on the handler's
    // behalf — the client must not hang waiting for trailers.
    let response = call.recv_message().await.unwrap();
    assert!(response.is_none());
}

#[tokio::test]
async fn server_crash_mid_stream_is_unavailable() {
    let mut registry = Registry::new();
    // Accepts the stream but never responds — stands in for a server that
    // crashes after headers, before any frame.
    registry.add_method("echo.Echo", "Say", Cardinality::UnaryUnary, |call: Call| {
        // Keep `call` alive (moved into the never-resolving future) rather
        // than dropping it synchronously when the handler is invoked.
        Box::pin(async move {
            let _call = call;
            std::future::pending::<HandlerOutput>().await
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let server = Server::builder().registry(registry).config(Config::default()).build();
    let server_task = tokio::spawn(async move {
        let _ = server.serve_connection(server_io).await;
    });
    let (channel, _client_task) = Channel::connect(client_io, "test.local", Config::default()).await.unwrap();

    let mut call = channel.start_call("/echo.Echo/Say", MetadataMap::new(), None).await.unwrap();
    call.send_message(message_codec::encode_message(&TestMessage { value: 1 })).await.unwrap();
    call.close_send().await.unwrap();

    // Let the handler get dispatched, then kill the connection as if the
    // process had crashed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    server_task.abort();

    let err = call.recv_message().await.unwrap_err();
    assert_eq!(err.into_status().code(), Code::Unavailable);
}

#[tokio::test]
async fn deadline_exceeded_cancels_the_call() {
    let mut registry = Registry::new();
    registry.add_method("slow.Slow", "Wait", Cardinality::UnaryUnary, |mut call: Call| {
        Box::pin(async move {
            let _ = call.recv_message().await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            (call, Ok(()))
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel
        .start_call("/slow.Slow/Wait", MetadataMap::new(), Some(Duration::from_millis(50)))
        .await
        .unwrap();

    call.send_message(message_codec::encode_message(&TestMessage { value: 7 })).await.unwrap();
    call.close_send().await.unwrap();

    let err = call.recv_message().await.unwrap_err();
    assert_eq!(err.into_status().code(), Code::DeadlineExceeded);
}

#[tokio::test]
async fn server_handler_is_actually_dropped_on_deadline() {
    // Distinguishes "the handler task is raced against the deadline and
    // dropped" from "the handler merely runs to completion and the client
    // separately times out": the flag only flips if the handler is polled
    // to completion past its sleep, which a correctly wired dispatch must
    // never allow.
    let ran_past_sleep = Arc::new(AtomicBool::new(false));
    let flag = ran_past_sleep.clone();

    let mut registry = Registry::new();
    registry.add_method("slow.Slow", "Wait", Cardinality::UnaryUnary, move |mut call: Call| {
        let flag = flag.clone();
        Box::pin(async move {
            let _ = call.recv_message().await;
            tokio::time::sleep(Duration::from_millis(300)).await;
            flag.store(true, Ordering::SeqCst);
            (call, Ok(()))
        }) as BoxFuture<'static, HandlerOutput>
    });

    let (channel, _client_task, _server_task) = start_pair(registry, Config::default()).await;
    let mut call = channel
        .start_call("/slow.Slow/Wait", MetadataMap::new(), Some(Duration::from_millis(50)))
        .await
        .unwrap();
    call.send_message(message_codec::encode_message(&TestMessage { value: 7 })).await.unwrap();
    call.close_send().await.unwrap();

    let _ = call.recv_message().await;
    // Give the (correctly dropped) handler's sleep time to have elapsed had
    // it actually kept running.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!ran_past_sleep.load(Ordering::SeqCst), "handler ran past its deadline instead of being dropped");
}
