//! Calls the `/echo.Echo/Say` method served by `echo_server`.

use g2rpc::{Channel, Config, MetadataMap, UnaryUnary};
use tokio::net::TcpStream;

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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let io = TcpStream::connect("127.0.0.1:50051").await?;
    let (channel, _conn_task) = Channel::connect(io, "127.0.0.1:50051", Config::default()).await?;

    let mut call = channel.start_call("/echo.Echo/Say", MetadataMap::new(), None).await?;
    let request = EchoRequest { text: "hello, g2rpc".to_owned() };
    let response: EchoResponse = UnaryUnary::new(&mut call).invoke(&request).await?;

    println!("server replied: {}", response.text);
    Ok(())
}
