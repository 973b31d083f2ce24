//! WebSocket transport to a OneBot-style protocol server.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Connector, FrameSink, FrameStream};
use crate::config::ConnectionConfig;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketConnector {
    url: Url,
    endpoint: String,
}

impl WebSocketConnector {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self {
            url: config.connect_url()?,
            endpoint: config.uri.clone(),
        })
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", self.endpoint))?;
        let (write, read) = socket.split();
        let sink: Box<dyn FrameSink> = Box::new(WsSink(write));
        let stream: Box<dyn FrameStream> = Box::new(WsStream(read));
        Ok((sink, stream))
    }

    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }
}

struct WsSink(SplitSink<Socket, WsMessage>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: String) -> Result<()> {
        self.0
            .send(WsMessage::Text(frame.into()))
            .await
            .context("Failed to send frame")
    }
}

struct WsStream(SplitStream<Socket>);

#[async_trait]
impl FrameStream for WsStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            let msg = match self.0.next().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(e).context("WebSocket receive failed")),
            };
            match msg {
                WsMessage::Text(text) => return Some(Ok(text.to_string())),
                WsMessage::Close(frame) => {
                    return Some(Err(anyhow!("Server closed the connection: {:?}", frame)))
                }
                other => debug!("Skipping non-text frame: {:?}", other),
            }
        }
    }
}
