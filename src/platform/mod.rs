pub mod websocket;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;

pub use websocket::WebSocketConnector;

/// Opens a duplex connection to the protocol server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(Box<dyn FrameSink>, Box<dyn FrameStream>)>;

    /// Human-readable endpoint for logs (without credentials).
    fn endpoint(&self) -> String;
}

/// Writing half of a connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: String) -> Result<()>;
}

/// Reading half of a connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame. `None` means the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Writer slot for the current connection, shared by the receive loop and
/// the background jobs.
#[derive(Default)]
pub struct Outbox {
    sink: Mutex<Option<Box<dyn FrameSink>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, sink: Box<dyn FrameSink>) {
        *self.sink.lock().await = Some(sink);
    }

    pub async fn detach(&self) {
        self.sink.lock().await.take();
    }

    pub async fn state(&self) -> ConnectionState {
        if self.sink.lock().await.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub async fn send(&self, frame: String) -> Result<()> {
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => bail!("Not connected"),
        }
    }
}
