use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::LivenessConfig;
use crate::event::Heartbeat;
use crate::platform::Outbox;
use crate::reply::ActionFrame;

/// External network reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn reachable(&self) -> bool;
}

/// Reachable iff a GET on the probe URL answers with the expected status.
pub struct HttpProbe {
    client: Client,
    url: String,
    expected_status: u16,
}

impl HttpProbe {
    pub fn new(config: &LivenessConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: config.probe_url.clone(),
            expected_status: config.expected_status,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().as_u16() == self.expected_status => true,
            Ok(response) => {
                warn!("Liveness probe got status {}", response.status());
                false
            }
            Err(e) => {
                warn!("Liveness probe failed: {}", e);
                false
            }
        }
    }
}

/// Online flag reported by heartbeats, plus the self-healing check.
pub struct Liveness {
    online: AtomicBool,
    probe: Box<dyn Probe>,
    online_status: u32,
}

impl Liveness {
    pub fn new(probe: Box<dyn Probe>, online_status: u32) -> Self {
        Self {
            online: AtomicBool::new(false),
            probe,
            online_status,
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn record(&self, heartbeat: &Heartbeat) {
        debug!(
            "Heartbeat from {}: online={} good={} interval={}ms",
            heartbeat.self_id, heartbeat.status.online, heartbeat.status.good, heartbeat.interval
        );
        let was_online = self.online.swap(heartbeat.status.online, Ordering::SeqCst);
        if was_online != heartbeat.status.online {
            info!(
                "Bot {} is now {} (heartbeat at {})",
                heartbeat.self_id,
                if heartbeat.status.online { "online" } else { "offline" },
                heartbeat
                    .at()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| heartbeat.time.to_string())
            );
        }
    }

    /// Forget the last reported state; called on every (re)connect.
    pub fn reset(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    /// If heartbeats say offline and the network is reachable, ask the
    /// server to go online again. Heartbeats stay authoritative.
    pub async fn check(&self, outbox: &Outbox) -> Result<()> {
        if self.is_online() {
            return Ok(());
        }
        if !self.probe.reachable().await {
            debug!("Offline and network unreachable, skipping login");
            return Ok(());
        }

        info!("Offline but network reachable, setting online status...");
        let frame = ActionFrame::set_online_status(self.online_status).to_json()?;
        outbox
            .send(frame)
            .await
            .context("Failed to send set_online_status")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::BotStatus;
    use crate::platform::FrameSink;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    struct FixedProbe {
        reachable: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Probe for FixedProbe {
        async fn reachable(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reachable
        }
    }

    struct ChannelSink(mpsc::UnboundedSender<String>);

    #[async_trait]
    impl FrameSink for ChannelSink {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.0.send(frame)?;
            Ok(())
        }
    }

    fn heartbeat(online: bool) -> Heartbeat {
        Heartbeat {
            time: 1700000000,
            self_id: 42,
            status: BotStatus { online, good: true },
            interval: 30000,
        }
    }

    fn liveness(reachable: bool) -> (Liveness, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FixedProbe {
            reachable,
            calls: calls.clone(),
        };
        (Liveness::new(Box::new(probe), 10), calls)
    }

    async fn connected_outbox() -> (Outbox, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbox = Outbox::new();
        outbox.attach(Box::new(ChannelSink(tx))).await;
        (outbox, rx)
    }

    #[test]
    fn test_heartbeat_updates_and_reset_clears() {
        let (liveness, _) = liveness(true);
        assert!(!liveness.is_online());

        liveness.record(&heartbeat(true));
        assert!(liveness.is_online());

        liveness.record(&heartbeat(false));
        assert!(!liveness.is_online());

        liveness.record(&heartbeat(true));
        liveness.reset();
        assert!(!liveness.is_online());
    }

    #[tokio::test]
    async fn test_check_skips_when_online() {
        let (liveness, calls) = liveness(true);
        let (outbox, mut rx) = connected_outbox().await;

        liveness.record(&heartbeat(true));
        liveness.check(&outbox).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_check_sends_online_status_when_reachable() {
        let (liveness, calls) = liveness(true);
        let (outbox, mut rx) = connected_outbox().await;

        liveness.check(&outbox).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let frame: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["action"], "set_online_status");
        assert_eq!(frame["echo"], "auto_login");
        // Only heartbeats flip the flag.
        assert!(!liveness.is_online());
    }

    #[tokio::test]
    async fn test_check_does_nothing_when_unreachable() {
        let (liveness, calls) = liveness(false);
        let (outbox, mut rx) = connected_outbox().await;

        liveness.check(&outbox).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_check_reports_disconnected_outbox() {
        let (liveness, _) = liveness(true);
        assert!(liveness.check(&Outbox::new()).await.is_err());
    }

    /// Serves one HTTP request with the given status line and returns its URL.
    async fn http_once(status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{}/generate_204", addr)
    }

    fn http_probe(url: String) -> HttpProbe {
        HttpProbe::new(&LivenessConfig {
            probe_url: url,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_probe_expected_status_is_reachable() {
        let probe = http_probe(http_once("204 No Content").await);
        assert!(probe.reachable().await);
    }

    #[tokio::test]
    async fn test_http_probe_other_status_is_unreachable() {
        let probe = http_probe(http_once("200 OK").await);
        assert!(!probe.reachable().await);
    }

    #[tokio::test]
    async fn test_http_probe_refused_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/generate_204", listener.local_addr().unwrap());
        drop(listener);

        assert!(!http_probe(url).reachable().await);
    }
}
