use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct WsConnectConfig {
    pub uri: String,
    pub connect_timeout_ms: u64,
    pub outbound_queue: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(String),
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("link closed")]
    Closed,
    #[error("outbound queue full")]
    Full,
}

// Cloneable outbound half. Sending never waits on the network: frames go into
// a bounded queue drained by the writer task.
#[derive(Clone, Debug)]
pub struct WsLink {
    outbound: mpsc::Sender<String>,
}

impl WsLink {
    pub fn send_text(&self, text: String) -> Result<(), LinkError> {
        self.outbound.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => LinkError::Full,
            mpsc::error::TrySendError::Closed(_) => LinkError::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        (Self { outbound }, rx)
    }
}

#[derive(Clone)]
pub struct WsClient;

impl WsClient {
    pub async fn connect(cfg: WsConnectConfig) -> Result<(WsLink, mpsc::Receiver<WsFrame>)> {
        info!(uri = %cfg.uri, "websocket connect start");
        let (stream, _) = timeout(
            Duration::from_millis(cfg.connect_timeout_ms),
            connect_async(cfg.uri.as_str()),
        )
        .await
        .map_err(|_| anyhow::anyhow!("connect to {} timed out", cfg.uri))??;
        info!(uri = %cfg.uri, "websocket connected");

        let (mut write, mut read) = stream.split();
        let (link, mut outbound_rx) = WsLink::detached(cfg.outbound_queue);
        let (inbound_tx, inbound_rx) = mpsc::channel(1024);

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(err) = write.send(Message::Text(text)).await {
                    warn!(error = %err, "websocket write failed");
                    break;
                }
            }
            let _ = write.close().await;
            debug!("websocket writer finished");
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(WsFrame::Text(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("server closed websocket");
                        break;
                    }
                    Err(err) => {
                        warn!(error = %err, "websocket read failed");
                        break;
                    }
                    _ => {}
                }
            }
            let _ = inbound_tx.send(WsFrame::Closed).await;
        });

        Ok((link, inbound_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_link_queues_frames_in_order() {
        let (link, mut rx) = WsLink::detached(4);
        link.send_text("a".to_string()).unwrap();
        link.send_text("b".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));
    }

    #[test]
    fn full_and_closed_queues_are_reported() {
        let (link, rx) = WsLink::detached(1);
        link.send_text("first".to_string()).unwrap();
        assert_eq!(link.send_text("second".to_string()), Err(LinkError::Full));
        drop(rx);
        assert!(link.is_closed());
        assert_eq!(link.send_text("third".to_string()), Err(LinkError::Closed));
    }
}
