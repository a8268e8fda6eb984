//! Native feed transport — `tokio-tungstenite`.
//!
//! One background tokio task owns the connection: it pushes registry frames
//! out, routes inbound frames through the [`SubscriptionRegistry`], and runs
//! an application-level ping/pong health check. Transport loss is terminal —
//! every live subscription receives `Disconnected` and the task ends. A
//! `FeedClient` is single-use: to recover, build a new one and re-register.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::FeedError;
use crate::feed::{FeedConfig, Kind, MessageIn, MessageOut, SubscriptionRegistry};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Native feed client over a single multiplexed WebSocket connection.
pub struct FeedClient {
    config: FeedConfig,
    registry: Arc<SubscriptionRegistry>,
    frame_rx: Option<mpsc::Receiver<MessageOut>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
    connected: Arc<AtomicBool>,
}

impl FeedClient {
    /// Create a new feed client. Does not connect yet.
    pub fn new(config: FeedConfig) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(64);
        let registry = Arc::new(SubscriptionRegistry::new(frame_tx, config.event_buffer));
        Self {
            config,
            registry,
            frame_rx: Some(frame_rx),
            shutdown_tx: None,
            task_handle: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The registry used to open and close subscriptions on this connection.
    pub fn subscriptions(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Connect to the feed and spawn the background task.
    ///
    /// Connection establishment happens here so the caller gets a direct
    /// `ConnectionFailed` instead of a phantom subscription error later.
    pub async fn connect(&mut self) -> Result<(), FeedError> {
        let Some(frame_rx) = self.frame_rx.take() else {
            return Ok(());
        };

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let (sink, stream) = attempt_connect(&self.config.url, timeout)
            .await
            .map_err(FeedError::ConnectionFailed)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);
        self.connected.store(true, Ordering::SeqCst);

        let task = ConnectedTask {
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
            frame_rx,
            shutdown_rx,
            connected: Arc::clone(&self.connected),
        };
        self.task_handle = Some(tokio::spawn(task.run(sink, stream)));

        Ok(())
    }

    /// Gracefully close the connection.
    ///
    /// Every live subscription receives a terminal `Disconnected` event.
    pub async fn disconnect(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

struct ConnectedTask {
    config: FeedConfig,
    registry: Arc<SubscriptionRegistry>,
    frame_rx: mpsc::Receiver<MessageOut>,
    shutdown_rx: oneshot::Receiver<()>,
    connected: Arc<AtomicBool>,
}

impl ConnectedTask {
    async fn run(mut self, mut sink: SplitSink<WsStream, Message>, mut stream: SplitStream<WsStream>) {
        let ping_dur = Duration::from_millis(self.config.ping_interval_ms);
        let pong_dur = Duration::from_millis(self.config.pong_timeout_ms);

        let mut ping_interval = tokio::time::interval(ping_dur);
        ping_interval.reset(); // skip immediate first tick

        let mut pong_deadline: Option<tokio::time::Instant> = None;
        let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
        let pong_sleep = tokio::time::sleep_until(far_future);
        tokio::pin!(pong_sleep);

        let reason = loop {
            tokio::select! {
                // ── a) Inbound frame ─────────────────────────────────────
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            let text_str: &str = text.as_ref();
                            match serde_json::from_str::<MessageIn>(text_str) {
                                Ok(msg_in) => {
                                    if matches!(msg_in.kind, Kind::Pong) {
                                        pong_deadline = None;
                                        pong_sleep.as_mut().reset(far_future);
                                    }
                                    self.registry.handle_message(msg_in).await;
                                }
                                Err(e) => {
                                    tracing::warn!(
                                        "Feed deserialization error: {} — raw: {}",
                                        e,
                                        text_str
                                    );
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            // WS-level pong — harmless, ignore
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = extract_close(frame.as_ref());
                            tracing::info!(code, "Feed closed by server: {}", reason);
                            break reason;
                        }
                        Some(Ok(_)) => {} // Binary, Frame — ignore
                        Some(Err(e)) => {
                            let reason = e.to_string();
                            tracing::error!("Feed stream error: {}", reason);
                            break reason;
                        }
                        None => break "Stream ended".to_string(),
                    }
                }

                // ── b) Outbound frame from the registry ──────────────────
                frame = self.frame_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if let Err(e) = send_frame(&mut sink, &frame).await {
                                tracing::warn!("Send failed: {}", e);
                            }
                        }
                        None => break "Client dropped".to_string(),
                    }
                }

                // ── c) Shutdown request ──────────────────────────────────
                _ = &mut self.shutdown_rx => {
                    let _ = sink.send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "Client disconnect".into(),
                    }))).await;
                    break "Client disconnect".to_string();
                }

                // ── d) Ping interval ─────────────────────────────────────
                _ = ping_interval.tick() => {
                    if let Err(e) = send_frame(&mut sink, &MessageOut::Ping).await {
                        tracing::warn!("Failed to send ping: {}", e);
                    } else {
                        let deadline = tokio::time::Instant::now() + pong_dur;
                        pong_deadline = Some(deadline);
                        pong_sleep.as_mut().reset(deadline);
                    }
                }

                // ── e) Pong timeout ──────────────────────────────────────
                () = &mut pong_sleep, if pong_deadline.is_some() => {
                    tracing::warn!(
                        "Pong timeout — no response within {}ms",
                        self.config.pong_timeout_ms
                    );
                    let _ = sink.close().await;
                    break "Pong timeout".to_string();
                }
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        self.registry.handle_transport_closed(&reason).await;
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attempt to establish the WebSocket connection within `timeout`.
async fn attempt_connect(
    url: &str,
    timeout: Duration,
) -> Result<(SplitSink<WsStream, Message>, SplitStream<WsStream>), String> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| "Connection timeout".to_string())?
        .map_err(|e| e.to_string())?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_frame(
    sink: &mut SplitSink<WsStream, Message>,
    frame: &MessageOut,
) -> Result<(), String> {
    let json = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}
