//! Common test utilities for Gatewire integration tests
//!
//! [`MockGateway`] speaks just enough of the gateway protocol to drive a
//! client through a full session: Hello on connect, READY for Identify,
//! RESUMED for Resume and an ack for every heartbeat (unless disabled).

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use gatewire::{Frame, GatewayConfig, GatewayError, GatewayEvent, Intents, Notification, OpCode};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const MOCK_SESSION_ID: &str = "mock-session";
pub const MOCK_APPLICATION_ID: &str = "1000";
pub const TEST_TOKEN: &str = "test-token";

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

/// A frame the mock received, tagged with the connection it arrived on
#[derive(Debug, Clone)]
pub struct Received {
    /// 1-based connection counter
    pub connection: usize,
    pub frame: Frame,
}

enum ServerCommand {
    Send(Frame),
    Close(u16),
}

struct Inner {
    url: String,
    heartbeat_interval_ms: u64,
    ack_heartbeats: AtomicBool,
    connections: AtomicUsize,
    /// Connections whose socket has gone away
    closed: AtomicUsize,
    sequence: AtomicU64,
    current: Mutex<Option<UnboundedSender<ServerCommand>>>,
    received_tx: UnboundedSender<Received>,
}

impl Inner {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// A scripted gateway server
pub struct MockGateway {
    pub addr: SocketAddr,
    inner: Arc<Inner>,
    received_rx: UnboundedReceiver<Received>,
    shutdown: Arc<Notify>,
}

impl MockGateway {
    /// Start a mock gateway announcing `heartbeat_interval_ms` in Hello
    pub async fn start(heartbeat_interval_ms: u64) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let (received_tx, received_rx) = unbounded_channel();

        let inner = Arc::new(Inner {
            url: format!("ws://{}", addr),
            heartbeat_interval_ms,
            ack_heartbeats: AtomicBool::new(true),
            connections: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            sequence: AtomicU64::new(0),
            current: Mutex::new(None),
            received_tx,
        });

        let accept_inner = Arc::clone(&inner);
        let accept_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let inner = Arc::clone(&accept_inner);
                                let shutdown = Arc::clone(&accept_shutdown);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, Arc::clone(&inner), shutdown).await;
                                    inner.closed.fetch_add(1, Ordering::SeqCst);
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            inner,
            received_rx,
            shutdown,
        }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, inner: Arc<Inner>, shutdown: Arc<Notify>) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let connection = inner.connections.fetch_add(1, Ordering::SeqCst) + 1;
        let (mut write, mut read) = ws_stream.split();
        let (command_tx, mut command_rx) = unbounded_channel();
        *inner.current.lock() = Some(command_tx);

        let hello = Frame::new(
            OpCode::Hello.code(),
            json!({"heartbeat_interval": inner.heartbeat_interval_ms}),
        );
        if write.send(text(&hello)).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    let frame = match msg {
                        Some(Ok(Message::Text(text))) => match Frame::from_json(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                eprintln!("Mock gateway got a bad frame: {}", e);
                                continue;
                            }
                        },
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };

                    let _ = inner.received_tx.send(Received { connection, frame: frame.clone() });

                    let reply = match frame.opcode() {
                        Some(OpCode::Heartbeat) if inner.ack_heartbeats.load(Ordering::SeqCst) => {
                            Some(Frame::new(OpCode::HeartbeatAck.code(), Value::Null))
                        }
                        Some(OpCode::Identify) => Some(Frame::dispatch(
                            "READY",
                            inner.next_sequence(),
                            json!({
                                "v": 10,
                                "session_id": MOCK_SESSION_ID,
                                "resume_gateway_url": inner.url,
                                "application": {"id": MOCK_APPLICATION_ID, "flags": 0},
                                "user": {"id": "42", "username": "mock-bot", "bot": true},
                                "guilds": []
                            }),
                        )),
                        Some(OpCode::Resume) => {
                            Some(Frame::dispatch("RESUMED", inner.next_sequence(), json!({})))
                        }
                        _ => None,
                    };

                    if let Some(reply) = reply {
                        if write.send(text(&reply)).await.is_err() {
                            break;
                        }
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(ServerCommand::Send(frame)) => {
                            if write.send(text(&frame)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Close(code)) => {
                            let frame = CloseFrame { code: code.into(), reason: "mock close".into() };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Base URL to configure the client with
    pub fn ws_url(&self) -> String {
        self.inner.url.clone()
    }

    /// Client config pointed at this mock, with short delays
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new(TEST_TOKEN, Intents::GUILDS | Intents::GUILD_MESSAGES)
            .with_gateway_url(self.ws_url())
            .with_reconnect_delay(Duration::from_millis(50))
            .with_reidentify_delay(Duration::from_millis(50))
    }

    pub fn set_ack_heartbeats(&self, ack: bool) {
        self.inner.ack_heartbeats.store(ack, Ordering::SeqCst);
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.inner.connections.load(Ordering::SeqCst)
    }

    /// Connections that have ended, from either side
    pub fn closed_connections(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Next sequence number the mock will hand out
    pub fn next_sequence(&self) -> u64 {
        self.inner.next_sequence()
    }

    /// Push a frame on the most recent connection
    pub fn send(&self, frame: Frame) {
        if let Some(tx) = self.inner.current.lock().as_ref() {
            let _ = tx.send(ServerCommand::Send(frame));
        }
    }

    /// Close the most recent connection with `code`
    pub fn close(&self, code: u16) {
        if let Some(tx) = self.inner.current.lock().as_ref() {
            let _ = tx.send(ServerCommand::Close(code));
        }
    }

    /// Wait for the next client frame with opcode `op`, skipping others
    pub async fn expect_op(&mut self, op: OpCode) -> Received {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let received = tokio::time::timeout_at(deadline, self.received_rx.recv())
                .await
                .unwrap_or_else(|_| panic!("timed out waiting for {}", op))
                .expect("mock gateway stopped");
            verbose_println!("  mock <- conn {} op {}", received.connection, received.frame.op);
            if received.frame.opcode() == Some(op) {
                return received;
            }
        }
    }

    /// Frames received so far that were not consumed yet
    pub fn drain(&mut self) -> Vec<Received> {
        let mut frames = Vec::new();
        while let Ok(received) = self.received_rx.try_recv() {
            frames.push(received);
        }
        frames
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn text(frame: &Frame) -> Message {
    Message::Text(frame.to_json().unwrap())
}

/// Poll `condition` until it holds or `WAIT` elapses
pub async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting until {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait for the next event published under `name`, skipping others
pub async fn wait_for_event(events: &Receiver<Notification>, name: &str) -> GatewayEvent {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        match events.try_recv() {
            Ok(Notification::Event(event)) if event.name() == name => return event,
            Ok(_) => continue,
            Err(_) => {
                if tokio::time::Instant::now() >= deadline {
                    panic!("timed out waiting for event {}", name);
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Wait for the next error notification, skipping events
pub async fn wait_for_error(events: &Receiver<Notification>) -> GatewayError {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        match events.try_recv() {
            Ok(Notification::Error(error)) => return error,
            Ok(_) => continue,
            Err(_) => {
                if tokio::time::Instant::now() >= deadline {
                    panic!("timed out waiting for an error notification");
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}
