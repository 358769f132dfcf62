//! Shared helpers for the client integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use laneguard_client::client::{StreamConnector, StreamError, StreamTransport, TransportEvent};
use tokio::sync::mpsc;

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 2s");
}

/// A realtime frame with one detection, tagged with `frame_id`.
pub fn frame_json(frame_id: i64) -> String {
    serde_json::json!({
        "frame_id": frame_id,
        "frame_width": 1280,
        "frame_height": 720,
        "detection_mode": "yolo",
        "fps": 12.5,
        "detections": [{
            "class_name": "person",
            "class_id": 0,
            "confidence": 0.87,
            "bbox": {"x": 100, "y": 300, "w": 80, "h": 200},
            "risk_level": "danger",
            "reason": "bottom_y>=danger"
        }]
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Scripted stream connector
// ---------------------------------------------------------------------------

/// One connection opened through [`FakeConnector`].
pub struct FakeConnection {
    pub url: String,
    feed: mpsc::UnboundedSender<TransportEvent>,
    closes: Arc<AtomicUsize>,
}

impl FakeConnection {
    /// Deliver an event to the client side of this connection.
    pub fn push(&self, event: TransportEvent) {
        let _ = self.feed.send(event);
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Connector whose transports are fed by the test.
#[derive(Default)]
pub struct FakeConnector {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    fail: AtomicBool,
    held: AtomicBool,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every following connect attempt fail.
    pub fn fail_connects(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Keep following handshakes in flight until [`release_connects`](Self::release_connects).
    pub fn hold_connects(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_connects(&self) {
        self.held.store(false, Ordering::SeqCst);
    }

    /// Handshakes started, including abandoned ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Handshakes that completed.
    pub fn count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn connection(&self, index: usize) -> Arc<FakeConnection> {
        Arc::clone(&self.connections.lock().unwrap()[index])
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamTransport>, StreamError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        while self.held.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StreamError::Connection(format!("refused: {url}")));
        }
        let (feed, events) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        self.connections.lock().unwrap().push(Arc::new(FakeConnection {
            url: url.to_string(),
            feed,
            closes: Arc::clone(&closes),
        }));
        Ok(Box::new(FakeTransport { events, closes }))
    }
}

struct FakeTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl StreamTransport for FakeTransport {
    async fn next_event(&mut self) -> TransportEvent {
        self.events.recv().await.unwrap_or(TransportEvent::Closed)
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
