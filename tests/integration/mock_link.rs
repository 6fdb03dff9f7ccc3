//! Mock transports and a mock BLE link for integration tests.
//!
//! `MockCentral`/`MockLink` stand in for the radio: every write lands on a
//! channel the test reads, and the test pushes notifications back. The
//! `ScriptedTransport` stands in for a whole transport so selector routing
//! can be checked call by call.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use wandrpc::adapters::ble::{GattCentral, GattLink, GattSignature, NotificationStream};
use wandrpc::{Call, DiscoveryOptions, Response, Result, RpcError, Transport, TransportKind};

// ── Mock BLE link ─────────────────────────────────────────────

pub struct MockLink {
    writes: UnboundedSender<Vec<u8>>,
    notifications: Mutex<Option<UnboundedReceiver<Vec<u8>>>>,
    pub fail_writes: AtomicBool,
    /// Subscribing never completes while set.
    pub hang_subscribe: AtomicBool,
    pub disconnects: AtomicUsize,
}

/// The test's side of a [`MockLink`].
pub struct LinkHandle {
    /// Every payload the transport wrote.
    pub writes: UnboundedReceiver<Vec<u8>>,
    /// Push a notification to the transport.
    pub notify: UnboundedSender<Vec<u8>>,
}

impl LinkHandle {
    /// Next written envelope, parsed.
    pub async fn next_request(&mut self) -> Value {
        let bytes = tokio::time::timeout(Duration::from_secs(2), self.writes.recv())
            .await
            .expect("no request written in time")
            .expect("link dropped");
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn reply(&self, id: u64, result: Value) {
        let body = json!({"res_id": id, "result": result, "error": null});
        self.notify.send(serde_json::to_vec(&body).unwrap()).unwrap();
    }
}

impl MockLink {
    pub fn new() -> (Arc<Self>, LinkHandle) {
        let (write_tx, write_rx) = unbounded_channel();
        let (notify_tx, notify_rx) = unbounded_channel();
        let link = Arc::new(Self {
            writes: write_tx,
            notifications: Mutex::new(Some(notify_rx)),
            fail_writes: AtomicBool::new(false),
            hang_subscribe: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        });
        (
            link,
            LinkHandle {
                writes: write_rx,
                notify: notify_tx,
            },
        )
    }
}

#[async_trait]
impl GattLink for MockLink {
    async fn write(&self, payload: &[u8]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RpcError::TransportFailure {
                transport: TransportKind::Wireless,
                method: "write".into(),
                detail: "GATT write rejected".into(),
            });
        }
        let _ = self.writes.send(payload.to_vec());
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        if self.hang_subscribe.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let rx = self
            .notifications
            .lock()
            .take()
            .expect("notifications subscribed twice");
        let stream = futures_lite::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|data| (data, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Central that "finds" preset links, one per successful scan.
pub struct MockCentral {
    links: Mutex<VecDeque<Arc<MockLink>>>,
    /// Shared so the test can keep a handle after the central moves.
    pub connects: Arc<AtomicUsize>,
}

impl MockCentral {
    pub fn with_link(link: Arc<MockLink>) -> Self {
        Self::with_links(vec![link])
    }

    /// Each scan hands out the next link; once they run out nothing is found.
    pub fn with_links(links: Vec<Arc<MockLink>>) -> Self {
        Self {
            links: Mutex::new(links.into()),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self::with_links(Vec::new())
    }
}

#[async_trait]
impl GattCentral for MockCentral {
    async fn connect(
        &self,
        _signature: &GattSignature,
        _scan_timeout: Duration,
    ) -> Result<Option<Arc<dyn GattLink>>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.links.lock().pop_front().map(|l| l as Arc<dyn GattLink>))
    }
}

// ── Scripted transport ────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Outcome {
    /// Answer with this result.
    Respond(Value),
    /// Answer with a peer-side error string.
    PeerError(String),
    /// Fail at the transport level.
    Fail,
    /// Never answer.
    Hang,
}

pub struct ScriptedTransport {
    kind: TransportKind,
    found: bool,
    outcome: Mutex<Outcome>,
    last: Mutex<Option<Call>>,
    pub calls: AtomicUsize,
    pub discovers: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(kind: TransportKind, found: bool, outcome: Outcome) -> Self {
        Self {
            kind,
            found,
            outcome: Mutex::new(outcome),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
            discovers: AtomicUsize::new(0),
        }
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent call this transport was asked to carry.
    pub fn last_call(&self) -> Option<Call> {
        self.last.lock().clone()
    }

    pub fn discovers(&self) -> usize {
        self.discovers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn discover(&self, _opts: &DiscoveryOptions) -> bool {
        self.discovers.fetch_add(1, Ordering::SeqCst);
        self.found
    }

    async fn call(&self, call: &Call) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some(call.clone());
        let outcome = self.outcome.lock().clone();
        match outcome {
            Outcome::Respond(result) => Ok(Response {
                res_id: 0,
                result: Some(result),
                error: None,
            }),
            Outcome::PeerError(message) => Ok(Response {
                res_id: 0,
                result: None,
                error: Some(message),
            }),
            Outcome::Fail => Err(RpcError::TransportFailure {
                transport: self.kind,
                method: call.qualified(),
                detail: "scripted failure".into(),
            }),
            Outcome::Hang => std::future::pending().await,
        }
    }

    async fn is_alive(&self) -> bool {
        self.found
    }
}
