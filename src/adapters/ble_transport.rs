//! BLE RPC transport: JSON envelopes over GATT write/notify.
//!
//! The client writes request envelopes to the "RPC Request" characteristic
//! without response; the device answers with notifications on "RPC
//! Response". Replies may arrive in any order, so every request gets an id
//! from the [`PendingTable`] and the notification pump routes each reply to
//! the caller waiting on that id.
//!
//! ```text
//!  call() ──register──▶ PendingTable ◀──resolve── pump task ◀── notify
//!    │                                                       ▲
//!    └──write(envelope)──────────▶ GattLink ─────────────────┘
//! ```
//!
//! No timeout is applied here; the selector layers one on. Dropping the
//! call future releases its id, so a late reply is logged as an orphan.
//!
//! A link is only live once its notifications are flowing. When the stream
//! ends the pump marks the link dead, so `is_alive` turns false, `call`
//! fails fast and the next `discover` rescans.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_lite::StreamExt;
use log::{info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::ble::{GattCentral, GattLink, GattSignature, NotificationStream, PlatformCentral};
use crate::error::{Result, RpcError, TransportKind};
use crate::rpc::codec::{self, Call, Response};
use crate::rpc::pending::{PendingTable, Resolution};
use crate::rpc::transport::{DiscoveryOptions, Transport};

const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Open link plus the task draining its notifications.
///
/// Stored as soon as the central hands over a link, before subscribing, so a
/// discovery cut short by a timeout still leaves the link here to be torn
/// down. `dead` starts set and is cleared once the pump is running.
struct Connection {
    link: Arc<dyn GattLink>,
    pump: Option<JoinHandle<()>>,
    dead: Arc<AtomicBool>,
}

impl Connection {
    fn is_live(&self) -> bool {
        !self.dead.load(Ordering::SeqCst)
    }
}

/// BLE GATT transport.
pub struct BleTransport<C = PlatformCentral> {
    central: C,
    signature: GattSignature,
    scan_timeout: Duration,
    pending: Arc<PendingTable>,
    conn: Mutex<Option<Connection>>,
}

impl BleTransport<PlatformCentral> {
    pub fn new() -> Self {
        Self::with_central(PlatformCentral::default())
    }
}

impl Default for BleTransport<PlatformCentral> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: GattCentral> BleTransport<C> {
    pub fn with_central(central: C) -> Self {
        Self {
            central,
            signature: GattSignature::default(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            pending: Arc::new(PendingTable::new()),
            conn: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    #[must_use]
    pub fn signature(mut self, signature: GattSignature) -> Self {
        self.signature = signature;
        self
    }

    /// Number of calls currently waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// The link, if one is up and its notification stream has not ended.
    fn live_link(&self) -> Option<(Arc<dyn GattLink>, Arc<AtomicBool>)> {
        self.conn
            .lock()
            .as_ref()
            .filter(|c| c.is_live())
            .map(|c| (Arc::clone(&c.link), Arc::clone(&c.dead)))
    }

    fn is_connected(&self) -> bool {
        self.conn.lock().as_ref().is_some_and(Connection::is_live)
    }

    /// Handle one inbound notification payload.
    ///
    /// Malformed payloads and replies nobody is waiting for are logged and
    /// dropped.
    pub fn on_notification(&self, data: &[u8]) -> Option<Resolution> {
        handle_notification(&self.pending, data)
    }

    /// Tear down the current link, if any. Waiting calls fail.
    pub async fn disconnect(&self) {
        let conn = self.conn.lock().take();
        let Some(conn) = conn else {
            return;
        };
        conn.dead.store(true, Ordering::SeqCst);
        if let Some(pump) = conn.pump {
            pump.abort();
        }
        self.pending.close_all();
        if let Err(e) = conn.link.disconnect().await {
            warn!("BLE RPC: disconnect failed: {}", e);
        }
        info!("BLE RPC: disconnected");
    }
}

fn not_connected() -> RpcError {
    RpcError::NotConnected {
        transport: TransportKind::Wireless,
    }
}

fn handle_notification(pending: &PendingTable, data: &[u8]) -> Option<Resolution> {
    match codec::decode_response(data) {
        Ok(response) => Some(pending.resolve(response)),
        Err(e) => {
            warn!(
                "BLE RPC: dropping malformed notification ({}): {}",
                e,
                String::from_utf8_lossy(data)
            );
            None
        }
    }
}

async fn drain_notifications(
    mut stream: NotificationStream,
    pending: Arc<PendingTable>,
    dead: Arc<AtomicBool>,
) {
    while let Some(data) = stream.next().await {
        handle_notification(&pending, &data);
    }
    warn!("BLE RPC: notification stream ended, link is down");
    // Mark first: a call registering after close_all sees the flag.
    dead.store(true, Ordering::SeqCst);
    pending.close_all();
}

#[async_trait]
impl<C: GattCentral> Transport for BleTransport<C> {
    fn kind(&self) -> TransportKind {
        TransportKind::Wireless
    }

    async fn discover(&self, opts: &DiscoveryOptions) -> bool {
        if !opts.rediscover && self.is_connected() {
            return true;
        }
        self.disconnect().await;

        let link = match self.central.connect(&self.signature, self.scan_timeout).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                info!("BLE RPC: no peer advertising {}", self.signature.service);
                return false;
            }
            Err(e) => {
                warn!("BLE RPC: discovery failed: {}", e);
                return false;
            }
        };

        let dead = Arc::new(AtomicBool::new(true));
        *self.conn.lock() = Some(Connection {
            link: Arc::clone(&link),
            pump: None,
            dead: Arc::clone(&dead),
        });

        let stream = match link.notifications().await {
            Ok(s) => s,
            Err(e) => {
                warn!("BLE RPC: subscribe failed: {}", e);
                self.disconnect().await;
                return false;
            }
        };

        dead.store(false, Ordering::SeqCst);
        let pump = tokio::spawn(drain_notifications(
            stream,
            Arc::clone(&self.pending),
            Arc::clone(&dead),
        ));
        if let Some(conn) = self.conn.lock().as_mut() {
            conn.pump = Some(pump);
        }
        info!("BLE RPC: connected");
        true
    }

    async fn call(&self, call: &Call) -> Result<Response> {
        let method = call.qualified();
        let (link, dead) = self.live_link().ok_or_else(not_connected)?;

        let slot = self.pending.register()?;
        if dead.load(Ordering::SeqCst) {
            // Stream ended between the check and registration.
            return Err(not_connected());
        }
        let payload = codec::encode_request(call, slot.id())
            .map_err(|e| RpcError::protocol(TransportKind::Wireless, &method, e))?;
        log::debug!("BLE RPC: -> {}", String::from_utf8_lossy(&payload));

        link.write(&payload)
            .await
            .map_err(|e| RpcError::transport(TransportKind::Wireless, &method, e))?;

        slot.response().await.ok_or_else(|| {
            RpcError::transport(TransportKind::Wireless, &method, "link closed before reply")
        })
    }

    async fn is_alive(&self) -> bool {
        self.is_connected()
    }
}

impl<C> Drop for BleTransport<C> {
    fn drop(&mut self) {
        if let Some(pump) = self.conn.get_mut().take().and_then(|c| c.pump) {
            pump.abort();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
