//! Transport selector: one session, two ways to reach the peer.
//!
//! ```text
//!            ┌──────────────── call(ns, method, args) ───────────────┐
//!            ▼                                                       │
//!   network Available? ──yes──▶ HTTP call ──ok──▶ Response           │
//!            │                     │                                 │
//!            no                   err (logged)                       │
//!            ▼                     ▼                                 │
//!            └──────────────▶ BLE call ──ok──▶ Response              │
//!                                  │                                 │
//!                                 err ──▶ surfaced to caller ◀───────┘
//! ```
//!
//! Availability is set by [`Client::find`] and, for the network side, by
//! [`Client::check_network`]. A failed call does not demote a transport and
//! a successful one does not promote it.

use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use serde_json::Value;

use crate::adapters::ble_transport::BleTransport;
use crate::adapters::http_transport::{HttpTransport, UPLOAD_METHOD};
use crate::adapters::mdns::ServiceResolver;
use crate::config::ClientConfig;
use crate::error::{Result, RpcError, TransportKind};
use crate::rpc::codec::{Call, Response};
use crate::rpc::transport::{DiscoveryOptions, Transport};

/// Per-transport discovery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    /// Discovery has not run for this transport.
    #[default]
    Unknown,
    Available,
    Unavailable,
}

impl Availability {
    fn from_found(found: bool) -> Self {
        if found {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

#[derive(Debug, Default)]
struct State {
    network: Availability,
    wireless: Availability,
}

/// An RPC session with the peer.
///
/// Owns both transports for its whole lifetime. Construct once and pass by
/// reference to whatever needs to talk to the device.
pub struct Client<N = HttpTransport, W = BleTransport> {
    network: N,
    wireless: W,
    state: Mutex<State>,
    call_timeout: Duration,
    discovery_timeout: Duration,
    upload_timeout: Duration,
}

impl Client<HttpTransport, BleTransport> {
    /// Build a session with the platform transports, tuned by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let network = HttpTransport::new()?
            .service(config.mdns_service())
            .resolve_timeout(config.mdns_timeout())
            .upload_chunk(config.upload_chunk_size);
        let wireless = BleTransport::new().scan_timeout(config.scan_timeout());
        Ok(Self::with_transports(network, wireless, config))
    }
}

impl<N: Transport, W: Transport> Client<N, W> {
    pub fn with_transports(network: N, wireless: W, config: &ClientConfig) -> Self {
        Self {
            network,
            wireless,
            state: Mutex::new(State::default()),
            call_timeout: config.call_timeout(),
            discovery_timeout: config.discovery_timeout(),
            upload_timeout: config.upload_timeout(),
        }
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn wireless(&self) -> &W {
        &self.wireless
    }

    pub fn availability(&self, kind: TransportKind) -> Availability {
        let state = self.state.lock();
        match kind {
            TransportKind::Network => state.network,
            TransportKind::Wireless => state.wireless,
        }
    }

    /// Run discovery on the requested transports.
    ///
    /// Never fails: each transport's availability reflects its own outcome.
    /// Transports that were not asked for keep their previous state.
    pub async fn find(&self, opts: &DiscoveryOptions) {
        if opts.use_wireless {
            let found = self.discover_on(&self.wireless, opts).await;
            self.state.lock().wireless = Availability::from_found(found);
        }

        if opts.wants_network() {
            let found = self.discover_on(&self.network, opts).await;
            self.state.lock().network = Availability::from_found(found);
        }
    }

    /// Re-derive network availability from the liveness check.
    pub async fn check_network(&self) -> Availability {
        let alive = tokio::time::timeout(self.call_timeout, self.network.is_alive())
            .await
            .unwrap_or(false);
        let availability = Availability::from_found(alive);
        self.state.lock().network = availability;
        availability
    }

    async fn discover_on<T: Transport>(&self, transport: &T, opts: &DiscoveryOptions) -> bool {
        let kind = transport.kind();
        let found = tokio::time::timeout(self.discovery_timeout, transport.discover(opts))
            .await
            .unwrap_or_else(|_| {
                warn!("{}: discovery timed out", kind);
                false
            });

        if found {
            info!("{}: peer available", kind);
        } else {
            warn!("{}", RpcError::DiscoveryFailed { transport: kind });
        }
        found
    }

    /// Invoke `namespace:method(args)` on the peer.
    pub async fn call(
        &self,
        namespace: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<Response> {
        self.call_with(&Call::new(namespace, method, args)).await
    }

    /// Route `call` network-first with BLE fallback.
    ///
    /// A response carrying a peer-side `error` is a successful call here.
    /// If both transports fail, the BLE error is returned.
    pub async fn call_with(&self, call: &Call) -> Result<Response> {
        if self.availability(TransportKind::Network) == Availability::Available {
            match self.call_on(&self.network, call).await {
                Ok(response) => return Ok(response),
                Err(e) => warn!(
                    "Failed to make call {} over HTTP: {}. Falling back to BLE.",
                    call.qualified(),
                    e
                ),
            }
        }

        self.call_on(&self.wireless, call).await.inspect_err(|e| {
            log::error!("Failed to make call {} over BLE: {}", call.qualified(), e);
        })
    }

    async fn call_on<T: Transport>(&self, transport: &T, call: &Call) -> Result<Response> {
        tokio::time::timeout(self.call_timeout, transport.call(call))
            .await
            .unwrap_or_else(|_| {
                Err(RpcError::Timeout {
                    transport: transport.kind(),
                    method: call.qualified(),
                })
            })
    }
}

impl<R: ServiceResolver, W: Transport> Client<HttpTransport<R>, W> {
    /// Stream a firmware image to the peer over HTTP.
    ///
    /// Requires the network transport; there is no BLE upload path. The
    /// whole transfer, reply included, is bounded by `upload_timeout_ms`.
    pub async fn upload_firmware<F>(&self, path: impl AsRef<Path>, on_progress: F) -> Result<String>
    where
        F: FnMut(u64) + Send + 'static,
    {
        if self.availability(TransportKind::Network) != Availability::Available {
            return Err(RpcError::NotConnected {
                transport: TransportKind::Network,
            });
        }
        tokio::time::timeout(self.upload_timeout, self.network.upload(path, on_progress))
            .await
            .unwrap_or_else(|_| {
                Err(RpcError::Timeout {
                    transport: TransportKind::Network,
                    method: UPLOAD_METHOD.to_string(),
                })
            })
    }
}
