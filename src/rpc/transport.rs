//! Transport abstraction: anything that can carry a [`Call`] to the peer.
//!
//! Concrete implementations:
//! - HTTP over the local network (`adapters::http_transport`)
//! - BLE GATT write + notify (`adapters::ble_transport`)
//!
//! The selector is generic over `Transport`, so it can be exercised with
//! scripted transports and no radio or network at all.

use async_trait::async_trait;

use super::codec::{Call, Response};
use crate::error::{Result, TransportKind};

/// What discovery should look for. Each transport reads only its own fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Scan for the peer over BLE.
    pub use_wireless: bool,
    /// Resolve the peer's HTTP address via mDNS.
    pub use_mdns: bool,
    /// Explicit HTTP address; skips mDNS when set.
    pub address: Option<String>,
    /// Rescan BLE even if a link is already up.
    pub rediscover: bool,
}

impl DiscoveryOptions {
    /// Whether network discovery has anything to go on.
    pub fn wants_network(&self) -> bool {
        self.use_mdns || self.address.is_some()
    }
}

/// One way of reaching the peer.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Locate the peer. Returns `false` rather than an error when nothing
    /// was found.
    async fn discover(&self, opts: &DiscoveryOptions) -> bool;

    /// Issue one call and wait for its response. Imposes no timeout.
    async fn call(&self, call: &Call) -> Result<Response>;

    async fn is_alive(&self) -> bool;
}
