//! mDNS service resolution adapter.
//!
//! The device advertises `_magicwandrpc._tcp` with instance name
//! `Magic Wand [v0.1]`. The network transport resolves that record to an
//! `ip:port` pair through the [`ServiceResolver`] port.
//!
//! With the `mdns` feature the port is backed by `mdns-sd`; without it,
//! [`NullResolver`] resolves nothing and an explicit address is required.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const MDNS_SERVICE_TYPE: &str = "_magicwandrpc._tcp.local.";
pub const MDNS_INSTANCE_NAME: &str = "Magic Wand [v0.1]";

/// The service record to look for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdnsService {
    pub service_type: String,
    pub instance: String,
}

impl MdnsService {
    /// Fully-qualified instance name, e.g. `Magic Wand [v0.1]._magicwandrpc._tcp.local.`
    pub fn fullname(&self) -> String {
        format!("{}.{}", self.instance, self.service_type)
    }
}

impl Default for MdnsService {
    fn default() -> Self {
        Self {
            service_type: MDNS_SERVICE_TYPE.to_string(),
            instance: MDNS_INSTANCE_NAME.to_string(),
        }
    }
}

/// Pick the address to dial from a resolved record.
///
/// IPv4 first, then routable IPv6. A link-local IPv6 address carries no
/// scope id here and cannot be dialled, so it is never chosen.
pub fn pick_address<'a>(addrs: impl IntoIterator<Item = &'a IpAddr>) -> Option<IpAddr> {
    let mut v6 = None;
    for ip in addrs {
        match ip {
            IpAddr::V4(_) => return Some(*ip),
            IpAddr::V6(v) if !v.is_unicast_link_local() && v6.is_none() => v6 = Some(*ip),
            IpAddr::V6(_) => {}
        }
    }
    v6
}

/// Resolves a service record to an address.
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    /// `Ok(None)` when the record was not seen within `timeout`.
    async fn resolve(&self, service: &MdnsService, timeout: Duration) -> Result<Option<SocketAddr>>;
}

/// Resolver used when no mDNS backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

#[async_trait]
impl ServiceResolver for NullResolver {
    async fn resolve(&self, service: &MdnsService, _timeout: Duration) -> Result<Option<SocketAddr>> {
        log::info!("mDNS(sim): not resolving {}", service.fullname());
        Ok(None)
    }
}

/// Resolver compiled in for this build.
#[cfg(feature = "mdns")]
pub type PlatformResolver = sd::MdnsSdResolver;
#[cfg(not(feature = "mdns"))]
pub type PlatformResolver = NullResolver;

// ── mdns-sd backend ──────────────────────────────────────────

#[cfg(feature = "mdns")]
pub mod sd {
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use log::{info, warn};
    use mdns_sd::{ServiceDaemon, ServiceEvent};

    use super::{MdnsService, ServiceResolver, pick_address};
    use crate::error::{Result, RpcError, TransportKind};

    fn mdns_err(e: impl core::fmt::Display) -> RpcError {
        RpcError::transport(TransportKind::Network, "mdns", e)
    }

    /// Browses with a short-lived `mdns-sd` daemon per lookup.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct MdnsSdResolver;

    fn browse(service: &MdnsService, timeout: Duration) -> Result<Option<SocketAddr>> {
        let daemon = ServiceDaemon::new().map_err(mdns_err)?;
        let receiver = daemon.browse(&service.service_type).map_err(mdns_err)?;
        let fullname = service.fullname();
        let deadline = Instant::now() + timeout;

        let mut found = None;
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            let Ok(event) = receiver.recv_timeout(left) else {
                break;
            };
            if let ServiceEvent::ServiceResolved(info) = event {
                if info.get_fullname() != fullname {
                    continue;
                }
                if let Some(ip) = pick_address(info.get_addresses()) {
                    found = Some(SocketAddr::new(ip, info.get_port()));
                    break;
                }
                warn!("mDNS: {} has no dialable address", fullname);
            }
        }

        if let Err(e) = daemon.shutdown() {
            warn!("mDNS: daemon shutdown failed: {}", e);
        }
        Ok(found)
    }

    #[async_trait]
    impl ServiceResolver for MdnsSdResolver {
        async fn resolve(
            &self,
            service: &MdnsService,
            timeout: Duration,
        ) -> Result<Option<SocketAddr>> {
            let service = service.clone();
            let found = tokio::task::spawn_blocking(move || browse(&service, timeout))
                .await
                .map_err(mdns_err)??;
            match found {
                Some(addr) => info!("mDNS: peer is at {}", addr),
                None => info!("mDNS: peer not found"),
            }
            Ok(found)
        }
    }
}
