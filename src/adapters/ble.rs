//! BLE central adapter: scanning, connecting, GATT write/notify.
//!
//! The wireless transport talks to the radio through two port traits:
//!
//! | Trait          | Role                                            |
//! |----------------|-------------------------------------------------|
//! | `GattCentral`  | scan for the advertised service, open a link    |
//! | `GattLink`     | write requests, stream response notifications   |
//!
//! With the `ble` feature the ports are backed by `btleplug`; without it,
//! [`NullCentral`] never finds a peer so the selector falls back cleanly.
//!
//! ## GATT Service Layout
//!
//! | Item            | UUID                                   | Perms      |
//! |-----------------|----------------------------------------|------------|
//! | Service (adv.)  | `54300001-0023-4bd4-bbd5-a6920e4c5653` | n/a        |
//! | RPC Request     | `813f9733-95c9-49ba-84a0-d0167c260eef` | Write/NR   |
//! | RPC Response    | `23ad909d-511b-4fad-ad85-0bf102eee315` | Notify     |

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_lite::Stream;
use uuid::Uuid;

use crate::error::Result;

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x54300001_0023_4bd4_bbd5_a6920e4c5653);
pub const CHAR_RPC_REQUEST: Uuid = Uuid::from_u128(0x813f9733_95c9_49ba_84a0_d0167c260eef);
pub const CHAR_RPC_RESPONSE: Uuid = Uuid::from_u128(0x23ad909d_511b_4fad_ad85_0bf102eee315);

/// Identifies the peer and its RPC characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattSignature {
    pub service: Uuid,
    pub request: Uuid,
    pub response: Uuid,
}

impl Default for GattSignature {
    fn default() -> Self {
        Self {
            service: SERVICE_UUID,
            request: CHAR_RPC_REQUEST,
            response: CHAR_RPC_RESPONSE,
        }
    }
}

/// Raw payloads received on the response characteristic.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

// ── Ports ────────────────────────────────────────────────────

/// Finds the peer and opens a link to it.
#[async_trait]
pub trait GattCentral: Send + Sync {
    /// Scan for up to `scan_timeout` for a device advertising
    /// `signature.service`, connect and resolve its characteristics.
    /// `Ok(None)` means nothing matching was seen.
    async fn connect(
        &self,
        signature: &GattSignature,
        scan_timeout: Duration,
    ) -> Result<Option<Arc<dyn GattLink>>>;
}

/// An open connection to the peer.
#[async_trait]
pub trait GattLink: Send + Sync {
    /// Write to the request characteristic without waiting for an ack.
    async fn write(&self, payload: &[u8]) -> Result<()>;

    /// Subscribe to the response characteristic.
    async fn notifications(&self) -> Result<NotificationStream>;

    async fn disconnect(&self) -> Result<()>;
}

// ── Null central ─────────────────────────────────────────────

/// Central used when no BLE backend is compiled in. Never finds a peer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCentral;

#[async_trait]
impl GattCentral for NullCentral {
    async fn connect(
        &self,
        _signature: &GattSignature,
        _scan_timeout: Duration,
    ) -> Result<Option<Arc<dyn GattLink>>> {
        log::info!("BLE(sim): no BLE backend compiled in, skipping scan");
        Ok(None)
    }
}

/// Central compiled in for this build.
#[cfg(feature = "ble")]
pub type PlatformCentral = btle::BtleCentral;
#[cfg(not(feature = "ble"))]
pub type PlatformCentral = NullCentral;

// ── btleplug backend ─────────────────────────────────────────

#[cfg(feature = "ble")]
pub mod btle {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use btleplug::api::{
        Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
    };
    use btleplug::platform::{Adapter, Manager, Peripheral};
    use futures_lite::StreamExt;
    use log::{info, warn};
    use tokio::time::{Instant, sleep};
    use uuid::Uuid;

    use super::{GattCentral, GattLink, GattSignature, NotificationStream};
    use crate::error::{Result, RpcError, TransportKind};

    const SCAN_POLL: Duration = Duration::from_millis(250);

    fn ble_err(op: &str, e: impl core::fmt::Display) -> RpcError {
        RpcError::transport(TransportKind::Wireless, op, e)
    }

    /// `btleplug`-backed central. Uses the first adapter the OS reports.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct BtleCentral;

    impl BtleCentral {
        async fn adapter() -> Result<Option<Adapter>> {
            let manager = Manager::new().await.map_err(|e| ble_err("manager", e))?;
            let adapters = manager.adapters().await.map_err(|e| ble_err("adapters", e))?;
            Ok(adapters.into_iter().next())
        }

        async fn find(
            adapter: &Adapter,
            signature: &GattSignature,
            scan_timeout: Duration,
        ) -> Result<Option<Peripheral>> {
            let deadline = Instant::now() + scan_timeout;
            while Instant::now() < deadline {
                let peripherals = adapter.peripherals().await.map_err(|e| ble_err("scan", e))?;
                for p in peripherals {
                    let Ok(Some(props)) = p.properties().await else {
                        continue;
                    };
                    if props.services.contains(&signature.service) {
                        info!("BLE: found peer {}", props.address);
                        return Ok(Some(p));
                    }
                }
                sleep(SCAN_POLL).await;
            }
            Ok(None)
        }
    }

    #[async_trait]
    impl GattCentral for BtleCentral {
        async fn connect(
            &self,
            signature: &GattSignature,
            scan_timeout: Duration,
        ) -> Result<Option<Arc<dyn GattLink>>> {
            let Some(adapter) = Self::adapter().await? else {
                warn!("BLE: no adapter available");
                return Ok(None);
            };

            adapter
                .start_scan(ScanFilter {
                    services: vec![signature.service],
                })
                .await
                .map_err(|e| ble_err("start_scan", e))?;
            let found = Self::find(&adapter, signature, scan_timeout).await;
            if let Err(e) = adapter.stop_scan().await {
                warn!("BLE: stop_scan failed: {}", e);
            }
            let Some(peripheral) = found? else {
                return Ok(None);
            };

            peripheral.connect().await.map_err(|e| ble_err("connect", e))?;
            peripheral
                .discover_services()
                .await
                .map_err(|e| ble_err("discover_services", e))?;

            let chars = peripheral.characteristics();
            let lookup = |uuid: Uuid| {
                chars
                    .iter()
                    .find(|c| c.uuid == uuid)
                    .cloned()
                    .ok_or_else(|| ble_err("characteristics", format!("{uuid} missing")))
            };
            let request = lookup(signature.request)?;
            let response = lookup(signature.response)?;

            Ok(Some(Arc::new(BtleLink {
                peripheral,
                request,
                response,
            })))
        }
    }

    /// Connected peripheral plus its resolved RPC characteristics.
    pub struct BtleLink {
        peripheral: Peripheral,
        request: Characteristic,
        response: Characteristic,
    }

    #[async_trait]
    impl GattLink for BtleLink {
        async fn write(&self, payload: &[u8]) -> Result<()> {
            self.peripheral
                .write(&self.request, payload, WriteType::WithoutResponse)
                .await
                .map_err(|e| ble_err("write", e))
        }

        async fn notifications(&self) -> Result<NotificationStream> {
            self.peripheral
                .subscribe(&self.response)
                .await
                .map_err(|e| ble_err("subscribe", e))?;
            let uuid = self.response.uuid;
            let stream = self
                .peripheral
                .notifications()
                .await
                .map_err(|e| ble_err("notifications", e))?
                .filter_map(move |n| (n.uuid == uuid).then_some(n.value));
            Ok(Box::pin(stream))
        }

        async fn disconnect(&self) -> Result<()> {
            self.peripheral
                .disconnect()
                .await
                .map_err(|e| ble_err("disconnect", e))
        }
    }
}
