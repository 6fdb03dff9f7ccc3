//! Magic Wand RPC client library.
//!
//! Talks to a single peripheral over HTTP (preferred, found via mDNS or an
//! explicit address) or BLE GATT (fallback). Platform backends for BLE and
//! mDNS are behind the `ble` and `mdns` features; without them the crate
//! builds against null adapters so host tests need no radio.

#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod rpc;

pub use api::{WifiAuth, WifiConfig};
pub use client::{Availability, Client};
pub use config::ClientConfig;
pub use error::{Result, RpcError, TransportKind};
pub use rpc::codec::{Call, Response};
pub use rpc::transport::{DiscoveryOptions, Transport};
