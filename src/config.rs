//! Client configuration
//!
//! All tunable parameters for an RPC session. Values come from
//! [`ClientConfig::default`], optionally a JSON file, then environment
//! overrides.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};

use crate::adapters::http_transport::DEFAULT_UPLOAD_CHUNK;
use crate::adapters::mdns::{MDNS_INSTANCE_NAME, MDNS_SERVICE_TYPE, MdnsService};
use crate::rpc::transport::DiscoveryOptions;

/// Explicit peer address, e.g. `192.168.0.126:8080`.
pub const ENV_ADDR: &str = "WANDRPC_ADDR";
/// Set to anything but `0`/`false` to skip BLE.
pub const ENV_NO_BLE: &str = "WANDRPC_NO_BLE";
/// Set to anything but `0`/`false` to skip mDNS.
pub const ENV_NO_MDNS: &str = "WANDRPC_NO_MDNS";

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // --- Discovery ---
    /// Scan for the peer over BLE
    pub use_ble: bool,
    /// Resolve the HTTP address via mDNS
    pub use_mdns: bool,
    /// Explicit HTTP address; takes precedence over mDNS
    pub address: Option<String>,
    /// mDNS service type
    pub mdns_service_type: String,
    /// mDNS instance name
    pub mdns_instance: String,

    // --- Timing ---
    /// Per-call timeout, applied to each transport attempt (milliseconds)
    pub call_timeout_ms: u64,
    /// Upper bound for one transport's discovery (milliseconds)
    pub discovery_timeout_ms: u64,
    /// mDNS browse window (milliseconds)
    pub mdns_timeout_ms: u64,
    /// BLE scan window (milliseconds)
    pub scan_timeout_ms: u64,
    /// Upper bound for a whole firmware upload, reply included (milliseconds)
    pub upload_timeout_ms: u64,

    // --- Upload ---
    /// Bytes read from disk per upload chunk
    pub upload_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            use_ble: true,
            use_mdns: true,
            address: None,
            mdns_service_type: MDNS_SERVICE_TYPE.to_string(),
            mdns_instance: MDNS_INSTANCE_NAME.to_string(),

            call_timeout_ms: 10_000,
            discovery_timeout_ms: 15_000,
            mdns_timeout_ms: 3_000,
            scan_timeout_ms: 5_000,
            upload_timeout_ms: 300_000,

            upload_chunk_size: DEFAULT_UPLOAD_CHUNK, // 8 KiB
        }
    }
}

fn env_flag(value: &str) -> bool {
    !matches!(value.trim().to_ascii_lowercase().as_str(), "" | "0" | "false" | "no")
}

impl ClientConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_ADDR).filter(|a| !a.trim().is_empty()) {
            self.address = Some(addr);
        }
        if lookup(ENV_NO_BLE).is_some_and(|v| env_flag(&v)) {
            self.use_ble = false;
        }
        if lookup(ENV_NO_MDNS).is_some_and(|v| env_flag(&v)) {
            self.use_mdns = false;
        }
        self
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides(|k| std::env::var(k).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.call_timeout_ms == 0 || self.upload_timeout_ms == 0 {
            bail!("call and upload timeouts must be non-zero");
        }
        if self.discovery_timeout_ms == 0 || self.mdns_timeout_ms == 0 || self.scan_timeout_ms == 0 {
            bail!("discovery timeouts must be non-zero");
        }
        if self.upload_chunk_size == 0 {
            bail!("upload_chunk_size must be non-zero");
        }
        if self.mdns_service_type.is_empty() || self.mdns_instance.is_empty() {
            bail!("mDNS service type and instance must be set");
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn mdns_timeout(&self) -> Duration {
        Duration::from_millis(self.mdns_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn mdns_service(&self) -> MdnsService {
        MdnsService {
            service_type: self.mdns_service_type.clone(),
            instance: self.mdns_instance.clone(),
        }
    }

    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            use_wireless: self.use_ble,
            use_mdns: self.use_mdns,
            address: self.address.clone(),
            rediscover: false,
        }
    }
}
