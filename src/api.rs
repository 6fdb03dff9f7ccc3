//! Device commands: named wrappers over [`Client::call`].
//!
//! Each wrapper fixes the namespace and method and shapes the arguments.
//! The generic `call` stays available for anything not listed here.

use serde::Serialize;
use serde_json::json;

use crate::client::Client;
use crate::error::{Result, RpcError, TransportKind};
use crate::rpc::codec::Response;
use crate::rpc::transport::Transport;

/// WiFi station credentials, as `conn:set_wifi` expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiConfig {
    pub ssid: String,
    pub authentication: WifiAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WifiAuth {
    /// WPA2-Personal.
    Personal { password: String },
    /// WPA2-Enterprise (PEAP/TTLS).
    Enterprise {
        identity: String,
        username: String,
        password: String,
    },
}

impl WifiConfig {
    pub fn wpa2_personal(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            authentication: WifiAuth::Personal {
                password: password.into(),
            },
        }
    }

    pub fn wpa2_enterprise(
        ssid: impl Into<String>,
        identity: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            ssid: ssid.into(),
            authentication: WifiAuth::Enterprise {
                identity: identity.into(),
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

impl<N: Transport, W: Transport> Client<N, W> {
    // ── conn ──────────────────────────────────────────────────

    pub async fn set_wifi(&self, config: &WifiConfig) -> Result<Response> {
        let config = serde_json::to_value(config)
            .map_err(|e| RpcError::protocol(TransportKind::Network, "conn:set_wifi", e))?;
        self.call("conn", "set_wifi", vec![config]).await
    }

    /// IP and MAC addresses of the device.
    pub async fn addresses(&self) -> Result<Response> {
        self.call("conn", "addr", vec![]).await
    }

    // ── sys ───────────────────────────────────────────────────

    pub async fn restart(&self) -> Result<Response> {
        self.call("sys", "restart", vec![]).await
    }

    pub async fn build_info(&self) -> Result<Response> {
        self.call("sys", "build_info", vec![]).await
    }

    pub async fn health(&self) -> Result<Response> {
        self.call("sys", "health", vec![]).await
    }

    // ── uart ──────────────────────────────────────────────────

    /// Last line the device read from its diagnostic UART.
    pub async fn uart_get_last(&self) -> Result<Response> {
        self.call("uart", "get_last", vec![]).await
    }

    pub async fn uart_send(&self, msg: &str) -> Result<Response> {
        self.call("uart", "send", vec![json!(msg)]).await
    }

    // ── wand ──────────────────────────────────────────────────

    pub async fn wand_get_percent(&self) -> Result<Response> {
        self.call("wand", "get_percent", vec![]).await
    }

    pub async fn wand_set_percent(&self, pct: u8) -> Result<Response> {
        self.call("wand", "set_percent", vec![json!(pct)]).await
    }

    pub async fn set_lovense_mapping(&self, low: u8, high: u8) -> Result<Response> {
        self.call("wand", "update_lovense_mapping", vec![json!(low), json!(high)])
            .await
    }

    pub async fn set_light_mappings(
        &self,
        bottom: u8,
        mid_low: u8,
        mid_high: u8,
        top: u8,
    ) -> Result<Response> {
        self.call(
            "wand",
            "set_light_mappings",
            vec![json!(bottom), json!(mid_low), json!(mid_high), json!(top)],
        )
        .await
    }

    pub async fn set_button_increments(&self, bottom: u8, top: u8) -> Result<Response> {
        self.call("wand", "set_button_increments", vec![json!(bottom), json!(top)])
            .await
    }
}
