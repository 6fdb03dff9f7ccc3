//! wandrpc: one-shot RPC against the Magic Wand.
//!
//! Discovers the device over HTTP/mDNS and BLE, then either issues a single
//! call or streams a firmware image.
//!
//! ```text
//! wandrpc sys:health
//! wandrpc --address 192.168.0.126:8080 wand:set_percent 50
//! wandrpc --no-ble --upload build/firmware.bin
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use serde_json::Value;

use wandrpc::{Client, ClientConfig};

#[derive(Debug, Parser)]
#[command(name = "wandrpc", version, about = "Call the Magic Wand over HTTP or BLE")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer address (host:port or URL); skips mDNS
    #[arg(short, long)]
    address: Option<String>,

    /// Do not scan for the device over BLE
    #[arg(long)]
    no_ble: bool,

    /// Do not resolve the device via mDNS
    #[arg(long)]
    no_mdns: bool,

    /// Stream this firmware image to /ota/upload instead of calling
    #[arg(long, conflicts_with = "method")]
    upload: Option<PathBuf>,

    /// `namespace:method` to invoke
    method: Option<String>,

    /// Call arguments; each is parsed as JSON, or sent as a string
    args: Vec<String>,
}

fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.address {
        config.address = Some(addr);
    }
    config.use_ble &= !args.no_ble;
    config.use_mdns &= !args.no_mdns;

    info!("wandrpc v{}", env!("CARGO_PKG_VERSION"));

    let client = Client::new(&config).context("creating RPC session")?;
    client.find(&config.discovery_options()).await;

    if let Some(image) = args.upload {
        let reply = client
            .upload_firmware(&image, |sent| log::debug!("upload: {} bytes", sent))
            .await
            .with_context(|| format!("uploading {}", image.display()))?;
        println!("{reply}");
        return Ok(());
    }

    let target = args.method.as_deref().unwrap_or("sys:health");
    let Some((namespace, method)) = target.split_once(':') else {
        bail!("expected namespace:method, got {target:?}");
    };
    let params = args.args.iter().map(|a| parse_arg(a)).collect();

    let response = client.call(namespace, method, params).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Some(err) = response.error {
        bail!("{target}: {err}");
    }
    Ok(())
}
