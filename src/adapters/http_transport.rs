//! HTTP RPC transport: JSON envelopes over the local network.
//!
//! | Route           | Method | Purpose                                  |
//! |-----------------|--------|------------------------------------------|
//! | `/rpc`          | POST   | one call: envelope in, response out      |
//! | `/check`        | GET    | liveness check                           |
//! | `/ota/upload`   | POST   | firmware image, streamed from disk       |
//!
//! The base address comes from an explicit override or from mDNS. The
//! `reqwest::Client` is the single session handle for the transport's
//! lifetime and is released when the transport is dropped.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_lite::Stream;
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::Url;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tokio::io::AsyncReadExt;

use super::mdns::{MdnsService, PlatformResolver, ServiceResolver};
use crate::error::{Result, RpcError, TransportKind};
use crate::rpc::codec::{self, Call, Response};
use crate::rpc::transport::{DiscoveryOptions, Transport};

pub const RPC_ROUTE: &str = "/rpc";
pub const CHECK_ROUTE: &str = "/check";
pub const UPLOAD_ROUTE: &str = "/ota/upload";

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_UPLOAD_CHUNK: usize = 8 * 1024;

/// Method name errors carry for firmware uploads.
pub const UPLOAD_METHOD: &str = "ota:upload";

/// Parse a user-supplied address. A bare `host:port` is taken as `http://`.
pub fn parse_base(address: &str) -> Option<Url> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }
    let url = if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("http://{address}"))
    };
    url.ok().filter(|u| u.has_host())
}

/// HTTP(S) transport.
pub struct HttpTransport<R = PlatformResolver> {
    http: reqwest::Client,
    resolver: R,
    service: MdnsService,
    resolve_timeout: Duration,
    upload_chunk: usize,
    base: RwLock<Option<Url>>,
    next_id: AtomicU8,
}

impl HttpTransport<PlatformResolver> {
    pub fn new() -> Result<Self> {
        Self::with_resolver(PlatformResolver::default())
    }
}

impl<R: ServiceResolver> HttpTransport<R> {
    pub fn with_resolver(resolver: R) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::transport(TransportKind::Network, "session", e))?;
        Ok(Self {
            http,
            resolver,
            service: MdnsService::default(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            upload_chunk: DEFAULT_UPLOAD_CHUNK,
            base: RwLock::new(None),
            next_id: AtomicU8::new(0),
        })
    }

    #[must_use]
    pub fn service(mut self, service: MdnsService) -> Self {
        self.service = service;
        self
    }

    #[must_use]
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    #[must_use]
    pub fn upload_chunk(mut self, bytes: usize) -> Self {
        self.upload_chunk = bytes.max(1);
        self
    }

    /// Currently adopted base address.
    pub fn base(&self) -> Option<Url> {
        self.base.read().clone()
    }

    fn route(&self, path: &str) -> Option<Url> {
        self.base.read().as_ref().and_then(|b| b.join(path).ok())
    }

    fn next_id(&self) -> u8 {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(if v >= 254 { 0 } else { v + 1 })
            })
            .unwrap_or_else(|v| v)
    }

    /// Stream the file at `path` to `/ota/upload`.
    ///
    /// `on_progress` sees the cumulative byte count after each chunk is
    /// handed to the connection. Returns the peer's text reply.
    pub async fn upload<F>(&self, path: impl AsRef<Path>, on_progress: F) -> Result<String>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let path = path.as_ref();
        let url = self.route(UPLOAD_ROUTE).ok_or(RpcError::NotConnected {
            transport: TransportKind::Network,
        })?;

        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        info!("HTTP RPC: uploading {} ({} bytes)", path.display(), size);

        let body = reqwest::Body::wrap_stream(file_chunks(file, self.upload_chunk, on_progress));
        let fail = |e: reqwest::Error| RpcError::transport(TransportKind::Network, UPLOAD_METHOD, e);
        let res = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(body)
            .send()
            .await
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?;
        let reply = res.text().await.map_err(fail)?;
        info!("HTTP RPC: upload accepted: {}", reply);
        Ok(reply)
    }
}

/// Read `file` in `chunk`-sized pieces, reporting the running total.
pub(crate) fn file_chunks<F>(
    file: tokio::fs::File,
    chunk: usize,
    on_progress: F,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static
where
    F: FnMut(u64) + Send + 'static,
{
    futures_lite::stream::unfold(Some((file, 0u64, on_progress)), move |state| async move {
        let (mut file, sent, mut on_progress) = state?;
        let mut buf = vec![0u8; chunk];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                let sent = sent + n as u64;
                on_progress(sent);
                Some((Ok(buf), Some((file, sent, on_progress))))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}

#[async_trait]
impl<R: ServiceResolver> Transport for HttpTransport<R> {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    async fn discover(&self, opts: &DiscoveryOptions) -> bool {
        if let Some(address) = &opts.address {
            let Some(base) = parse_base(address) else {
                warn!("HTTP RPC: invalid address {:?}", address);
                return false;
            };
            info!("HTTP RPC: using explicit address {}", base);
            *self.base.write() = Some(base);
            return self.is_alive().await;
        }

        if !opts.use_mdns {
            return false;
        }

        match self.resolver.resolve(&self.service, self.resolve_timeout).await {
            Ok(Some(addr)) => match parse_base(&addr.to_string()) {
                Some(base) => {
                    info!("HTTP RPC: [mDNS] peer is at {}", base);
                    *self.base.write() = Some(base);
                    true
                }
                None => {
                    warn!("HTTP RPC: [mDNS] unusable address {}", addr);
                    false
                }
            },
            Ok(None) => {
                warn!("HTTP RPC: [mDNS] did not find {}", self.service.fullname());
                false
            }
            Err(e) => {
                warn!("HTTP RPC: [mDNS] resolution failed: {}", e);
                false
            }
        }
    }

    async fn call(&self, call: &Call) -> Result<Response> {
        let method = call.qualified();
        let url = self.route(RPC_ROUTE).ok_or(RpcError::NotConnected {
            transport: TransportKind::Network,
        })?;

        let body = codec::encode_request(call, self.next_id())
            .map_err(|e| RpcError::protocol(TransportKind::Network, &method, e))?;
        debug!("HTTP RPC: -> {}", String::from_utf8_lossy(&body));

        let res = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RpcError::transport(TransportKind::Network, &method, e))?;

        let status = res.status();
        if !status.is_success() {
            return Err(RpcError::transport(
                TransportKind::Network,
                &method,
                format!("HTTP status {status}"),
            ));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| RpcError::transport(TransportKind::Network, &method, e))?;
        codec::decode_response(&bytes)
            .map_err(|e| RpcError::protocol(TransportKind::Network, &method, e))
    }

    async fn is_alive(&self) -> bool {
        let Some(url) = self.route(CHECK_ROUTE) else {
            return false;
        };
        match self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(_) => true,
            Err(e) => {
                debug!("HTTP RPC: liveness check failed: {}", e);
                false
            }
        }
    }
}
