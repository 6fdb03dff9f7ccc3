//! Unified error type for the RPC client.
//!
//! Every fallible operation in the library funnels into [`RpcError`], so the
//! selector can decide uniformly which failures trigger fallback. Variants
//! carry the transport and the `namespace:method` they were raised for, which
//! is enough to diagnose a failed call from the log line alone.

use core::fmt;

// ---------------------------------------------------------------------------
// Transport tag
// ---------------------------------------------------------------------------

/// Which transport an error (or a call) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// HTTP over the local network.
    Network,
    /// BLE GATT link.
    Wireless,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "HTTP"),
            Self::Wireless => write!(f, "BLE"),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RpcError {
    /// No peer was found by the transport's discovery mechanism.
    DiscoveryFailed { transport: TransportKind },
    /// A call was attempted before a successful discovery.
    NotConnected { transport: TransportKind },
    /// The peer answered with bytes that are not a valid response.
    ProtocolViolation {
        transport: TransportKind,
        method: String,
        detail: String,
    },
    /// I/O or connection-level failure (includes non-2xx HTTP status).
    TransportFailure {
        transport: TransportKind,
        method: String,
        detail: String,
    },
    /// Well-formed response whose `error` field was set by the peer.
    PeerReported { method: String, message: String },
    /// The selector gave up waiting for the transport.
    Timeout {
        transport: TransportKind,
        method: String,
    },
    /// All 255 request ids are in flight.
    IdsExhausted,
    /// Local file access failed (firmware upload source).
    Io(std::io::Error),
}

impl RpcError {
    pub(crate) fn transport(
        transport: TransportKind,
        method: impl Into<String>,
        detail: impl fmt::Display,
    ) -> Self {
        Self::TransportFailure {
            transport,
            method: method.into(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn protocol(
        transport: TransportKind,
        method: impl Into<String>,
        detail: impl fmt::Display,
    ) -> Self {
        Self::ProtocolViolation {
            transport,
            method: method.into(),
            detail: detail.to_string(),
        }
    }

    /// The transport the error was raised on, if it is tied to one.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            Self::DiscoveryFailed { transport }
            | Self::NotConnected { transport }
            | Self::ProtocolViolation { transport, .. }
            | Self::TransportFailure { transport, .. }
            | Self::Timeout { transport, .. } => Some(*transport),
            Self::PeerReported { .. } | Self::IdsExhausted | Self::Io(_) => None,
        }
    }

    /// True for errors produced by the peer itself rather than the path to it.
    pub fn is_peer_reported(&self) -> bool {
        matches!(self, Self::PeerReported { .. })
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DiscoveryFailed { transport } => write!(f, "{transport}: no peer found"),
            Self::NotConnected { transport } => {
                write!(f, "{transport}: not connected (run discovery first)")
            }
            Self::ProtocolViolation {
                transport,
                method,
                detail,
            } => write!(f, "{transport} {method}: malformed response: {detail}"),
            Self::TransportFailure {
                transport,
                method,
                detail,
            } => write!(f, "{transport} {method}: transport failure: {detail}"),
            Self::PeerReported { method, message } => {
                write!(f, "{method}: peer reported error: {message}")
            }
            Self::Timeout { transport, method } => write!(f, "{transport} {method}: timed out"),
            Self::IdsExhausted => write!(f, "BLE: all request ids are in flight"),
            Self::Io(e) => write!(f, "I/O: {e}"),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, RpcError>;
