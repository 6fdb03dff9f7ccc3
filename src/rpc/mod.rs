//! Transport-agnostic RPC core.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      RPC Stack                             │
//! │                                                            │
//! │  ┌────────────┐   ┌──────────┐   ┌──────────────────────┐ │
//! │  │   Client   │──▶│ Transport│──▶│ Codec (JSON envelope) │ │
//! │  │ (selector) │   │  (trait) │   └──────────────────────┘ │
//! │  └────────────┘   └──────────┘                            │
//! │        │             ▲     ▲                               │
//! │        │        HTTP │     │ BLE ──▶ PendingTable          │
//! │        ▼             │     │         (id → oneshot)        │
//! │   network first ─────┘     └───── wireless fallback        │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod pending;
pub mod transport;
