//! Pending-request table: correlates BLE notifications with waiting calls.
//!
//! ```text
//!  call()                     notification pump
//!    │ register() ──▶ ┌──────────────────────┐
//!    │                │ id → oneshot::Sender │ ◀── resolve(response)
//!    │ wait ◀──────── └──────────────────────┘
//!    │ drop(PendingCall) ──▶ remove(id)
//! ```
//!
//! A slot stays reserved from `register()` until its [`PendingCall`] is
//! dropped, even after it has been resolved. The id therefore cannot be
//! handed to another call while the first caller still owns it, and a
//! second notification for the same id is reported as an orphan.

use std::collections::HashMap;

use log::warn;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::codec::Response;
use crate::error::{Result, RpcError};

/// Ids are allocated in `[0, ID_SPACE)`.
pub const ID_SPACE: u16 = 255;

/// Outcome of handing a response to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A waiting call received the response.
    Delivered,
    /// No call is waiting for this id (never issued, timed out, or already
    /// resolved).
    Orphaned,
}

struct Inner {
    slots: HashMap<u8, Option<oneshot::Sender<Response>>>,
    next_id: u16,
}

pub struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Reserve a fresh id and its response slot.
    ///
    /// Skips ids still in flight, wrapping at [`ID_SPACE`]. Fails with
    /// [`RpcError::IdsExhausted`] when every id is taken.
    pub fn register(&self) -> Result<PendingCall<'_>> {
        let mut inner = self.inner.lock();
        if inner.slots.len() >= usize::from(ID_SPACE) {
            return Err(RpcError::IdsExhausted);
        }

        let id = loop {
            if inner.next_id >= ID_SPACE {
                inner.next_id = 0;
            }
            let candidate = inner.next_id as u8;
            inner.next_id += 1;
            if !inner.slots.contains_key(&candidate) {
                break candidate;
            }
        };

        let (tx, rx) = oneshot::channel();
        inner.slots.insert(id, Some(tx));
        Ok(PendingCall {
            table: self,
            id,
            rx,
        })
    }

    /// Deliver `response` to the call waiting on `response.res_id`.
    pub fn resolve(&self, response: Response) -> Resolution {
        let sender = {
            let mut inner = self.inner.lock();
            inner
                .slots
                .get_mut(&response.res_id)
                .and_then(Option::take)
        };

        let Some(sender) = sender else {
            warn!("BLE RPC: orphaned response {:?}", response);
            return Resolution::Orphaned;
        };

        // The receiver may have been dropped between the lookup and here.
        match sender.send(response) {
            Ok(()) => Resolution::Delivered,
            Err(response) => {
                warn!("BLE RPC: orphaned response {:?} (caller gone)", response);
                Resolution::Orphaned
            }
        }
    }

    fn remove(&self, id: u8) {
        self.inner.lock().slots.remove(&id);
    }

    /// Close every slot; waiting calls observe a closed channel.
    ///
    /// Ids stay reserved until their owners drop them.
    pub fn close_all(&self) {
        for slot in self.inner.lock().slots.values_mut() {
            slot.take();
        }
    }

    /// Number of ids currently reserved.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: u8) -> bool {
        self.inner.lock().slots.contains_key(&id)
    }
}

impl Default for PendingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight call. Dropping it releases the id, whatever the outcome.
pub struct PendingCall<'a> {
    table: &'a PendingTable,
    id: u8,
    rx: oneshot::Receiver<Response>,
}

impl PendingCall<'_> {
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Wait for the matching response.
    ///
    /// Returns `None` if the slot was closed (link torn down) before a
    /// response arrived.
    pub async fn response(mut self) -> Option<Response> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
    }
}
