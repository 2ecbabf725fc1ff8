//! Frame ID allocation and status waiters.
//!
//! Every transmission that wants a status gets a frame ID in `1..=255`;
//! the module echoes it in the matching status frame. IDs are handed out
//! round-robin so a late status for a released ID is unlikely to hit a
//! fresh transmission.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::connection::ConnectionId;
use crate::error::{Error, Result};

/// Number of usable frame IDs (0 means "no status").
pub const FRAME_ID_COUNT: usize = 255;

struct Pending {
    owner: ConnectionId,
    ticket: u64,
    waiter: Option<oneshot::Sender<u8>>,
}

struct Inner {
    next: u8,
    next_ticket: u64,
    pending: HashMap<u8, Pending>,
}

/// Table of frame IDs awaiting a status.
#[derive(Clone)]
pub(crate) struct FrameIdTable {
    inner: Arc<Mutex<Inner>>,
}

impl Default for FrameIdTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameIdTable {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next: 1,
                next_ticket: 0,
                pending: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserves the next free frame ID for `owner`.
    pub(crate) fn allocate(&self, owner: ConnectionId) -> Result<FrameIdLease> {
        let mut inner = self.lock();

        for _ in 0..FRAME_ID_COUNT {
            let id = inner.next;
            inner.next = if id == u8::MAX { 1 } else { id + 1 };

            if inner.pending.contains_key(&id) {
                continue;
            }

            let ticket = inner.next_ticket;
            inner.next_ticket += 1;
            let (tx, rx) = oneshot::channel();
            inner.pending.insert(
                id,
                Pending {
                    owner,
                    ticket,
                    waiter: Some(tx),
                },
            );
            tracing::trace!("allocated frame ID {} for connection {}", id, owner);

            return Ok(FrameIdLease {
                id,
                ticket,
                table: self.clone(),
                status: Some(rx),
            });
        }

        Err(Error::NoFreeFrameId)
    }

    /// Completes the waiter for `id` and returns the connection that owns it.
    ///
    /// The ID stays reserved until its lease is dropped.
    pub(crate) fn complete(&self, id: u8, ret_val: u8) -> Option<ConnectionId> {
        let mut inner = self.lock();
        let Some(pending) = inner.pending.get_mut(&id) else {
            tracing::debug!("status 0x{ret_val:02x} for unknown frame ID {id}");
            return None;
        };
        if let Some(waiter) = pending.waiter.take() {
            // The waiter may have given up already
            let _ = waiter.send(ret_val);
        }
        Some(pending.owner)
    }

    fn release(&self, id: u8, ticket: u64) {
        let mut inner = self.lock();
        if inner.pending.get(&id).is_some_and(|p| p.ticket == ticket) {
            inner.pending.remove(&id);
        }
    }

    #[cfg(test)]
    pub(crate) fn in_use(&self) -> usize {
        self.lock().pending.len()
    }
}

/// A reserved frame ID. Dropping the lease releases the ID.
pub(crate) struct FrameIdLease {
    id: u8,
    ticket: u64,
    table: FrameIdTable,
    status: Option<oneshot::Receiver<u8>>,
}

impl FrameIdLease {
    /// The reserved frame ID.
    pub(crate) const fn id(&self) -> u8 {
        self.id
    }

    /// Waits for the status reported for this frame ID.
    pub(crate) async fn wait(mut self) -> Result<u8> {
        let status = self.status.take().ok_or(Error::ChannelClosed)?;
        status.await.map_err(|_| Error::ChannelClosed)
    }
}

impl Drop for FrameIdLease {
    fn drop(&mut self) {
        self.table.release(self.id, self.ticket);
    }
}
