//! Open connections and frame routing.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};

use crate::connection::frame_id::FrameIdTable;
use crate::connection::{ConSettings, ConnectionId};
use crate::error::{Error, FrameError, Result};
use crate::mode::{ConType, Mode};
use crate::types::{ConAddress, Packet};

struct Entry {
    con_type: &'static ConType,
    address: ConAddress,
    settings: ConSettings,
    sender: mpsc::Sender<Packet>,
}

impl Entry {
    fn accepts(&self, con_types: &[&'static ConType], address: &ConAddress) -> bool {
        self.handles(con_types) && (self.settings.catch_all || self.address.matches(address))
    }

    fn handles(&self, con_types: &[&'static ConType]) -> bool {
        con_types.iter().any(|ct| ct.name == self.con_type.name)
    }
}

/// What happened to a routed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// The packet was queued on a connection.
    Delivered(ConnectionId),
    /// The frame only carried status; there was nothing to deliver.
    Consumed,
    /// The matching connection's queue was full.
    Dropped(ConnectionId),
    /// No open connection matched.
    Unrouted {
        con_type: &'static str,
        packet: Packet,
    },
}

/// The set of open connections, in creation order.
#[derive(Default)]
pub(crate) struct ConnectionTable {
    entries: RwLock<BTreeMap<ConnectionId, Entry>>,
    next_id: AtomicU64,
}

impl ConnectionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and returns its ID and inbound queue.
    pub(crate) async fn register(
        &self,
        con_type: &'static ConType,
        address: ConAddress,
        settings: ConSettings,
        queue_depth: usize,
    ) -> (ConnectionId, mpsc::Receiver<Packet>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));

        self.entries.write().await.insert(
            id,
            Entry {
                con_type,
                address,
                settings,
                sender,
            },
        );
        tracing::debug!("opened {} connection {} to {}", con_type.name, id, address);

        (id, receiver)
    }

    /// Removes a connection.
    pub(crate) async fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.entries.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!("ended connection {}", id);
        }
        removed
    }

    /// Removes every connection; their receivers then report closed.
    pub(crate) async fn clear(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            tracing::debug!("closing {} connections", entries.len());
        }
        entries.clear();
    }

    /// Replaces a connection's settings.
    pub(crate) async fn update_settings(&self, id: ConnectionId, settings: ConSettings) {
        if let Some(entry) = self.entries.write().await.get_mut(&id) {
            entry.settings = settings;
        }
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Parses one frame and hands the result to the right connection.
    ///
    /// Status carried by the frame completes the pending frame ID first.
    /// The packet then goes to the connection that owns that frame ID, or
    /// else to the first connection of a matching type whose address
    /// matches (or that catches all).
    pub(crate) async fn route(
        &self,
        mode: &Mode,
        frame_ids: &FrameIdTable,
        frame: &[u8],
    ) -> Result<Routed> {
        let identifier = *frame.first().ok_or(Error::Frame(FrameError::Empty))?;
        let con_types = mode.rx_con_types(identifier);
        let Some(parser) = con_types.first() else {
            return Err(Error::UnknownIdentifier(identifier));
        };

        tracing::trace!("routing {} frame, {} bytes", parser.name, frame.len());

        let outcome = parser.parse(frame)?;
        let owner = outcome
            .frame_info
            .and_then(|info| frame_ids.complete(info.id, info.ret_val));

        let Some(packet) = outcome.packet else {
            return Ok(Routed::Consumed);
        };

        Ok(self
            .deliver(owner, &con_types, &outcome.address, packet)
            .await)
    }

    async fn deliver(
        &self,
        owner: Option<ConnectionId>,
        con_types: &[&'static ConType],
        address: &ConAddress,
        packet: Packet,
    ) -> Routed {
        let mut entries = self.entries.write().await;

        // Handles that were dropped without `end()`
        entries.retain(|id, entry| {
            let open = !entry.sender.is_closed();
            if !open {
                tracing::debug!("pruned closed connection {}", id);
            }
            open
        });

        let target = owner
            .filter(|id| entries.get(id).is_some_and(|e| e.handles(con_types)))
            .or_else(|| {
                entries
                    .iter()
                    .find(|(_, entry)| entry.accepts(con_types, address))
                    .map(|(id, _)| *id)
            });

        let fallback = con_types.first().map_or("unknown", |ct| ct.name);
        let Some((id, entry)) = target.and_then(|id| entries.get(&id).map(|e| (id, e))) else {
            return Routed::Unrouted {
                con_type: fallback,
                packet,
            };
        };

        match entry.sender.try_send(packet) {
            Ok(()) => Routed::Delivered(id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("connection {} queue full, dropping packet", id);
                Routed::Dropped(id)
            }
            Err(mpsc::error::TrySendError::Closed(packet)) => Routed::Unrouted {
                con_type: entry.con_type.name,
                packet,
            },
        }
    }
}
