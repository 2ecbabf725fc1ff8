//! Connections: typed, addressed channels over one radio link.
//!
//! A connection is opened for one connection type of the active mode and
//! one remote address. Transmissions are built by the type's transmit
//! builder and, when the type asks for it, wait for the status frame that
//! echoes their frame ID. Received frames are routed to the connection
//! whose type and address match.

pub mod frame_id;
mod table;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use crate::error::{Error, Result};
use crate::mode::{ConType, Mode, TxRequest};
use crate::protocol::encode_frame;
use crate::transport::Transport;
use crate::types::{ConAddress, Packet};

pub(crate) use frame_id::FrameIdTable;
pub use table::Routed;
pub(crate) use table::ConnectionTable;

/// Default time to wait for a transmit status.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of packets queued per connection.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Per-connection options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ConSettings {
    /// Transmit without MAC acknowledgement.
    pub disable_ack: bool,
    /// Transmit to the broadcast PAN ID.
    pub broadcast_pan: bool,
    /// Queue remote AT changes until `AC`/`WR` instead of applying them.
    pub queue_changes: bool,
    /// Receive packets from any address.
    pub catch_all: bool,
    /// Return from `tx` without waiting for the transmit status.
    pub no_wait_for_ack: bool,
}

impl ConSettings {
    /// Sets `disable_ack`.
    #[must_use]
    pub const fn disable_ack(mut self, value: bool) -> Self {
        self.disable_ack = value;
        self
    }

    /// Sets `broadcast_pan`.
    #[must_use]
    pub const fn broadcast_pan(mut self, value: bool) -> Self {
        self.broadcast_pan = value;
        self
    }

    /// Sets `queue_changes`.
    #[must_use]
    pub const fn queue_changes(mut self, value: bool) -> Self {
        self.queue_changes = value;
        self
    }

    /// Sets `catch_all`.
    #[must_use]
    pub const fn catch_all(mut self, value: bool) -> Self {
        self.catch_all = value;
        self
    }

    /// Sets `no_wait_for_ack`.
    #[must_use]
    pub const fn no_wait_for_ack(mut self, value: bool) -> Self {
        self.no_wait_for_ack = value;
        self
    }
}

/// Identifies an open connection. IDs increase in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}

/// State shared by the client, its connections and the routing task.
pub(crate) struct Link<T> {
    pub(crate) mode: &'static Mode,
    pub(crate) transport: Arc<Mutex<T>>,
    table: ConnectionTable,
    frame_ids: FrameIdTable,
    timeout_ms: AtomicU64,
    queue_depth: usize,
}

impl<T: Transport> Link<T> {
    pub(crate) fn new(mode: &'static Mode, transport: T) -> Self {
        Self {
            mode,
            transport: Arc::new(Mutex::new(transport)),
            table: ConnectionTable::new(),
            frame_ids: FrameIdTable::new(),
            timeout_ms: AtomicU64::new(timeout_ms(DEFAULT_TIMEOUT)),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    pub(crate) fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms.store(timeout_ms(timeout), Ordering::Relaxed);
    }

    /// Opens a connection of the named type.
    pub(crate) async fn open(
        self: &Arc<Self>,
        name: &str,
        address: ConAddress,
        settings: ConSettings,
    ) -> Result<Connection<T>> {
        let con_type = self
            .mode
            .con_type(name)
            .ok_or_else(|| Error::UnknownConType {
                name: name.to_string(),
            })?;

        // A catch-all listener may leave the address out
        if !(settings.catch_all && address.is_empty()) {
            con_type.address_rule.check(con_type.name, &address)?;
        }

        let (id, receiver) = self
            .table
            .register(con_type, address, settings, self.queue_depth)
            .await;

        Ok(Connection {
            id,
            con_type,
            address,
            settings,
            link: Arc::clone(self),
            receiver: Mutex::new(receiver),
        })
    }

    /// Encodes and writes one frame.
    pub(crate) async fn send(&self, frame: &[u8]) -> Result<()> {
        let encoded = encode_frame(frame, self.mode.api_mode)?;
        tracing::trace!("sending frame: {}", hex::encode(&encoded));

        let mut transport = self.transport.lock().await;
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }
        transport.send(encoded).await
    }

    /// Closes every open connection.
    pub(crate) async fn close_all(&self) {
        self.table.clear().await;
    }

    /// Routes one decoded frame.
    pub(crate) async fn route(&self, frame: &[u8]) -> Result<Routed> {
        self.table.route(self.mode, &self.frame_ids, frame).await
    }
}

/// An open connection.
///
/// Dropping the handle closes its queue; the router forgets it the next
/// time a packet is routed. Use [`Connection::end`] to remove it at once.
pub struct Connection<T> {
    id: ConnectionId,
    con_type: &'static ConType,
    address: ConAddress,
    settings: ConSettings,
    link: Arc<Link<T>>,
    receiver: Mutex<mpsc::Receiver<Packet>>,
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("con_type", &self.con_type.name)
            .field("address", &self.address)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// Returns the connection ID.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the connection type.
    #[must_use]
    pub const fn con_type(&self) -> &'static ConType {
        self.con_type
    }

    /// Returns the remote address.
    #[must_use]
    pub const fn address(&self) -> &ConAddress {
        &self.address
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn settings(&self) -> &ConSettings {
        &self.settings
    }

    /// Replaces the connection settings.
    pub async fn set_settings(&mut self, settings: ConSettings) {
        self.settings = settings;
        self.link.table.update_settings(self.id, settings).await;
    }

    /// Transmits `data` to the remote end.
    ///
    /// For AT connection types `data` is the two-character command
    /// followed by its parameter. When the connection type waits for a
    /// status, this returns once the module reports it.
    ///
    /// # Errors
    ///
    /// - `NotSupported` if the connection type cannot transmit
    /// - `NoFreeFrameId` if every frame ID is awaiting a status
    /// - `Timeout` if no status arrives in time
    /// - `TxFailed` if the module reports a non-zero status
    pub async fn tx(&self, data: &[u8]) -> Result<()> {
        self.tx_with_id(data).await.map(|_| ())
    }

    /// Like [`Connection::tx`], returning the frame ID the request used.
    pub(crate) async fn tx_with_id(&self, data: &[u8]) -> Result<Option<u8>> {
        if self.con_type.tx.is_none() {
            return Err(Error::NotSupported {
                con_type: self.con_type.name,
                operation: "tx",
            });
        }

        let lease = if self.con_type.allow_frame_id {
            Some(self.link.frame_ids.allocate(self.id)?)
        } else {
            None
        };

        let request = TxRequest {
            frame_id: lease.as_ref().map_or(0, frame_id::FrameIdLease::id),
            address: &self.address,
            settings: &self.settings,
            data,
        };
        let frame = self.con_type.build(&request)?;
        self.link.send(&frame).await?;

        let Some(lease) = lease else {
            return Ok(None);
        };
        let frame_id = lease.id();
        if !self.con_type.use_timeout || self.settings.no_wait_for_ack {
            return Ok(Some(frame_id));
        }

        let timeout = self.link.timeout();
        let status = tokio::time::timeout(timeout, lease.wait())
            .await
            .map_err(|_| {
                tracing::debug!("no status for frame ID {} within {:?}", frame_id, timeout);
                Error::Timeout {
                    timeout_ms: timeout_ms(timeout),
                }
            })??;

        if status != 0 {
            return Err(Error::TxFailed {
                con_type: self.con_type.name,
                status,
            });
        }
        Ok(Some(frame_id))
    }

    /// Waits for the next packet.
    ///
    /// # Errors
    ///
    /// Returns `ChannelClosed` if the connection was removed.
    pub async fn rx(&self) -> Result<Packet> {
        self.receiver
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::ChannelClosed)
    }

    /// Waits at most `timeout` for the next packet.
    pub async fn rx_timeout(&self, timeout: Duration) -> Result<Packet> {
        tokio::time::timeout(timeout, self.rx())
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: timeout_ms(timeout),
            })?
    }

    /// Returns a queued packet without waiting.
    #[must_use]
    pub fn try_rx(&self) -> Option<Packet> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Closes the connection.
    ///
    /// Shutting the client down closes every connection the same way.
    pub async fn end(self) {
        self.link.table.remove(self.id).await;
    }
}
