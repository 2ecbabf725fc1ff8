//! Transport layer for XBee communication.
//!
//! A transport moves raw bytes to and from the module. Framing is done by
//! the caller: `send` takes an already encoded API frame, and the read
//! half handed out by `take_reader` yields the raw byte stream that
//! [`run_read_loop`] turns into frames.

#[cfg(test)]
pub(crate) mod mock;
pub mod serial;

use std::io;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::FrameDecoder;

/// Read half of a connected transport.
pub type Reader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Opens the link.
    fn connect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Closes the link.
    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>>;

    /// Writes one encoded frame.
    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// Takes the read half for the background read task.
    ///
    /// Returns `None` when not connected or when already taken.
    fn take_reader(&mut self) -> Option<Reader>;
}

/// Reads from `reader`, decodes frames and forwards them to `frame_tx`.
///
/// Decode errors are logged and skipped. Returns `Ok` when the receiver
/// goes away and an error when the stream ends or fails.
pub async fn run_read_loop<R>(
    mut reader: R,
    mut decoder: FrameDecoder,
    frame_tx: mpsc::Sender<Bytes>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("transport closed");
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "transport closed",
                )));
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("read error: {}", e);
                return Err(Error::Io(e));
            }
        };

        tracing::trace!("received {} bytes: {}", n, hex::encode(&buf[..n]));
        decoder.feed(&buf[..n]);

        loop {
            match decoder.decode() {
                Ok(Some(frame)) => {
                    tracing::trace!("decoded frame: {} bytes", frame.len());
                    if frame_tx.send(frame).await.is_err() {
                        tracing::debug!("frame receiver dropped");
                        return Ok(());
                    }
                }
                Ok(None) => break,
                Err(e) => tracing::warn!("frame decode error: {}", e),
            }
        }
    }
}

pub use serial::{SerialConfig, SerialTransport, list_ports};
