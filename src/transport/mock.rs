//! In-memory transport for tests.

use std::io;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{ApiMode, encode_frame};
use crate::transport::{Reader, Transport};

/// Host side of a simulated link.
pub(crate) struct MockTransport {
    connected: bool,
    fail_connect: bool,
    disconnects: usize,
    host: Option<DuplexStream>,
    reader: Option<DuplexStream>,
    sent: mpsc::UnboundedSender<Bytes>,
}

/// Module side of a simulated link.
pub(crate) struct MockRadio {
    /// Bytes written here arrive at the host's reader.
    pub(crate) device: DuplexStream,
    /// Encoded frames the host sent.
    pub(crate) sent: mpsc::UnboundedReceiver<Bytes>,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, MockRadio) {
        let (host, device) = tokio::io::duplex(4096);
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            Self {
                connected: false,
                fail_connect: false,
                disconnects: 0,
                host: Some(host),
                reader: None,
                sent: sent_tx,
            },
            MockRadio {
                device,
                sent: sent_rx,
            },
        )
    }

    /// A transport whose `connect` always fails.
    pub(crate) fn failing() -> (Self, MockRadio) {
        let (mut transport, radio) = Self::new();
        transport.fail_connect = true;
        (transport, radio)
    }

    /// Number of `disconnect` calls so far.
    pub(crate) const fn disconnects(&self) -> usize {
        self.disconnects
    }
}

impl MockRadio {
    /// Sends frame data to the host as an escaped API frame.
    pub(crate) async fn inject(&mut self, frame: &[u8]) {
        let encoded = encode_frame(frame, ApiMode::Escaped).unwrap();
        self.device.write_all(&encoded).await.unwrap();
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_connect {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    "no such device",
                )));
            }
            if let Some(host) = self.host.take() {
                self.reader = Some(host);
            }
            self.connected = true;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.disconnects += 1;
            self.connected = false;
            self.reader = None;
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.sent.send(data).map_err(|_| Error::ChannelClosed)
        })
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn take_reader(&mut self) -> Option<Reader> {
        self.reader.take().map(|r| Box::new(r) as Reader)
    }
}
