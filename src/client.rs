//! Main [`XBee`] client implementation.
//!
//! The client owns the link to one module. It runs the mode's bring-up and
//! teardown, reads and routes frames in background tasks, and opens
//! connections of the mode's connection types.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::commands::CommandHandler;
use crate::connection::{ConSettings, Connection, Link, Routed};
use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, EventFilter, Subscription};
use crate::mode::{self, ConType, Mode, xbee1};
use crate::protocol::FrameDecoder;
use crate::transport::{SerialConfig, SerialTransport, Transport, run_read_loop};
use crate::types::ConAddress;

/// Number of decoded frames buffered between the read and routing tasks.
const FRAME_QUEUE_DEPTH: usize = 256;

/// Client for one XBee module.
pub struct XBee<T> {
    link: Arc<Link<T>>,
    dispatcher: EventDispatcher,

    // Background tasks
    read_task: Option<JoinHandle<()>>,
    process_task: Option<JoinHandle<()>>,
}

impl XBee<SerialTransport> {
    /// Creates a Series 1 client for a serial device (not yet connected).
    #[must_use]
    pub fn serial(device: impl Into<String>, baud_rate: u32) -> Self {
        Self::with_serial_config(SerialConfig::new(device).baud_rate(baud_rate))
    }

    /// Creates a Series 1 client with custom serial configuration.
    #[must_use]
    pub fn with_serial_config(config: SerialConfig) -> Self {
        Self::new(&xbee1::MODE, SerialTransport::new(config))
    }

    /// Looks up a mode by name, then creates and connects a client.
    ///
    /// # Errors
    ///
    /// - `UnknownMode` if no mode has this name
    /// - `InvalidParam`/`InvalidConfig` for a bad device path or baud rate
    /// - any error from opening the port
    pub async fn setup(mode_name: &str, config: SerialConfig) -> Result<Self> {
        let mode = mode::find(mode_name).ok_or_else(|| Error::UnknownMode {
            name: mode_name.to_string(),
        })?;
        config.validate()?;

        let mut xbee = Self::new(mode, SerialTransport::new(config));
        xbee.connect().await?;
        Ok(xbee)
    }
}

impl<T: Transport + 'static> XBee<T> {
    /// Creates a client for `mode` over the given transport.
    #[must_use]
    pub fn new(mode: &'static Mode, transport: T) -> Self {
        Self {
            link: Arc::new(Link::new(mode, transport)),
            dispatcher: EventDispatcher::default(),
            read_task: None,
            process_task: None,
        }
    }

    /// Initialises the link and starts the background tasks.
    ///
    /// # Errors
    ///
    /// Returns the mode's init error. Anything opened before the failure
    /// is shut down again.
    pub async fn connect(&mut self) -> Result<()> {
        if self.process_task.is_some() {
            return Ok(());
        }

        let reader = {
            let mut transport = self.link.transport.lock().await;
            (self.link.mode.init)(&mut *transport).await?;

            let reader = transport.take_reader();
            if reader.is_none() {
                tracing::warn!("transport connected without a reader");
                let _ = (self.link.mode.shutdown)(&mut *transport).await;
            }
            reader.ok_or(Error::NotConnected)?
        };

        let (frame_tx, mut frame_rx) = mpsc::channel::<Bytes>(FRAME_QUEUE_DEPTH);

        let decoder = FrameDecoder::new(self.link.mode.api_mode);
        self.read_task = Some(tokio::spawn(async move {
            if let Err(e) = run_read_loop(reader, decoder, frame_tx).await {
                tracing::error!("read loop error: {}", e);
            }
        }));

        let link = Arc::clone(&self.link);
        let dispatcher = self.dispatcher.clone();
        self.process_task = Some(tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                process_frame(&link, &dispatcher, &frame).await;
            }
        }));

        tracing::info!("{} link up", self.link.mode.name);
        self.dispatcher.dispatch(Event::Connected);
        Ok(())
    }

    /// Stops the background tasks and shuts the link down.
    ///
    /// Open connections are closed: a pending `rx` returns `ChannelClosed`.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` if the link was never initialised.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop_tasks();
        self.link.close_all().await;

        {
            let mut transport = self.link.transport.lock().await;
            (self.link.mode.shutdown)(&mut *transport).await?;
        }

        tracing::info!("{} link down", self.link.mode.name);
        self.dispatcher.dispatch(Event::Disconnected);
        Ok(())
    }

    /// Returns true if the link is up.
    pub async fn is_connected(&self) -> bool {
        self.link.transport.lock().await.is_connected()
    }

    /// Returns the active mode.
    #[must_use]
    pub fn mode(&self) -> &'static Mode {
        self.link.mode
    }

    /// Returns the mode's connection types.
    #[must_use]
    pub fn con_types(&self) -> &'static [&'static ConType] {
        self.link.mode.con_types
    }

    /// Opens a connection with default settings.
    ///
    /// # Errors
    ///
    /// - `UnknownConType` if the mode has no such connection type
    /// - `InvalidAddress` if the address does not suit the type
    pub async fn con_new(
        &self,
        con_type: &str,
        address: impl Into<ConAddress>,
    ) -> Result<Connection<T>> {
        self.con_new_with_settings(con_type, address, ConSettings::default())
            .await
    }

    /// Opens a connection with the given settings.
    pub async fn con_new_with_settings(
        &self,
        con_type: &str,
        address: impl Into<ConAddress>,
        settings: ConSettings,
    ) -> Result<Connection<T>> {
        self.link.open(con_type, address.into(), settings).await
    }

    /// Opens a Local AT connection wrapped in a command handler.
    pub async fn commands(&self) -> Result<CommandHandler<T>> {
        let connection = self.con_new("Local AT", ConAddress::none()).await?;
        let mut handler = CommandHandler::new(connection);
        handler.set_timeout(self.link.timeout());
        Ok(handler)
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe(None)
    }

    /// Subscribes to events matching `filter`.
    #[must_use]
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        self.dispatcher.subscribe(Some(filter))
    }

    /// Waits for an event matching `filter`.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Sets how long transmissions wait for their status.
    pub fn set_timeout(&self, timeout: Duration) {
        self.link.set_timeout(timeout);
    }

    /// Returns how long transmissions wait for their status.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.link.timeout()
    }
}

/// Routes one decoded frame and reports what could not be delivered.
async fn process_frame<T: Transport>(link: &Link<T>, dispatcher: &EventDispatcher, frame: &[u8]) {
    match link.route(frame).await {
        Ok(Routed::Delivered(id)) => tracing::trace!("delivered to connection {}", id),
        Ok(Routed::Consumed | Routed::Dropped(_)) => {}
        Ok(Routed::Unrouted { con_type, packet }) => {
            tracing::debug!("unrouted {} packet from {}", con_type, packet.address);
            dispatcher.dispatch(Event::Unrouted { con_type, packet });
        }
        Err(Error::UnknownIdentifier(identifier)) => {
            tracing::debug!("no connection type for identifier 0x{identifier:02x}");
            dispatcher.dispatch(Event::UnknownFrame {
                identifier,
                data: Bytes::copy_from_slice(frame),
            });
        }
        Err(e) => tracing::warn!("dropping frame: {}", e),
    }
}

impl<T> XBee<T> {
    fn stop_tasks(&mut self) {
        if let Some(task) = self.read_task.take() {
            task.abort();
        }
        if let Some(task) = self.process_task.take() {
            task.abort();
        }
    }
}

impl<T> Drop for XBee<T> {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::protocol::{ApiMode, FrameDecoder};
    use crate::transport::mock::{MockRadio, MockTransport};
    use crate::types::{Addr16, Addr64};

    /// Set `RUST_LOG=xbee=trace` to see frame traffic.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    async fn connected() -> (XBee<MockTransport>, MockRadio) {
        init_tracing();
        let (transport, radio) = MockTransport::new();
        let mut xbee = XBee::new(&xbee1::MODE, transport);
        xbee.connect().await.unwrap();
        (xbee, radio)
    }

    async fn next_sent(radio: &mut MockRadio) -> Vec<u8> {
        let bytes = radio.sent.recv().await.unwrap();
        let mut decoder = FrameDecoder::new(ApiMode::Escaped);
        decoder.feed(&bytes);
        decoder.decode().unwrap().unwrap().to_vec()
    }

    #[tokio::test]
    async fn test_connect_emits_event() {
        let (transport, _radio) = MockTransport::new();
        let mut xbee = XBee::new(&xbee1::MODE, transport);
        let mut events = xbee.subscribe();

        xbee.connect().await.unwrap();
        assert!(xbee.is_connected().await);
        assert_eq!(events.recv().await, Some(Event::Connected));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let (transport, _radio) = MockTransport::failing();
        let mut xbee = XBee::new(&xbee1::MODE, transport);
        assert!(matches!(xbee.connect().await, Err(Error::Io(_))));
        assert!(!xbee.is_connected().await);
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (mut xbee, _radio) = connected().await;
        let mut events = xbee.subscribe();

        xbee.shutdown().await.unwrap();
        assert!(!xbee.is_connected().await);
        assert_eq!(events.recv().await, Some(Event::Disconnected));

        assert!(matches!(xbee.shutdown().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let (mut xbee, _radio) = connected().await;
        let peer = xbee.con_new("16-bit Data", Addr16(2)).await.unwrap();
        let waiting = tokio::spawn(async move { peer.rx().await });
        tokio::task::yield_now().await;

        xbee.shutdown().await.unwrap();
        assert!(matches!(waiting.await.unwrap(), Err(Error::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_shutdown_when_never_connected() {
        let (transport, _radio) = MockTransport::new();
        let mut xbee = XBee::new(&xbee1::MODE, transport);
        assert!(matches!(xbee.shutdown().await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_setup_unknown_mode() {
        let result = XBee::setup("xbee9", SerialConfig::new("/dev/ttyUSB0")).await;
        assert!(matches!(result, Err(Error::UnknownMode { name }) if name == "xbee9"));
    }

    #[tokio::test]
    async fn test_setup_bad_config() {
        let result = XBee::setup("xbee1", SerialConfig::new("")).await;
        assert!(matches!(result, Err(Error::InvalidParam { .. })));

        let result = XBee::setup("xbee1", SerialConfig::new("/dev/ttyUSB0").baud_rate(1234)).await;
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_mode_accessors() {
        let xbee = XBee::serial("/dev/ttyUSB0", 9600);
        assert_eq!(xbee.mode().name, "xbee1");
        assert_eq!(xbee.con_types().len(), 9);
        assert_eq!(xbee.timeout(), crate::connection::DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_con_new_errors() {
        let (xbee, _radio) = connected().await;
        assert!(matches!(
            xbee.con_new("Smoke Signal", ConAddress::none()).await,
            Err(Error::UnknownConType { .. })
        ));
        assert!(matches!(
            xbee.con_new("Local AT", Addr16(1)).await,
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[tokio::test]
    async fn test_receive_routed_packet() {
        let (xbee, mut radio) = connected().await;
        let con = xbee
            .con_new("64-bit Data", Addr64::from_u64(0x0013_a200_4001_0203))
            .await
            .unwrap();

        let mut frame = vec![0x80, 0x00, 0x13, 0xa2, 0x00, 0x40, 0x01, 0x02, 0x03, 0x2a, 0x00];
        // Payload bytes that need escaping on the wire
        frame.extend_from_slice(&[0x7e, 0x7d, 0x11, 0x13]);
        radio.inject(&frame).await;

        let packet = con.rx_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(&packet.data[..], &[0x7e, 0x7d, 0x11, 0x13]);
        assert_eq!(packet.rssi_dbm(), Some(-42));
    }

    #[tokio::test]
    async fn test_receive_io_sample() {
        let (xbee, mut radio) = connected().await;
        let con = xbee.con_new("16-bit I/O", Addr16(0x0005)).await.unwrap();

        // One sample: DIO0 high, ADC0 = 0x0123
        radio
            .inject(&[0x83, 0x00, 0x05, 0x30, 0x00, 0x01, 0x02, 0x01, 0x00, 0x01, 0x01, 0x23])
            .await;

        let packet = con.rx_timeout(Duration::from_secs(1)).await.unwrap();
        let sample = packet.io.as_ref().and_then(|io| io.first()).unwrap();
        assert_eq!(sample.digital(0), Some(true));
        assert_eq!(sample.analog(0), Some(0x0123));
    }

    #[tokio::test]
    async fn test_transmit_and_status() {
        let (xbee, mut radio) = connected().await;
        let con = xbee.con_new("16-bit Data", Addr16(0x0001)).await.unwrap();

        let tx = tokio::spawn(async move { con.tx(b"ping").await });
        let sent = next_sent(&mut radio).await;
        assert_eq!(sent[0], 0x01);
        assert_eq!(&sent[5..], b"ping");

        radio.inject(&[0x89, sent[1], 0x00]).await;
        tx.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transmit_no_ack() {
        let (xbee, mut radio) = connected().await;
        let con = xbee.con_new("16-bit Data", Addr16(0x0001)).await.unwrap();

        let tx = tokio::spawn(async move { con.tx(b"ping").await });
        let sent = next_sent(&mut radio).await;
        radio.inject(&[0x89, sent[1], 0x01]).await;

        assert!(matches!(
            tx.await.unwrap(),
            Err(Error::TxFailed { status: 0x01, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transmit_timeout() {
        let (xbee, _radio) = connected().await;
        xbee.set_timeout(Duration::from_millis(500));
        let con = xbee.con_new("16-bit Data", Addr16(0x0001)).await.unwrap();

        assert!(matches!(
            con.tx(b"ping").await,
            Err(Error::Timeout { timeout_ms: 500 })
        ));
    }

    #[tokio::test]
    async fn test_unrouted_event() {
        let (xbee, mut radio) = connected().await;
        let mut events = xbee.subscribe_filtered(EventFilter::unrouted("16-bit Data"));

        radio.inject(&[0x81, 0x00, 0x09, 0x30, 0x00, b'?']).await;

        let Some(Event::Unrouted { packet, .. }) = events.recv().await else {
            panic!("expected unrouted event");
        };
        assert_eq!(packet.address.addr16, Some(Addr16(9)));
    }

    #[tokio::test]
    async fn test_unknown_frame_event() {
        let (xbee, mut radio) = connected().await;
        let event = {
            let wait = xbee.wait_for(
                EventFilter::kinds(vec![EventKind::UnknownFrame]),
                Duration::from_secs(1),
            );
            let inject = radio.inject(&[0x90, 0x01, 0x02]);
            let (event, ()) = tokio::join!(wait, inject);
            event
        };

        assert_eq!(
            event,
            Some(Event::UnknownFrame {
                identifier: 0x90,
                data: Bytes::from_static(&[0x90, 0x01, 0x02]),
            })
        );
    }

    #[tokio::test]
    async fn test_commands_over_link() {
        let (xbee, mut radio) = connected().await;
        let commands = xbee.commands().await.unwrap();

        let query = tokio::spawn(async move { commands.channel().await });
        let sent = next_sent(&mut radio).await;
        assert_eq!(&sent[..1], &[0x08]);
        assert_eq!(&sent[2..], b"CH");

        radio.inject(&[0x88, sent[1], b'C', b'H', 0x00, 0x0c]).await;
        assert_eq!(query.await.unwrap().unwrap(), 0x0c);
    }

    #[tokio::test]
    async fn test_bad_frame_does_not_stop_routing() {
        let (xbee, mut radio) = connected().await;
        let con = xbee.con_new("Modem Status", ConAddress::none()).await.unwrap();

        // Transmit Status of the wrong length, then a modem status
        radio.inject(&[0x89, 0x01]).await;
        radio.inject(&[0x8a, 0x06]).await;

        let packet = con.rx_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(packet.status, Some(0x06));
    }
}
