//! Serial transport for XBee modules.
//!
//! The link runs 8N1 at one of the baud rates the module supports
//! (`ATBD`). Modules ship at 9600 baud.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};
use crate::transport::{Reader, Transport};

/// Factory default baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default delay after opening the port before the link is used.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(100);

/// Baud rates selectable with `ATBD`.
pub const SUPPORTED_BAUD_RATES: [u32; 8] = [1200, 2400, 4800, 9600, 19200, 38400, 57600, 115_200];

/// Configuration for serial transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Serial device path (e.g., "/dev/ttyUSB0" or "COM3").
    pub device: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening the port.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a configuration with the factory default baud rate.
    #[must_use]
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }

    /// Checks the device path and baud rate.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` if the device path is empty
    /// - `InvalidConfig` if the baud rate is not one the module supports
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(Error::InvalidParam {
                reason: "serial device path is empty".into(),
            });
        }
        if !SUPPORTED_BAUD_RATES.contains(&self.baud_rate) {
            return Err(Error::InvalidConfig {
                reason: format!("unsupported baud rate {}", self.baud_rate),
            });
        }
        Ok(())
    }
}

/// Serial transport.
///
/// The stream is split so the read half can live in a background task
/// while frames are written through the shared write half.
pub struct SerialTransport {
    config: SerialConfig,
    writer: Option<Arc<Mutex<WriteHalf<SerialStream>>>>,
    reader: Option<ReadHalf<SerialStream>>,
}

impl SerialTransport {
    /// Creates a transport with the given configuration.
    #[must_use]
    pub const fn new(config: SerialConfig) -> Self {
        Self {
            config,
            writer: None,
            reader: None,
        }
    }

    /// Creates a transport for `device` at the default baud rate.
    #[must_use]
    pub fn with_device(device: impl Into<String>) -> Self {
        Self::new(SerialConfig::new(device))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SerialConfig {
        &self.config
    }
}

/// Reads and discards whatever the module sent before we were listening.
async fn drain(stream: &mut SerialStream) -> usize {
    let mut buf = [0u8; 256];
    let mut drained = 0;
    while let Ok(Ok(n)) =
        tokio::time::timeout(Duration::from_millis(20), stream.read(&mut buf)).await
    {
        if n == 0 {
            break;
        }
        drained += n;
    }
    drained
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() {
                return Ok(());
            }
            self.config.validate()?;

            tracing::info!(
                "opening {} at {} baud",
                self.config.device,
                self.config.baud_rate
            );

            let mut stream = tokio_serial::new(&self.config.device, self.config.baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()?;

            tokio::time::sleep(self.config.connection_delay).await;

            let drained = drain(&mut stream).await;
            if drained > 0 {
                tracing::debug!("drained {} stale bytes", drained);
            }

            let (reader, writer) = tokio::io::split(stream);
            self.reader = Some(reader);
            self.writer = Some(Arc::new(Mutex::new(writer)));

            tracing::info!("serial link up");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.writer.is_some() || self.reader.is_some() {
                tracing::info!("closing {}", self.config.device);
                self.writer = None;
                self.reader = None;
            }
            Ok(())
        })
    }

    fn send(&mut self, data: Bytes) -> BoxFuture<'_, Result<()>> {
        let writer = self.writer.clone();
        Box::pin(async move {
            let writer = writer.ok_or(Error::NotConnected)?;
            let mut writer = writer.lock().await;

            tracing::trace!("writing {} bytes", data.len());
            writer.write_all(&data).await?;
            writer.flush().await?;
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.writer.is_some()
    }

    fn take_reader(&mut self) -> Option<Reader> {
        self.reader.take().map(|r| Box::new(r) as Reader)
    }
}

/// Lists available serial ports.
///
/// # Errors
///
/// Returns an error if the port list cannot be retrieved.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
