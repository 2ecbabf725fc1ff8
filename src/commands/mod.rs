//! AT command helpers for the local module.
//!
//! [`CommandHandler`] wraps a Local AT connection. Each command is sent
//! with its own frame ID; the module's response both completes the
//! transmission and carries the value.

use std::time::Duration;

use bytes::Bytes;

use crate::connection::{Connection, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::protocol::ApiId;
use crate::transport::Transport;
use crate::types::{Addr16, Addr64, Packet};

/// Longest node identifier the module accepts (`ATNI`).
pub const MAX_NODE_IDENTIFIER: usize = 20;

/// Checks that `command` is two ASCII characters.
fn parse_command(command: &str) -> Result<[u8; 2]> {
    match command.as_bytes() {
        &[a, b] if a.is_ascii() && b.is_ascii() => Ok([a, b]),
        _ => Err(Error::InvalidParam {
            reason: format!("AT command must be two ASCII characters, got {command:?}"),
        }),
    }
}

/// Reads a big-endian unsigned value of at most `N` bytes.
///
/// Modules drop leading zero bytes from some responses.
fn be_value<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    if data.is_empty() || data.len() > N {
        return Err(Error::Length {
            identifier: ApiId::AtResponse.into(),
            len: data.len(),
        });
    }
    let mut out = [0u8; N];
    out[N - data.len()..].copy_from_slice(data);
    Ok(out)
}

/// Command handler for the local module.
pub struct CommandHandler<T> {
    connection: Connection<T>,
    timeout: Duration,
}

impl<T: Transport> CommandHandler<T> {
    /// Creates a handler over a Local AT connection.
    #[must_use]
    pub const fn new(connection: Connection<T>) -> Self {
        Self {
            connection,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets how long to wait for a response value.
    pub const fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Returns the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    /// Sends an AT command and returns the module's response.
    ///
    /// # Errors
    ///
    /// - `InvalidParam` if `command` is not two ASCII characters
    /// - `TxFailed` if the module answers with a non-OK status
    /// - `Timeout` if no response arrives
    pub async fn at(&self, command: &str, param: &[u8]) -> Result<Packet> {
        let command = parse_command(command)?;

        // Responses left over from failed commands
        while let Some(stale) = self.connection.try_rx() {
            tracing::debug!(
                "discarding stale AT response {:?}",
                stale.at_command_str()
            );
        }

        let mut data = Vec::with_capacity(2 + param.len());
        data.extend_from_slice(&command);
        data.extend_from_slice(param);
        let frame_id = self.connection.tx_with_id(&data).await?;

        loop {
            let packet = self.connection.rx_timeout(self.timeout).await?;
            if packet.frame_id != frame_id || packet.at_command != Some(command) {
                // Late answers to commands that already timed out
                tracing::debug!(
                    "skipping AT response {:?} (frame ID {:?}) while waiting for {} (frame ID {:?})",
                    packet.at_command_str(),
                    packet.frame_id,
                    String::from_utf8_lossy(&command),
                    frame_id
                );
                continue;
            }
            return match packet.status {
                Some(status) if status != 0 => Err(Error::TxFailed {
                    con_type: self.connection.con_type().name,
                    status,
                }),
                _ => Ok(packet),
            };
        }
    }

    /// Reads a register.
    pub async fn query(&self, command: &str) -> Result<Bytes> {
        Ok(self.at(command, &[]).await?.data)
    }

    /// Writes a register.
    pub async fn set(&self, command: &str, value: &[u8]) -> Result<()> {
        self.at(command, value).await.map(|_| ())
    }

    /// Reads the 64-bit serial number (`SH` + `SL`).
    pub async fn serial_number(&self) -> Result<Addr64> {
        let high = u32::from_be_bytes(be_value(&self.query("SH").await?)?);
        let low = u32::from_be_bytes(be_value(&self.query("SL").await?)?);
        Ok(Addr64::from_parts(high, low))
    }

    /// Reads the 16-bit source address (`MY`).
    pub async fn address16(&self) -> Result<Addr16> {
        Ok(Addr16::from_bytes(be_value(&self.query("MY").await?)?))
    }

    /// Sets the 16-bit source address (`MY`).
    pub async fn set_address16(&self, address: Addr16) -> Result<()> {
        self.set("MY", &address.to_bytes()).await
    }

    /// Reads the PAN ID (`ID`).
    pub async fn pan_id(&self) -> Result<u16> {
        Ok(u16::from_be_bytes(be_value(&self.query("ID").await?)?))
    }

    /// Reads the node identifier (`NI`).
    pub async fn node_identifier(&self) -> Result<String> {
        let data = self.query("NI").await?;
        Ok(String::from_utf8_lossy(&data).trim_end().to_string())
    }

    /// Sets the node identifier (`NI`).
    pub async fn set_node_identifier(&self, name: &str) -> Result<()> {
        if name.len() > MAX_NODE_IDENTIFIER || !name.is_ascii() {
            return Err(Error::InvalidParam {
                reason: format!(
                    "node identifier must be at most {MAX_NODE_IDENTIFIER} ASCII characters"
                ),
            });
        }
        self.set("NI", name.as_bytes()).await
    }

    /// Reads the firmware version (`VR`).
    pub async fn firmware_version(&self) -> Result<u16> {
        Ok(u16::from_be_bytes(be_value(&self.query("VR").await?)?))
    }

    /// Reads the operating channel (`CH`).
    pub async fn channel(&self) -> Result<u8> {
        let [channel] = be_value(&self.query("CH").await?)?;
        Ok(channel)
    }

    /// Saves the configuration to non-volatile memory (`WR`).
    pub async fn write_settings(&self) -> Result<()> {
        self.set("WR", &[]).await
    }

    /// Applies queued configuration changes (`AC`).
    pub async fn apply_changes(&self) -> Result<()> {
        self.set("AC", &[]).await
    }
}
