//! Byte-level serial transport
//!
//! The transport knows nothing about AT commands. It moves bytes, reports how
//! many are waiting, reads a line at a time and can throw away stale buffered
//! data. The protocol engine layers timing and meaning on top.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use rfd_protocol::DEFAULT_BAUD_RATE;
use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, info, trace};

use crate::error::ModemError;

/// Serial link parameters fixed when a handle is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout of the underlying port
    pub read_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// An open, exclusively owned byte stream to one physical port
///
/// Implementations must make [`Transport::close`] idempotent and should also
/// close on drop, so every exit path releases the port.
pub trait Transport {
    /// Identifier of the port this handle is bound to
    fn port_name(&self) -> &str;

    /// Whether the handle is still open
    fn is_open(&self) -> bool;

    /// Write all bytes and flush them to the OS
    fn write(&mut self, bytes: &[u8]) -> Result<(), ModemError>;

    /// Number of bytes ready to read, without blocking
    fn bytes_available(&mut self) -> Result<usize, ModemError>;

    /// Read one line, stripped of its terminator and surrounding whitespace
    ///
    /// Only call this after [`Transport::bytes_available`] reported data.
    fn read_line(&mut self) -> Result<String, ModemError>;

    /// Discard unread input and unsent output
    fn reset_buffers(&mut self) -> Result<(), ModemError>;

    /// Release the port. No-op when already closed.
    fn close(&mut self);
}

/// Opens transports by port identifier
pub trait TransportOpener {
    /// Transport type produced by this opener
    type Transport: Transport;

    /// Open `port` with the given link settings
    fn open(&self, port: &str, link: &LinkSettings) -> Result<Self::Transport, ModemError>;
}

/// Transport backed by an OS serial port
pub struct SerialTransport {
    port_name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// On Unix the port is opened in exclusive mode, so a second open of the
    /// same device fails with [`ModemError::ConnectFailed`].
    pub fn open(port_name: &str, link: &LinkSettings) -> Result<Self, ModemError> {
        info!(
            "Connecting to modem on {} at {} baud...",
            port_name, link.baud_rate
        );

        let port = serialport::new(port_name, link.baud_rate)
            .timeout(link.read_timeout)
            .open()
            .map_err(|e| ModemError::ConnectFailed {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            port_name: port_name.to_string(),
            port: Some(port),
        })
    }

    fn read_failed(&self, reason: impl ToString) -> ModemError {
        ModemError::ReadFailed {
            port: self.port_name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl Transport for SerialTransport {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ModemError> {
        let Some(port) = self.port.as_mut() else {
            return Err(ModemError::WriteFailed {
                port: self.port_name.clone(),
                reason: "port is closed".to_string(),
            });
        };

        trace!("TX {:?}", String::from_utf8_lossy(bytes));
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| ModemError::WriteFailed {
                port: self.port_name.clone(),
                reason: e.to_string(),
            })
    }

    fn bytes_available(&mut self) -> Result<usize, ModemError> {
        let port = self.port.as_ref().ok_or(ModemError::NotConnected)?;
        match port.bytes_to_read() {
            Ok(n) => Ok(n as usize),
            Err(e) => Err(self.read_failed(e)),
        }
    }

    fn read_line(&mut self) -> Result<String, ModemError> {
        let port = self.port.as_mut().ok_or(ModemError::NotConnected)?;

        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let outcome = loop {
            match port.read(&mut byte) {
                Ok(0) => break Ok(()),
                Ok(_) if byte[0] == b'\n' => break Ok(()),
                Ok(_) => line.push(byte[0]),
                // Read timeout: hand back what arrived, like a partial readline
                Err(e) if e.kind() == ErrorKind::TimedOut => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        if let Err(e) = outcome {
            return Err(self.read_failed(e));
        }

        let text = String::from_utf8_lossy(&line).trim().to_string();
        trace!("RX {:?}", text);
        Ok(text)
    }

    fn reset_buffers(&mut self) -> Result<(), ModemError> {
        let port = self.port.as_ref().ok_or(ModemError::NotConnected)?;
        match port.clear(ClearBuffer::All) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.read_failed(e)),
        }
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Closing connection to {}", self.port_name);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens [`SerialTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    type Transport = SerialTransport;

    fn open(&self, port: &str, link: &LinkSettings) -> Result<SerialTransport, ModemError> {
        debug!("Opening {} ({:?})", port, link);
        SerialTransport::open(port, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_settings_default() {
        let link = LinkSettings::default();
        assert_eq!(link.baud_rate, 57_600);
        assert_eq!(link.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialOpener.open("/dev/rfd-config-no-such-port", &LinkSettings::default());
        assert!(matches!(result, Err(ModemError::ConnectFailed { .. })));
    }
}
