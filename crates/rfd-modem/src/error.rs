//! Error types for modem communication

use thiserror::Error;

/// Errors that can occur while talking to a modem
///
/// A modem that answers `ERROR`, or never answers at all, is not an error at
/// this level: that comes back as response data. These variants cover the
/// link itself and misuse of the session.
#[derive(Debug, Error)]
pub enum ModemError {
    /// Port could not be opened (missing, permission denied, already claimed)
    #[error("failed to open port {port}: {reason}")]
    ConnectFailed { port: String, reason: String },

    /// Operation attempted on a closed or never-opened handle
    #[error("serial connection is not open")]
    NotConnected,

    /// I/O failure while writing
    #[error("write failed on {port}: {reason}")]
    WriteFailed { port: String, reason: String },

    /// I/O failure while polling or reading
    #[error("read failed on {port}: {reason}")]
    ReadFailed { port: String, reason: String },

    /// Command changes modem state but command mode was never confirmed
    #[error("{command} requires command mode")]
    NotInCommandMode { command: String },

    /// Modem answered `ERROR`
    #[error("modem rejected {command}: {response}")]
    CommandRejected { command: String, response: String },

    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Command could not be built
    #[error("protocol error: {0}")]
    Protocol(#[from] rfd_protocol::ProtocolError),
}
