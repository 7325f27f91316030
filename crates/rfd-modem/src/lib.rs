//! RFD900 Modem Library
//!
//! This crate talks to RFD900 radio modems over a serial link:
//!
//! - [`transport`]: byte-level serial I/O behind the [`Transport`] trait
//! - [`engine`]: guard-time command-mode entry and the timeout-bounded
//!   AT command exchange ([`ModemClient`])
//! - [`discovery`]: sequential probing of candidate ports ([`ModemProber`])
//! - [`scanner`]: enumeration of the system's serial ports
//!
//! Everything blocks. A client owns its transport exclusively and no two
//! operations on the same port may overlap.
//!
//! # Example
//!
//! ```rust,no_run
//! use rfd_modem::{LinkSettings, ModemClient, ModemConfig, SerialOpener};
//!
//! let mut client = ModemClient::connect(
//!     &SerialOpener,
//!     "/dev/ttyUSB0",
//!     &LinkSettings::default(),
//!     ModemConfig::default(),
//! )
//! .unwrap();
//!
//! if client.enter_command_mode().unwrap() {
//!     let response = client.send_command("ATI", true).unwrap();
//!     println!("{}", response);
//! }
//! client.disconnect();
//! ```

pub mod discovery;
pub mod engine;
pub mod error;
pub mod scanner;
pub mod transport;

pub use discovery::{detect_modems, detect_modems_with, DiscoveredModem, ModemProber, ProbeConfig};
pub use engine::{ModemClient, ModemConfig, SessionState};
pub use error::ModemError;
pub use scanner::{CandidatePort, PortScanner, ScannerConfig};
pub use transport::{LinkSettings, SerialOpener, SerialTransport, Transport, TransportOpener};
