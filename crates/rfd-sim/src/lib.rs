//! RFD900 Simulation Library
//!
//! This crate provides simulated modems for exercising the protocol engine
//! without hardware:
//!
//! - **VirtualModem**: a [`Transport`](rfd_modem::Transport) that behaves like
//!   SiK firmware, including guard-time escape detection, command echo and
//!   register storage, and records every transport call in a journal
//! - **VirtualPortBank**: a [`TransportOpener`](rfd_modem::TransportOpener)
//!   over a fixed list of virtual ports, for discovery scenarios
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rfd_modem::{ModemClient, ModemConfig};
//! use rfd_sim::{VirtualModem, VirtualModemConfig};
//!
//! let modem = VirtualModem::new(
//!     "SIM0",
//!     VirtualModemConfig {
//!         guard_time: Duration::from_millis(20),
//!         ..Default::default()
//!     },
//! );
//! let config = ModemConfig {
//!     response_timeout: Duration::from_millis(200),
//!     guard_time: Duration::from_millis(30),
//!     poll_interval: Duration::from_millis(5),
//! };
//!
//! let mut client = ModemClient::new(modem, config);
//! assert!(client.enter_command_mode().unwrap());
//! ```

pub mod bank;
pub mod modem;

pub use bank::{PortActivity, VirtualPortBank};
pub use modem::{JournalEntry, ModemMode, TransportEvent, VirtualModem, VirtualModemConfig};
