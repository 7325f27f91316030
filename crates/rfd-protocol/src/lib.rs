//! RFD900 AT Command Library
//!
//! This crate describes the text protocol spoken by RFD900 (SiK firmware)
//! radio modems while they are in command mode:
//!
//! - **Commands**: ASCII lines prefixed with `AT`, terminated by `\r\n`
//! - **Responses**: newline-delimited lines, ended by a terminal token
//!   (`OK` or `ERROR`) when the firmware emits one
//! - **Escape**: the raw three bytes `+++`, surrounded by guard-time silence,
//!   switch the modem from transparent data mode into command mode
//!
//! Nothing here performs I/O. The `rfd-modem` crate owns the serial link and
//! the timing rules; this crate only knows what the bytes mean.
//!
//! # Example
//!
//! ```rust
//! use rfd_protocol::{AtCommand, CommandResult, ResponseStatus};
//!
//! let cmd = AtCommand::get_parameter("4").unwrap();
//! assert_eq!(cmd.encode(), b"ATS4?\r\n");
//!
//! let result = CommandResult::from_lines(["ATS4?", "20", "OK"]);
//! assert_eq!(result.status(), ResponseStatus::Ok);
//! assert_eq!(result.payload(&cmd.text()), vec!["20"]);
//! ```

pub mod command;
pub mod error;
pub mod response;

pub use command::AtCommand;
pub use error::ProtocolError;
pub use response::{CommandResult, ResponseStatus, TerminalToken};

/// Line terminator appended to every command sent to the modem
pub const LINE_TERMINATOR: &str = "\r\n";

/// Escape sequence that requests command mode (sent without a terminator)
pub const ESCAPE_SEQUENCE: &[u8; 3] = b"+++";

/// Default air/serial speed of RFD900 modems
pub const DEFAULT_BAUD_RATE: u32 = 57_600;
