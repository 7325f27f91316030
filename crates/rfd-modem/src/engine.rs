//! Modem protocol engine
//!
//! Drives a [`Transport`] through the two timing-sensitive parts of the
//! RFD900 protocol:
//!
//! - **Command-mode entry**: guard-time silence, `+++`, guard-time silence,
//!   then an `AT` probe whose answer must contain `OK`
//! - **Command exchange**: write one command line, then collect reply lines
//!   until a terminal token arrives or the response timeout runs out
//!
//! # Session states
//!
//! ```text
//! Disconnected --connect--> DataMode --enter_command_mode (OK)--> CommandMode
//!      ^                       |                                      |
//!      +------ disconnect -----+-------------- disconnect ------------+
//! ```

use std::thread;
use std::time::{Duration, Instant};

use rfd_protocol::{AtCommand, CommandResult, ResponseStatus, ESCAPE_SEQUENCE, LINE_TERMINATOR};
use tracing::{debug, error, info, info_span, warn, Span};

use crate::error::ModemError;
use crate::transport::{LinkSettings, Transport, TransportOpener};

/// Timing parameters of the protocol engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemConfig {
    /// How long to collect reply lines after a command is written
    pub response_timeout: Duration,
    /// Silence required before and after the `+++` escape
    pub guard_time: Duration,
    /// Sleep between polls while no bytes are waiting
    pub poll_interval: Duration,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(1),
            guard_time: Duration::from_secs(2),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl ModemConfig {
    /// Default timing with a different response timeout
    pub fn with_timeout(response_timeout: Duration) -> Self {
        Self {
            response_timeout,
            ..Self::default()
        }
    }
}

/// Logical state of a modem session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No open transport
    Disconnected,
    /// Transport open, modem assumed to be passing data through
    DataMode,
    /// Modem confirmed command mode with `OK`
    CommandMode,
}

/// AT-command client for one modem
///
/// Owns its transport; dropping the client closes the port. All operations
/// block and run to completion. Operations log inside a `modem{port=...}`
/// span owned by the client.
pub struct ModemClient<T: Transport> {
    transport: T,
    config: ModemConfig,
    state: SessionState,
    span: Span,
}

impl<T: Transport> ModemClient<T> {
    /// Wrap an already-open transport
    pub fn new(transport: T, config: ModemConfig) -> Self {
        let span = info_span!("modem", port = %transport.port_name());
        let state = if transport.is_open() {
            SessionState::DataMode
        } else {
            SessionState::Disconnected
        };
        Self {
            transport,
            config,
            state,
            span,
        }
    }

    /// Open `port` through `opener` and wrap the resulting transport
    pub fn connect<O>(
        opener: &O,
        port: &str,
        link: &LinkSettings,
        config: ModemConfig,
    ) -> Result<Self, ModemError>
    where
        O: TransportOpener<Transport = T>,
    {
        let transport = opener.open(port, link).inspect_err(|e| {
            error!("Failed to connect to {}: {}", port, e);
        })?;
        Ok(Self::new(transport, config))
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Port this client talks to
    pub fn port(&self) -> &str {
        self.transport.port_name()
    }

    /// Timing configuration
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn ensure_connected(&self) -> Result<(), ModemError> {
        if self.state == SessionState::Disconnected || !self.transport.is_open() {
            return Err(ModemError::NotConnected);
        }
        Ok(())
    }

    /// Send a command line and collect the reply
    ///
    /// With `expect_response == false` this writes once and returns an empty
    /// result without reading. Otherwise lines are collected until one is
    /// exactly `OK` or `ERROR`, or until the response timeout (counted from
    /// the end of the write) runs out. A timeout is not an error: whatever
    /// arrived is returned.
    pub fn send_command(
        &mut self,
        command: &str,
        expect_response: bool,
    ) -> Result<CommandResult, ModemError> {
        let _enter = self.span.clone().entered();
        self.ensure_connected()?;

        debug!("Sending command: {}", command);
        let mut line = String::with_capacity(command.len() + LINE_TERMINATOR.len());
        line.push_str(command);
        line.push_str(LINE_TERMINATOR);
        self.transport.write(line.as_bytes())?;

        if !expect_response {
            return Ok(CommandResult::new());
        }

        let mut result = CommandResult::new();
        let start = Instant::now();
        while start.elapsed() < self.config.response_timeout {
            if self.transport.bytes_available()? > 0 {
                let received = self.transport.read_line()?;
                debug!("Received: {}", received);
                if let Some(token) = result.push_line(received) {
                    debug!("{} answered {}", command, token.as_str());
                    break;
                }
            } else {
                thread::sleep(self.config.poll_interval);
            }
        }

        if result.terminal().is_none() {
            debug!(
                "No terminal token for {} within {:?} ({} line(s))",
                command,
                self.config.response_timeout,
                result.lines().len()
            );
        }
        Ok(result)
    }

    /// Send a typed command, refusing state-changing commands outside command mode
    pub fn send(&mut self, command: &AtCommand) -> Result<CommandResult, ModemError> {
        if command.requires_command_mode() && self.state != SessionState::CommandMode {
            return Err(ModemError::NotInCommandMode {
                command: command.text(),
            });
        }
        self.send_command(&command.text(), true)
    }

    /// Switch the modem from data mode into command mode
    ///
    /// Sleeps one guard time, discards buffered bytes, writes exactly `+++`,
    /// sleeps another guard time and then verifies with `AT`. Returns `true`
    /// when the verification text contains `OK` anywhere. `false` only means
    /// the modem did not confirm; link failures come back as `Err`.
    pub fn enter_command_mode(&mut self) -> Result<bool, ModemError> {
        let span = self.span.clone();
        let _enter = span.enter();
        self.ensure_connected()?;

        info!("Attempting to enter command mode...");

        debug!("Waiting {:?} guard time before '+++'", self.config.guard_time);
        thread::sleep(self.config.guard_time);

        debug!("Clearing input/output buffers");
        self.transport.reset_buffers()?;

        debug!("Sending '+++'");
        self.transport.write(ESCAPE_SEQUENCE)?;

        debug!("Waiting {:?} guard time after '+++'", self.config.guard_time);
        thread::sleep(self.config.guard_time);

        debug!("Sending 'AT' to verify command mode");
        let response = self.send_command(&AtCommand::Attention.text(), true)?;

        if response.contains_ok() {
            info!("Successfully entered command mode");
            self.state = SessionState::CommandMode;
            Ok(true)
        } else {
            error!(
                "Failed to enter command mode. Response: {:?}",
                response.text()
            );
            Ok(false)
        }
    }

    /// Call [`ModemClient::enter_command_mode`] up to `max_attempts` times
    ///
    /// Each attempt costs at least two guard times. `backoff` is slept between
    /// failed attempts. Link errors end the loop immediately.
    pub fn enter_command_mode_with_retries(
        &mut self,
        max_attempts: u32,
        backoff: Duration,
    ) -> Result<bool, ModemError> {
        for attempt in 1..=max_attempts {
            debug!("Attempt {} to enter command mode", attempt);
            if self.enter_command_mode()? {
                return Ok(true);
            }
            if attempt < max_attempts {
                thread::sleep(backoff);
            }
        }
        error!(
            "Failed to enter command mode after {} attempts",
            max_attempts
        );
        Ok(false)
    }

    /// Firmware identification (`ATI`)
    ///
    /// SiK firmware answers `ATI` with a banner and no terminal token, so this
    /// normally waits out the response timeout.
    pub fn identify(&mut self) -> Result<String, ModemError> {
        let cmd = AtCommand::Identify;
        let result = self.send(&cmd)?;
        Ok(result.payload(&cmd.text()).join("\n"))
    }

    /// Read register `name` (`ATS<name>?`)
    pub fn get_parameter(&mut self, name: &str) -> Result<CommandResult, ModemError> {
        let cmd = AtCommand::get_parameter(name)?;
        self.send(&cmd)
    }

    /// Write register `name` and persist it with `AT&W`
    ///
    /// Requires command mode. If the modem rejects the write, `AT&W` is not
    /// sent.
    pub fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), ModemError> {
        let cmd = AtCommand::set_parameter(name, value)?;
        let result = self.send(&cmd)?;
        if result.status() == ResponseStatus::Error {
            return Err(ModemError::CommandRejected {
                command: cmd.text(),
                response: result.text(),
            });
        }
        if result.status() == ResponseStatus::Incomplete {
            let _enter = self.span.enter();
            warn!("No confirmation for {}, saving anyway", cmd);
        }
        self.save()
    }

    /// Persist registers to EEPROM (`AT&W`)
    pub fn save(&mut self) -> Result<(), ModemError> {
        let cmd = AtCommand::WriteEeprom;
        let result = self.send(&cmd)?;
        if result.status() == ResponseStatus::Error {
            return Err(ModemError::CommandRejected {
                command: cmd.text(),
                response: result.text(),
            });
        }
        Ok(())
    }

    /// Close the transport. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            let _enter = self.span.enter();
            debug!("Disconnecting");
        }
        self.transport.close();
        self.state = SessionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Transport that replays canned lines and counts calls
    #[derive(Default)]
    struct CannedTransport {
        open: bool,
        replies: VecDeque<String>,
        writes: Vec<Vec<u8>>,
        reads: usize,
        polls: usize,
    }

    impl CannedTransport {
        fn with_replies(replies: &[&str]) -> Self {
            Self {
                open: true,
                replies: replies.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl Transport for CannedTransport {
        fn port_name(&self) -> &str {
            "canned"
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), ModemError> {
            self.writes.push(bytes.to_vec());
            Ok(())
        }

        fn bytes_available(&mut self) -> Result<usize, ModemError> {
            self.polls += 1;
            Ok(self.replies.front().map_or(0, |l| l.len() + 2))
        }

        fn read_line(&mut self) -> Result<String, ModemError> {
            self.reads += 1;
            Ok(self.replies.pop_front().unwrap_or_default())
        }

        fn reset_buffers(&mut self) -> Result<(), ModemError> {
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    fn fast_config() -> ModemConfig {
        ModemConfig {
            response_timeout: Duration::from_millis(100),
            guard_time: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_modem_config_default() {
        let config = ModemConfig::default();
        assert_eq!(config.response_timeout, Duration::from_secs(1));
        assert_eq!(config.guard_time, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_fire_and_forget_writes_once() {
        let mut client = ModemClient::new(CannedTransport::with_replies(&["OK"]), fast_config());
        let result = client.send_command("ATZ", false).unwrap();

        assert!(result.is_empty());
        assert_eq!(client.transport().writes, vec![b"ATZ\r\n".to_vec()]);
        assert_eq!(client.transport().reads, 0);
        assert_eq!(client.transport().polls, 0);
    }

    #[test]
    fn test_stops_at_terminal_token() {
        let transport = CannedTransport::with_replies(&["ATS1?", "57", "OK", "stray"]);
        let mut client = ModemClient::new(transport, fast_config());

        let result = client.send_command("ATS1?", true).unwrap();
        assert_eq!(result.text(), "ATS1?\n57\nOK");
        assert_eq!(client.transport().replies.len(), 1);
    }

    #[test]
    fn test_closed_transport_is_not_connected() {
        let mut transport = CannedTransport::with_replies(&[]);
        transport.close();
        let mut client = ModemClient::new(transport, fast_config());

        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(matches!(
            client.send_command("AT", true),
            Err(ModemError::NotConnected)
        ));
        assert!(matches!(
            client.enter_command_mode(),
            Err(ModemError::NotConnected)
        ));
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let mut client = ModemClient::new(CannedTransport::with_replies(&[]), fast_config());
        client.disconnect();
        client.disconnect();
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(matches!(
            client.send_command("AT", false),
            Err(ModemError::NotConnected)
        ));
    }

    #[test]
    fn test_save_requires_command_mode() {
        let mut client = ModemClient::new(CannedTransport::with_replies(&["OK"]), fast_config());
        assert!(matches!(
            client.save(),
            Err(ModemError::NotInCommandMode { .. })
        ));
        assert!(client.transport().writes.is_empty());
    }

    #[test]
    fn test_command_mode_entry_sets_state() {
        let transport = CannedTransport::with_replies(&["AT", "OK"]);
        let mut client = ModemClient::new(transport, fast_config());

        assert!(client.enter_command_mode().unwrap());
        assert_eq!(client.state(), SessionState::CommandMode);
        assert_eq!(client.transport().writes[0], b"+++".to_vec());
        assert_eq!(client.transport().writes[1], b"AT\r\n".to_vec());
    }
}
