//! Virtual RFD900 modem
//!
//! Simulates the host-facing serial side of a SiK modem. In data mode every
//! byte is treated as radio payload, except a lone `+++` surrounded by at
//! least `guard_time` of silence, which switches to command mode. In command
//! mode each `\r`-terminated line is parsed as an AT command and answered.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rfd_modem::{ModemError, Transport};
use rfd_protocol::{AtCommand, ESCAPE_SEQUENCE, LINE_TERMINATOR};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::bank::PortActivity;

/// Operating mode of the simulated firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemMode {
    /// Transparent: bytes go out over the air
    Data,
    /// Bytes are parsed as AT commands
    Command,
}

/// Configuration for creating a virtual modem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualModemConfig {
    /// `ATI` banner
    pub version: String,
    /// Silence the escape detector needs before and after `+++`
    pub guard_time: Duration,
    /// Echo each command line back before answering (SiK default)
    pub echo: bool,
    /// `false` simulates a serial device that is not a modem: it never answers
    pub responsive: bool,
    /// Delay before any reply bytes become readable
    pub reply_delay: Duration,
    /// Initial S-register values
    pub registers: BTreeMap<String, String>,
    /// Canned replies by exact command text, replacing the normal answer
    pub overrides: BTreeMap<String, Vec<String>>,
}

impl Default for VirtualModemConfig {
    fn default() -> Self {
        let registers = [
            ("0", "29"),  // FORMAT
            ("1", "57"),  // SERIAL_SPEED
            ("2", "64"),  // AIR_SPEED
            ("3", "25"),  // NETID
            ("4", "30"),  // TXPOWER
            ("5", "1"),   // ECC
            ("6", "1"),   // MAVLINK
            ("7", "0"),   // OPPRESEND
            ("8", "915000"),
            ("9", "928000"),
            ("10", "50"), // NUM_CHANNELS
            ("11", "100"),
            ("12", "0"),
            ("13", "0"),
            ("14", "0"),
            ("15", "131"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            version: "RFD SiK 3.11 on RFD900X".to_string(),
            guard_time: Duration::from_secs(1),
            echo: true,
            responsive: true,
            reply_delay: Duration::ZERO,
            registers,
            overrides: BTreeMap::new(),
        }
    }
}

/// A transport call observed by the virtual modem
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes written by the host
    Write(Vec<u8>),
    /// `bytes_available` returned this count
    Poll(usize),
    /// `read_line` returned this line
    ReadLine(String),
    /// Buffers were reset
    Reset,
    /// Port was closed
    Close,
}

/// Timestamped journal entry
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// When the call happened
    pub at: Instant,
    /// What happened
    pub event: TransportEvent,
}

/// A simulated modem behind a serial port
#[derive(Debug)]
pub struct VirtualModem {
    port: String,
    config: VirtualModemConfig,
    open: bool,
    mode: ModemMode,
    opened_at: Instant,
    /// Last time the host sent anything
    last_host_traffic: Instant,
    /// When a guard-qualified `+++` arrived, awaiting the trailing guard
    escape_at: Option<Instant>,
    /// Partial command line received in command mode
    line_buf: Vec<u8>,
    /// Reply bytes not yet visible to the host
    scheduled: VecDeque<(Instant, Vec<u8>)>,
    /// Reply bytes the host can read
    rx: VecDeque<u8>,
    registers: BTreeMap<String, String>,
    eeprom: BTreeMap<String, String>,
    fail_writes: bool,
    journal: Vec<JournalEntry>,
    activity: Option<Rc<RefCell<PortActivity>>>,
}

impl VirtualModem {
    /// Create an open virtual modem in data mode
    pub fn new(port: impl Into<String>, config: VirtualModemConfig) -> Self {
        let now = Instant::now();
        Self {
            port: port.into(),
            registers: config.registers.clone(),
            eeprom: config.registers.clone(),
            config,
            open: true,
            mode: ModemMode::Data,
            opened_at: now,
            last_host_traffic: now,
            escape_at: None,
            line_buf: Vec::new(),
            scheduled: VecDeque::new(),
            rx: VecDeque::new(),
            fail_writes: false,
            journal: Vec::new(),
            activity: None,
        }
    }

    pub(crate) fn with_activity(mut self, activity: Rc<RefCell<PortActivity>>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Current firmware mode
    pub fn mode(&self) -> ModemMode {
        self.mode
    }

    /// When the port was opened
    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    /// Every transport call so far
    pub fn journal(&self) -> &[JournalEntry] {
        &self.journal
    }

    /// Live register value
    pub fn register(&self, name: &str) -> Option<&str> {
        self.registers.get(name).map(String::as_str)
    }

    /// Register value persisted with `AT&W`
    pub fn saved_register(&self, name: &str) -> Option<&str> {
        self.eeprom.get(name).map(String::as_str)
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Queue an unsolicited line from the modem (e.g. radio payload in data mode)
    pub fn inject_line(&mut self, line: &str) {
        self.rx.extend(line.as_bytes());
        self.rx.extend(LINE_TERMINATOR.as_bytes());
    }

    fn record(&mut self, event: TransportEvent) {
        self.journal.push(JournalEntry {
            at: Instant::now(),
            event,
        });
    }

    /// Apply everything that happens with the passage of time
    fn advance(&mut self, now: Instant) {
        if let Some(at) = self.escape_at {
            if self.mode == ModemMode::Data && now.duration_since(at) >= self.config.guard_time {
                debug!("{}: guard time elapsed after '+++', entering command mode", self.port);
                self.mode = ModemMode::Command;
                self.escape_at = None;
            }
        }

        while let Some((ready, _)) = self.scheduled.front() {
            if *ready > now {
                break;
            }
            if let Some((_, bytes)) = self.scheduled.pop_front() {
                self.rx.extend(bytes);
            }
        }
    }

    fn reply(&mut self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
        let ready = Instant::now() + self.config.reply_delay;
        self.scheduled.push_back((ready, bytes));
    }

    fn receive_data(&mut self, bytes: &[u8], now: Instant) {
        let silent_for = now.duration_since(self.last_host_traffic);
        if bytes == ESCAPE_SEQUENCE
            && self.escape_at.is_none()
            && silent_for >= self.config.guard_time
        {
            trace!("{}: '+++' after {:?} of silence", self.port, silent_for);
            self.escape_at = Some(now);
        } else {
            if self.escape_at.take().is_some() {
                trace!("{}: escape cancelled by traffic", self.port);
            }
            trace!("{}: {} byte(s) of radio payload", self.port, bytes.len());
        }
    }

    fn receive_command_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if b == b'\r' || b == b'\n' {
                if !self.line_buf.is_empty() {
                    let line = String::from_utf8_lossy(&self.line_buf).into_owned();
                    self.line_buf.clear();
                    self.handle_line(&line);
                }
            } else {
                self.line_buf.push(b);
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        debug!("{}: command {:?}", self.port, line);
        if self.config.echo {
            self.reply(line);
        }

        if let Some(lines) = self.config.overrides.get(line).cloned() {
            for l in &lines {
                self.reply(l);
            }
            return;
        }

        match AtCommand::parse(line) {
            AtCommand::Attention => self.reply("OK"),
            AtCommand::Identify => {
                let version = self.config.version.clone();
                self.reply(&version);
            }
            AtCommand::GetParameter(name) => match self.registers.get(&name).cloned() {
                Some(value) => self.reply(&value),
                None => self.reply("ERROR"),
            },
            AtCommand::SetParameter { name, value } => {
                if let Some(slot) = self.registers.get_mut(&name) {
                    *slot = value;
                    self.reply("OK");
                } else {
                    self.reply("ERROR");
                }
            }
            AtCommand::WriteEeprom => {
                self.eeprom = self.registers.clone();
                self.reply("OK");
            }
            AtCommand::Raw(raw) => match raw.to_ascii_uppercase().as_str() {
                "ATO" => {
                    self.reply("OK");
                    self.mode = ModemMode::Data;
                }
                "ATZ" => {
                    self.registers = self.eeprom.clone();
                    self.mode = ModemMode::Data;
                }
                _ => self.reply("ERROR"),
            },
        }
    }
}

impl Transport for VirtualModem {
    fn port_name(&self) -> &str {
        &self.port
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ModemError> {
        if !self.open || self.fail_writes {
            let reason = if self.open {
                "simulated write failure"
            } else {
                "port is closed"
            };
            return Err(ModemError::WriteFailed {
                port: self.port.clone(),
                reason: reason.to_string(),
            });
        }

        self.record(TransportEvent::Write(bytes.to_vec()));
        let now = Instant::now();
        self.advance(now);

        if self.config.responsive {
            match self.mode {
                ModemMode::Data => self.receive_data(bytes, now),
                ModemMode::Command => self.receive_command_bytes(bytes),
            }
        }
        self.last_host_traffic = now;
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, ModemError> {
        if !self.open {
            return Err(ModemError::NotConnected);
        }
        self.advance(Instant::now());
        let n = self.rx.len();
        self.record(TransportEvent::Poll(n));
        Ok(n)
    }

    fn read_line(&mut self) -> Result<String, ModemError> {
        if !self.open {
            return Err(ModemError::NotConnected);
        }
        self.advance(Instant::now());

        let mut raw = Vec::new();
        while let Some(b) = self.rx.pop_front() {
            if b == b'\n' {
                break;
            }
            raw.push(b);
        }
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        self.record(TransportEvent::ReadLine(line.clone()));
        Ok(line)
    }

    fn reset_buffers(&mut self) -> Result<(), ModemError> {
        if !self.open {
            return Err(ModemError::NotConnected);
        }
        self.record(TransportEvent::Reset);
        self.advance(Instant::now());
        self.rx.clear();
        self.line_buf.clear();
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.record(TransportEvent::Close);
        if let Some(activity) = &self.activity {
            activity.borrow_mut().record_close(&self.port);
        }
    }
}

impl Drop for VirtualModem {
    fn drop(&mut self) {
        self.close();
    }
}
