//! Modem discovery
//!
//! Probes candidate ports one after another: open, try command-mode entry,
//! ask `ATI` for the firmware banner, close. A failure on one candidate is
//! logged and never stops the scan.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{ModemClient, ModemConfig};
use crate::error::ModemError;
use crate::scanner::PortScanner;
use crate::transport::{LinkSettings, SerialOpener, Transport, TransportOpener};

/// A port that answered as an RFD900 modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredModem {
    /// Port identifier (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// `ATI` response
    pub version: String,
}

/// Configuration for probing
#[derive(Debug, Clone, Default)]
pub struct ProbeConfig {
    /// Link settings used to open each candidate
    pub link: LinkSettings,
    /// Engine timing for each candidate
    pub modem: ModemConfig,
}

impl ProbeConfig {
    /// Probe at `baud_rate`, using `timeout` for both reads and responses
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self {
            link: LinkSettings {
                baud_rate,
                read_timeout: timeout,
            },
            modem: ModemConfig::with_timeout(timeout),
        }
    }
}

/// Sequential modem prober
pub struct ModemProber {
    config: ProbeConfig,
}

impl ModemProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProbeConfig::default(),
        }
    }

    /// Create a prober with custom configuration
    pub fn with_config(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Probe configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe a single port
    ///
    /// `Ok(None)` means the port opened but did not confirm command mode.
    /// The transport is closed before returning on every path.
    pub fn probe<O: TransportOpener>(
        &self,
        opener: &O,
        port: &str,
    ) -> Result<Option<DiscoveredModem>, ModemError> {
        debug!("Checking port {}...", port);

        let mut client = ModemClient::<O::Transport>::connect(
            opener,
            port,
            &self.config.link,
            self.config.modem,
        )?;
        let outcome = Self::identify(&mut client);
        client.disconnect();

        let version = match outcome? {
            Some(version) => version,
            None => return Ok(None),
        };

        info!("Detected modem on {}: {}", port, version);
        Ok(Some(DiscoveredModem {
            port: port.to_string(),
            version,
        }))
    }

    fn identify<T: Transport>(
        client: &mut ModemClient<T>,
    ) -> Result<Option<String>, ModemError> {
        if !client.enter_command_mode()? {
            return Ok(None);
        }
        let response = client.send_command("ATI", true)?;
        Ok(Some(response.text()))
    }

    /// Probe every candidate in order and collect the modems found
    ///
    /// Each candidate costs at least two guard times, so total time grows
    /// linearly with the number of candidates.
    pub fn discover<O, I, S>(&self, opener: &O, ports: I) -> Vec<DiscoveredModem>
    where
        O: TransportOpener,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        info!("Detecting RFD900 modems...");
        let mut modems = Vec::new();

        for port in ports {
            let port = port.as_ref();
            match self.probe(opener, port) {
                Ok(Some(modem)) => modems.push(modem),
                Ok(None) => debug!("No modem on {}", port),
                Err(e) => warn!("Error checking port {}: {}", port, e),
            }
        }

        info!("Found {} modem(s)", modems.len());
        modems
    }
}

impl Default for ModemProber {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan the system's serial ports for RFD900 modems
pub fn detect_modems(config: ProbeConfig) -> Result<Vec<DiscoveredModem>, ModemError> {
    detect_modems_with(&PortScanner::new(), config)
}

/// Scan with a custom port scanner
pub fn detect_modems_with(
    scanner: &PortScanner,
    config: ProbeConfig,
) -> Result<Vec<DiscoveredModem>, ModemError> {
    let ports = scanner.enumerate_ports()?;
    let prober = ModemProber::with_config(config);
    Ok(prober.discover(&SerialOpener, ports.iter().map(|p| p.port.as_str())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_config_default() {
        let config = ProbeConfig::default();
        assert_eq!(config.link.baud_rate, 57_600);
        assert_eq!(config.modem.response_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_probe_config_new_shares_timeout() {
        let config = ProbeConfig::new(115_200, Duration::from_millis(1500));
        assert_eq!(config.link.read_timeout, Duration::from_millis(1500));
        assert_eq!(config.modem.response_timeout, Duration::from_millis(1500));
        assert_eq!(config.modem.guard_time, Duration::from_secs(2));
    }

    #[test]
    fn test_discover_skips_unopenable_ports() {
        let prober = ModemProber::new();
        let found = prober.discover(
            &SerialOpener,
            ["/dev/rfd-config-missing-a", "/dev/rfd-config-missing-b"],
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_discovered_modem_serializes() {
        let modem = DiscoveredModem {
            port: "/dev/ttyUSB0".into(),
            version: "RFD SiK 3.11 on RFD900X".into(),
        };
        let json = serde_json::to_string(&modem).unwrap();
        assert_eq!(
            json,
            r#"{"port":"/dev/ttyUSB0","version":"RFD SiK 3.11 on RFD900X"}"#
        );
    }
}
