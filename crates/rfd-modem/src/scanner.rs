//! Serial port enumeration
//!
//! Lists candidate ports for discovery. Enumeration order is preserved; the
//! USB adapter hint is informational only and never used to reorder or drop
//! ports unless `usb_only` is set.

use serialport::{available_ports, SerialPortType};
use tracing::{debug, info};

use crate::error::ModemError;

/// FTDI vendor ID (RFD900 modems ship with an FT230X/FT231X bridge)
pub const FTDI_VID: u16 = 0x0403;
/// FT230X/FT231X product ID
pub const FT230X_PID: u16 = 0x6015;
/// Silicon Labs CP210x vendor ID (common on third-party RFD900 carriers)
pub const CP210X_VID: u16 = 0x10C4;

/// A serial port that discovery may probe
#[derive(Debug, Clone)]
pub struct CandidatePort {
    /// Port name (e.g., /dev/ttyUSB0, COM3)
    pub port: String,
    /// USB Vendor ID (if USB)
    pub vid: Option<u16>,
    /// USB Product ID (if USB)
    pub pid: Option<u16>,
    /// USB product string
    pub product: Option<String>,
}

impl CandidatePort {
    fn from_serialport(name: String, port_type: &SerialPortType) -> Self {
        match port_type {
            SerialPortType::UsbPort(usb) => Self {
                port: name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product.clone(),
            },
            _ => Self {
                port: name,
                vid: None,
                pid: None,
                product: None,
            },
        }
    }

    /// Whether the port sits behind a USB bridge
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }

    /// Name of the USB-serial bridge, when recognised
    pub fn adapter_hint(&self) -> Option<&'static str> {
        match (self.vid?, self.pid) {
            (FTDI_VID, Some(FT230X_PID)) => Some("FTDI FT230X"),
            (FTDI_VID, _) => Some("FTDI"),
            (CP210X_VID, _) => Some("Silicon Labs CP210x"),
            _ => None,
        }
    }

    /// Display label: "ttyUSB0 (Product)" or just the port name
    pub fn display_label(&self) -> String {
        match (&self.product, self.adapter_hint()) {
            (Some(product), _) => format!("{} ({})", self.port, product),
            (None, Some(hint)) => format!("{} ({})", self.port, hint),
            (None, None) => self.port.clone(),
        }
    }
}

/// Serial port scanner configuration
#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Skip ports whose name contains any of these patterns
    pub skip_patterns: Vec<String>,
    /// Only report USB serial ports
    pub usb_only: bool,
}

/// Serial port scanner
pub struct PortScanner {
    config: ScannerConfig,
}

impl PortScanner {
    /// Create a new scanner with default configuration
    pub fn new() -> Self {
        Self {
            config: ScannerConfig {
                skip_patterns: vec![
                    // Bluetooth ports on macOS
                    "Bluetooth".to_string(),
                    // Debug/logging ports
                    "debug".to_string(),
                ],
                usb_only: false,
            },
        }
    }

    /// Create a scanner with custom configuration
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// Enumerate all available serial ports
    pub fn enumerate_ports(&self) -> Result<Vec<CandidatePort>, ModemError> {
        info!("Enumerating serial ports...");
        let ports = available_ports().map_err(|e| ModemError::EnumerationFailed(e.to_string()))?;

        let result = self.filter(
            ports
                .into_iter()
                .map(|p| CandidatePort::from_serialport(p.port_name, &p.port_type)),
        );

        if result.is_empty() {
            info!("No serial ports found");
        } else {
            info!("Found {} serial port(s)", result.len());
            for port in &result {
                info!("  {}", port.display_label());
            }
        }

        Ok(result)
    }

    fn filter(&self, ports: impl Iterator<Item = CandidatePort>) -> Vec<CandidatePort> {
        ports
            .filter(|p| {
                let skip = self.should_skip_port(p);
                if skip {
                    debug!("Skipping {}", p.port);
                }
                !skip
            })
            .collect()
    }

    fn should_skip_port(&self, port: &CandidatePort) -> bool {
        if self.config.usb_only && !port.is_usb() {
            return true;
        }
        self.config
            .skip_patterns
            .iter()
            .any(|pattern| port.port.contains(pattern.as_str()))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb(vid: u16, pid: u16, product: Option<&str>) -> SerialPortType {
        SerialPortType::UsbPort(UsbPortInfo {
            vid,
            pid,
            serial_number: None,
            manufacturer: None,
            product: product.map(str::to_string),
        })
    }

    #[test]
    fn test_candidate_from_usb() {
        let info = CandidatePort::from_serialport(
            "/dev/ttyUSB0".to_string(),
            &usb(FTDI_VID, FT230X_PID, None),
        );

        assert!(info.is_usb());
        assert_eq!(info.adapter_hint(), Some("FTDI FT230X"));
        assert_eq!(info.display_label(), "/dev/ttyUSB0 (FTDI FT230X)");
    }

    #[test]
    fn test_candidate_from_native_port() {
        let info = CandidatePort::from_serialport("/dev/ttyS0".to_string(), &SerialPortType::Unknown);
        assert!(!info.is_usb());
        assert_eq!(info.adapter_hint(), None);
        assert_eq!(info.display_label(), "/dev/ttyS0");
    }

    #[test]
    fn test_filter_keeps_order_and_skips_patterns() {
        let scanner = PortScanner::new();
        let ports = vec![
            CandidatePort::from_serialport("/dev/ttyUSB1".into(), &usb(CP210X_VID, 0xEA60, None)),
            CandidatePort::from_serialport(
                "/dev/cu.Bluetooth-Incoming-Port".into(),
                &SerialPortType::BluetoothPort,
            ),
            CandidatePort::from_serialport("/dev/ttyS0".into(), &SerialPortType::Unknown),
        ];

        let kept: Vec<_> = scanner
            .filter(ports.into_iter())
            .into_iter()
            .map(|p| p.port)
            .collect();
        assert_eq!(kept, vec!["/dev/ttyUSB1", "/dev/ttyS0"]);
    }

    #[test]
    fn test_usb_only_drops_native_ports() {
        let scanner = PortScanner::with_config(ScannerConfig {
            skip_patterns: Vec::new(),
            usb_only: true,
        });
        let ports = vec![
            CandidatePort::from_serialport("/dev/ttyS0".into(), &SerialPortType::Unknown),
            CandidatePort::from_serialport(
                "/dev/ttyUSB0".into(),
                &usb(FTDI_VID, 0x6001, Some("FT232R USB UART")),
            ),
        ];

        let kept = scanner.filter(ports.into_iter());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].display_label(), "/dev/ttyUSB0 (FT232R USB UART)");
    }
}
