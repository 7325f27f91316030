//! Virtual port bank
//!
//! A fixed, ordered set of virtual ports that can be opened like serial
//! ports. Each port either hosts a [`VirtualModem`] or refuses to open.
//! Opens and closes are tracked so tests can check that every handle was
//! released.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use rfd_modem::{LinkSettings, ModemError, TransportOpener};
use tracing::debug;

use crate::modem::{VirtualModem, VirtualModemConfig};

/// What sits behind a virtual port
#[derive(Debug, Clone)]
enum PortSetup {
    Modem(VirtualModemConfig),
    Unavailable(String),
}

/// Open/close history of a bank
#[derive(Debug, Clone, Default)]
pub struct PortActivity {
    /// Ports in the order they were opened, with the link settings used
    pub opened: Vec<(String, LinkSettings)>,
    /// Ports in the order they were closed
    pub closed: Vec<String>,
    /// Ports currently held open
    pub open_now: BTreeSet<String>,
}

impl PortActivity {
    pub(crate) fn record_close(&mut self, port: &str) {
        self.open_now.remove(port);
        self.closed.push(port.to_string());
    }
}

/// Ordered collection of virtual ports
#[derive(Debug, Default)]
pub struct VirtualPortBank {
    ports: Vec<(String, PortSetup)>,
    activity: Rc<RefCell<PortActivity>>,
}

impl VirtualPortBank {
    /// Create an empty bank
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port hosting a modem
    pub fn add_modem(&mut self, port: impl Into<String>, config: VirtualModemConfig) -> &mut Self {
        self.ports.push((port.into(), PortSetup::Modem(config)));
        self
    }

    /// Add a port with a device that never answers
    pub fn add_silent(&mut self, port: impl Into<String>, config: VirtualModemConfig) -> &mut Self {
        let config = VirtualModemConfig {
            responsive: false,
            ..config
        };
        self.add_modem(port, config)
    }

    /// Add a port that fails to open with `reason`
    pub fn add_unavailable(
        &mut self,
        port: impl Into<String>,
        reason: impl Into<String>,
    ) -> &mut Self {
        self.ports
            .push((port.into(), PortSetup::Unavailable(reason.into())));
        self
    }

    /// Port names in enumeration order
    pub fn port_names(&self) -> Vec<String> {
        self.ports.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Snapshot of open/close history
    pub fn activity(&self) -> PortActivity {
        self.activity.borrow().clone()
    }
}

impl TransportOpener for VirtualPortBank {
    type Transport = VirtualModem;

    fn open(&self, port: &str, link: &LinkSettings) -> Result<VirtualModem, ModemError> {
        let connect_failed = |reason: &str| ModemError::ConnectFailed {
            port: port.to_string(),
            reason: reason.to_string(),
        };

        let setup = self
            .ports
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, setup)| setup)
            .ok_or_else(|| connect_failed("no such port"))?;

        let config = match setup {
            PortSetup::Modem(config) => config.clone(),
            PortSetup::Unavailable(reason) => return Err(connect_failed(reason)),
        };

        let mut activity = self.activity.borrow_mut();
        if !activity.open_now.insert(port.to_string()) {
            return Err(connect_failed("port is already open"));
        }
        activity.opened.push((port.to_string(), *link));
        drop(activity);

        debug!("Opened virtual port {}", port);
        Ok(VirtualModem::new(port, config).with_activity(Rc::clone(&self.activity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfd_modem::Transport;

    #[test]
    fn test_open_tracks_activity() {
        let mut bank = VirtualPortBank::new();
        bank.add_modem("SIM0", VirtualModemConfig::default())
            .add_unavailable("SIM1", "permission denied");

        let mut modem = bank.open("SIM0", &LinkSettings::default()).unwrap();
        assert!(bank.activity().open_now.contains("SIM0"));

        modem.close();
        modem.close();
        let activity = bank.activity();
        assert!(activity.open_now.is_empty());
        assert_eq!(activity.closed, vec!["SIM0".to_string()]);
    }

    #[test]
    fn test_unavailable_and_unknown_ports_fail() {
        let mut bank = VirtualPortBank::new();
        bank.add_unavailable("SIM1", "permission denied");

        let err = bank.open("SIM1", &LinkSettings::default()).unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(matches!(
            bank.open("SIM9", &LinkSettings::default()),
            Err(ModemError::ConnectFailed { .. })
        ));
    }

    #[test]
    fn test_port_is_exclusive_until_closed() {
        let mut bank = VirtualPortBank::new();
        bank.add_modem("SIM0", VirtualModemConfig::default());

        let first = bank.open("SIM0", &LinkSettings::default()).unwrap();
        assert!(bank.open("SIM0", &LinkSettings::default()).is_err());

        drop(first);
        assert!(bank.open("SIM0", &LinkSettings::default()).is_ok());
    }
}
