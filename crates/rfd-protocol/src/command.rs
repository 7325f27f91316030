//! AT command encoding
//!
//! RFD900 registers are addressed as `S` registers:
//! - `ATS<name>?` reads a register
//! - `ATS<name>=<value>` writes a register (volatile until saved)
//! - `AT&W` persists all registers to EEPROM
//! - `ATI` reports the firmware banner

use std::fmt;

use crate::error::ProtocolError;
use crate::LINE_TERMINATOR;

/// A command understood by the modem in command mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// Attention: `AT`. Answered with `OK` when in command mode.
    Attention,
    /// Firmware identification: `ATI`
    Identify,
    /// Register query: `ATS<name>?`
    GetParameter(String),
    /// Register write: `ATS<name>=<value>`
    SetParameter { name: String, value: String },
    /// Persist registers to non-volatile storage: `AT&W`
    WriteEeprom,
    /// Anything else, sent verbatim
    Raw(String),
}

impl AtCommand {
    /// Build a register query, validating the register name
    pub fn get_parameter(name: &str) -> Result<Self, ProtocolError> {
        validate_name(name)?;
        Ok(Self::GetParameter(name.to_string()))
    }

    /// Build a register write, validating both name and value
    pub fn set_parameter(name: &str, value: &str) -> Result<Self, ProtocolError> {
        validate_name(name)?;
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ProtocolError::InvalidParameterValue {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        Ok(Self::SetParameter {
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    /// Command text without the line terminator
    pub fn text(&self) -> String {
        match self {
            Self::Attention => "AT".to_string(),
            Self::Identify => "ATI".to_string(),
            Self::GetParameter(name) => format!("ATS{}?", name),
            Self::SetParameter { name, value } => format!("ATS{}={}", name, value),
            Self::WriteEeprom => "AT&W".to_string(),
            Self::Raw(text) => text.clone(),
        }
    }

    /// Wire bytes: command text followed by `\r\n`
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.text().into_bytes();
        bytes.extend_from_slice(LINE_TERMINATOR.as_bytes());
        bytes
    }

    /// Whether this command changes modem state and so only makes sense in
    /// verified command mode
    pub fn requires_command_mode(&self) -> bool {
        matches!(self, Self::SetParameter { .. } | Self::WriteEeprom)
    }

    /// Parse one received command line (terminator already stripped)
    ///
    /// Prefix matching is case-insensitive, as in the SiK firmware. Lines that
    /// don't match a known shape come back as [`AtCommand::Raw`].
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let upper = line.to_ascii_uppercase();

        match upper.as_str() {
            "AT" => return Self::Attention,
            "ATI" => return Self::Identify,
            "AT&W" => return Self::WriteEeprom,
            _ => {}
        }

        if upper.starts_with("ATS") {
            let body = &line[3..];
            if let Some(name) = body.strip_suffix('?') {
                if validate_name(name).is_ok() {
                    return Self::GetParameter(name.to_string());
                }
            } else if let Some((name, value)) = body.split_once('=') {
                if let Ok(cmd) = Self::set_parameter(name, value) {
                    return cmd;
                }
            }
        }

        Self::Raw(line.to_string())
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ProtocolError::InvalidParameterName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_fixed_commands() {
        assert_eq!(AtCommand::Attention.encode(), b"AT\r\n");
        assert_eq!(AtCommand::Identify.encode(), b"ATI\r\n");
        assert_eq!(AtCommand::WriteEeprom.encode(), b"AT&W\r\n");
    }

    #[test]
    fn test_parameter_commands() {
        let get = AtCommand::get_parameter("3").unwrap();
        assert_eq!(get.text(), "ATS3?");

        let set = AtCommand::set_parameter("3", "25").unwrap();
        assert_eq!(set.text(), "ATS3=25");
        assert!(set.requires_command_mode());
        assert!(!get.requires_command_mode());
    }

    #[test]
    fn test_rejects_bad_parameter_input() {
        assert!(matches!(
            AtCommand::get_parameter(""),
            Err(ProtocolError::InvalidParameterName(_))
        ));
        assert!(matches!(
            AtCommand::get_parameter("3?"),
            Err(ProtocolError::InvalidParameterName(_))
        ));
        assert!(matches!(
            AtCommand::set_parameter("3", "2 5"),
            Err(ProtocolError::InvalidParameterValue { .. })
        ));
        assert!(matches!(
            AtCommand::set_parameter("3", ""),
            Err(ProtocolError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn test_parse_known_shapes() {
        assert_eq!(AtCommand::parse("at"), AtCommand::Attention);
        assert_eq!(AtCommand::parse("ATI "), AtCommand::Identify);
        assert_eq!(AtCommand::parse("at&w"), AtCommand::WriteEeprom);
        assert_eq!(
            AtCommand::parse("ATS12?"),
            AtCommand::GetParameter("12".into())
        );
        assert_eq!(
            AtCommand::parse("ATS3=25"),
            AtCommand::SetParameter {
                name: "3".into(),
                value: "25".into()
            }
        );
        assert_eq!(AtCommand::parse("ATO"), AtCommand::Raw("ATO".into()));
        assert_eq!(AtCommand::parse("ATS=5"), AtCommand::Raw("ATS=5".into()));
    }

    proptest! {
        #[test]
        fn set_parameter_text_parses_back(name in "[A-Za-z0-9_]{1,8}", value in "[0-9]{1,6}") {
            let cmd = AtCommand::set_parameter(&name, &value).unwrap();
            prop_assert_eq!(AtCommand::parse(&cmd.text()), cmd);
        }

        #[test]
        fn encoded_commands_end_with_single_terminator(name in "[A-Za-z0-9_]{1,8}") {
            let bytes = AtCommand::get_parameter(&name).unwrap().encode();
            prop_assert!(bytes.ends_with(b"?\r\n"));
            prop_assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        }
    }
}
