//! Command responses
//!
//! Responses carry no length prefix or framing. The only end markers are the
//! literal lines `OK` and `ERROR`, and some commands (notably `ATI`) never
//! emit either. A [`CommandResult`] therefore holds whatever lines arrived and
//! leaves the interpretation to the caller.

use std::fmt;

use tracing::trace;

/// Literal line that ends a command's response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalToken {
    /// `OK`
    Ok,
    /// `ERROR`
    Error,
}

impl TerminalToken {
    /// Match a line exactly against the terminal tokens
    pub fn parse(line: &str) -> Option<Self> {
        match line {
            "OK" => Some(Self::Ok),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Wire text of the token
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
        }
    }
}

/// Caller-side reading of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Last line was `OK`
    Ok,
    /// Last line was `ERROR`
    Error,
    /// No terminal token arrived (timeout, or a command that never sends one)
    Incomplete,
}

/// Accumulated response text for one issued command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    lines: Vec<String>,
}

impl CommandResult {
    /// Empty result (fire-and-forget commands, or nothing received)
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result from already-received lines
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a received line, returning the terminal token if the line is one
    pub fn push_line(&mut self, line: impl Into<String>) -> Option<TerminalToken> {
        let line = line.into();
        let token = TerminalToken::parse(&line);
        self.lines.push(line);
        token
    }

    /// Received lines in arrival order
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when nothing was received
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines joined by `\n`
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Substring test for `OK` anywhere in the joined text
    ///
    /// This is the command-mode verification rule. It is deliberately looser
    /// than [`CommandResult::status`]: an `ERROR` followed by an unrelated
    /// `OK` still passes.
    pub fn contains_ok(&self) -> bool {
        self.lines.iter().any(|line| line.contains("OK"))
    }

    /// Terminal token, if the last line is exactly one
    pub fn terminal(&self) -> Option<TerminalToken> {
        self.lines.last().and_then(|line| TerminalToken::parse(line))
    }

    /// Status derived from the terminal token
    pub fn status(&self) -> ResponseStatus {
        match self.terminal() {
            Some(TerminalToken::Ok) => ResponseStatus::Ok,
            Some(TerminalToken::Error) => ResponseStatus::Error,
            None => ResponseStatus::Incomplete,
        }
    }

    /// Response body: lines minus the command echo and the terminal token
    ///
    /// SiK firmware echoes each command back before answering; `command` is
    /// the text that was sent so the echo can be recognised.
    pub fn payload(&self, command: &str) -> Vec<&str> {
        let mut lines: Vec<&str> = self.lines.iter().map(String::as_str).collect();
        if self.terminal().is_some() {
            lines.pop();
        }
        lines.retain(|line| {
            let echo = !command.is_empty() && *line == command;
            if echo {
                trace!("Dropping echo of {:?}", command);
            }
            !echo && !line.is_empty()
        });
        lines
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_token_exact_match() {
        assert_eq!(TerminalToken::parse("OK"), Some(TerminalToken::Ok));
        assert_eq!(TerminalToken::parse("ERROR"), Some(TerminalToken::Error));
        assert_eq!(TerminalToken::parse("OK "), None);
        assert_eq!(TerminalToken::parse("ok"), None);
        assert_eq!(TerminalToken::parse("NOT OK"), None);
    }

    #[test]
    fn test_push_line_reports_terminal() {
        let mut result = CommandResult::new();
        assert_eq!(result.push_line("AT"), None);
        assert_eq!(result.push_line("OK"), Some(TerminalToken::Ok));
        assert_eq!(result.text(), "AT\nOK");
    }

    #[test]
    fn test_empty_result() {
        let result = CommandResult::new();
        assert!(result.is_empty());
        assert_eq!(result.text(), "");
        assert!(!result.contains_ok());
        assert_eq!(result.status(), ResponseStatus::Incomplete);
    }

    #[test]
    fn test_contains_ok_is_substring_based() {
        let error_then_ok = CommandResult::from_lines(["ERROR", "BOOT OK"]);
        assert!(error_then_ok.contains_ok());
        assert_eq!(error_then_ok.status(), ResponseStatus::Incomplete);

        let error_only = CommandResult::from_lines(["AT", "ERROR"]);
        assert!(!error_only.contains_ok());
        assert_eq!(error_only.status(), ResponseStatus::Error);
    }

    #[test]
    fn test_payload_strips_echo_and_terminal() {
        let result = CommandResult::from_lines(["ATI", "RFD SiK 3.11 on RFD900X", "OK"]);
        assert_eq!(result.payload("ATI"), vec!["RFD SiK 3.11 on RFD900X"]);

        let no_echo = CommandResult::from_lines(["57"]);
        assert_eq!(no_echo.payload("ATS1?"), vec!["57"]);
    }
}
