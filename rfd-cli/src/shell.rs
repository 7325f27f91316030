//! Interactive configuration shell
//!
//! Line-oriented: each input line is one command. Modem errors are printed
//! and the shell keeps going; only I/O errors on the terminal end it.

use std::io::{self, BufRead, Write};

use rfd_modem::{ModemClient, Transport};

const INTRO: &str =
    "Welcome to the RFD900 configuration shell. Type help or ? to list commands.";
const PROMPT: &str = "rfd-config> ";

const HELP: &str = "\
Commands:
  info               Display modem information
  get NAME           Get current parameter value
  set NAME VALUE     Set a parameter value and save it
  help               Show this help
  exit               Exit the shell";

/// A parsed shell line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Info,
    Get(String),
    Set { name: String, value: String },
    Help,
    Exit,
    Empty,
    Usage(&'static str),
    Unknown(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Self::Empty;
        };
        let args: Vec<&str> = words.collect();

        match (verb, args.as_slice()) {
            ("info", []) => Self::Info,
            ("get", [name]) => Self::Get(name.to_string()),
            ("get", _) => Self::Usage("get PARAMETER_NAME"),
            ("set", [name, value]) => Self::Set {
                name: name.to_string(),
                value: value.to_string(),
            },
            ("set", _) => Self::Usage("set PARAMETER_NAME VALUE"),
            ("help" | "?", _) => Self::Help,
            ("exit" | "quit", _) => Self::Exit,
            _ => Self::Unknown(verb.to_string()),
        }
    }
}

/// Interactive shell over a modem already in command mode
pub struct RfdShell<'a, T: Transport> {
    client: &'a mut ModemClient<T>,
}

impl<'a, T: Transport> RfdShell<'a, T> {
    pub fn new(client: &'a mut ModemClient<T>) -> Self {
        Self { client }
    }

    /// Read commands until `exit` or end of input
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut out: W) -> io::Result<()> {
        writeln!(out, "{}", INTRO)?;
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        for line in input.lines() {
            if !self.execute(ShellCommand::parse(&line?), &mut out)? {
                return Ok(());
            }
            write!(out, "{}", PROMPT)?;
            out.flush()?;
        }
        writeln!(out)?;
        Ok(())
    }

    /// Execute one command; returns `false` when the shell should stop
    pub fn execute<W: Write>(&mut self, command: ShellCommand, out: &mut W) -> io::Result<bool> {
        match command {
            ShellCommand::Info => {
                writeln!(out, "Fetching modem information...")?;
                match self.client.identify() {
                    Ok(version) => writeln!(out, "Version: {}", version)?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            ShellCommand::Get(name) => match self.client.get_parameter(&name) {
                Ok(response) => {
                    let command = format!("ATS{}?", name);
                    writeln!(
                        out,
                        "Parameter {}: {}",
                        name,
                        response.payload(&command).join(" ")
                    )?
                }
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            ShellCommand::Set { name, value } => match self.client.set_parameter(&name, &value) {
                Ok(()) => writeln!(out, "Set {} to {}", name, value)?,
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            ShellCommand::Help => writeln!(out, "{}", HELP)?,
            ShellCommand::Exit => {
                writeln!(out, "Exiting...")?;
                return Ok(false);
            }
            ShellCommand::Empty => {}
            ShellCommand::Usage(usage) => writeln!(out, "Usage: {}", usage)?,
            ShellCommand::Unknown(verb) => writeln!(out, "*** Unknown syntax: {}", verb)?,
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use rfd_modem::ModemConfig;
    use rfd_sim::{VirtualModem, VirtualModemConfig};

    fn client() -> ModemClient<VirtualModem> {
        let modem = VirtualModem::new(
            "SIM0",
            VirtualModemConfig {
                guard_time: Duration::from_millis(20),
                ..Default::default()
            },
        );
        let mut client = ModemClient::new(
            modem,
            ModemConfig {
                response_timeout: Duration::from_millis(150),
                guard_time: Duration::from_millis(30),
                poll_interval: Duration::from_millis(5),
            },
        );
        assert!(client.enter_command_mode().unwrap());
        client
    }

    fn run(client: &mut ModemClient<VirtualModem>, input: &str) -> String {
        let mut out = Vec::new();
        RfdShell::new(client)
            .run(Cursor::new(input.to_string()), &mut out)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ShellCommand::parse("info"), ShellCommand::Info);
        assert_eq!(ShellCommand::parse("  get 3 "), ShellCommand::Get("3".into()));
        assert_eq!(
            ShellCommand::parse("set 3 42"),
            ShellCommand::Set {
                name: "3".into(),
                value: "42".into()
            }
        );
        assert_eq!(
            ShellCommand::parse("set 3"),
            ShellCommand::Usage("set PARAMETER_NAME VALUE")
        );
        assert_eq!(ShellCommand::parse(""), ShellCommand::Empty);
        assert_eq!(ShellCommand::parse("quit"), ShellCommand::Exit);
        assert_eq!(
            ShellCommand::parse("reboot"),
            ShellCommand::Unknown("reboot".into())
        );
    }

    #[test]
    fn test_info_get_set_session() {
        let mut client = client();
        let output = run(&mut client, "info\nget 3\nset 3 42\nget 3\nexit\n");

        assert!(output.contains("Version: RFD SiK 3.11 on RFD900X"));
        assert!(output.contains("Parameter 3: 25"));
        assert!(output.contains("Set 3 to 42"));
        assert!(output.contains("Parameter 3: 42"));
        assert!(output.trim_end().ends_with("Exiting..."));
        assert_eq!(client.transport().saved_register("3"), Some("42"));
    }

    #[test]
    fn test_errors_do_not_end_session() {
        let mut client = client();
        let output = run(&mut client, "set 99 1\nget 3 4\nhelp\n");

        assert!(output.contains("Error: modem rejected ATS99=1"));
        assert!(output.contains("Usage: get PARAMETER_NAME"));
        assert!(output.contains("set NAME VALUE"));
    }

    #[test]
    fn test_end_of_input_exits() {
        let mut client = client();
        let output = run(&mut client, "");
        assert!(output.starts_with(INTRO));
    }
}
