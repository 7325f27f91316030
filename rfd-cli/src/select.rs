//! Modem selection when discovery finds more than one

use std::io::{self, BufRead, Write};

use rfd_modem::DiscoveredModem;

/// Pick one of `modems`, prompting on `input` when there is a choice
///
/// Returns `None` when `modems` is empty or the input ends before a valid
/// choice is made.
pub fn choose_modem<R: BufRead, W: Write>(
    modems: &[DiscoveredModem],
    mut input: R,
    mut out: W,
) -> io::Result<Option<usize>> {
    match modems.len() {
        0 => return Ok(None),
        1 => return Ok(Some(0)),
        _ => {}
    }

    writeln!(out, "Multiple modems detected:")?;
    for (i, modem) in modems.iter().enumerate() {
        writeln!(out, "{}. {} - {}", i + 1, modem.port, first_line(&modem.version))?;
    }

    loop {
        write!(out, "Select a modem (1-{}): ", modems.len())?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=modems.len()).contains(&n) => return Ok(Some(n - 1)),
            _ => writeln!(out, "Error: enter a number between 1 and {}", modems.len())?,
        }
    }
}

/// Version text may include the echoed `ATI`; show the banner line
fn first_line(version: &str) -> &str {
    version
        .lines()
        .find(|l| !l.is_empty() && *l != "ATI")
        .unwrap_or(version)
}
