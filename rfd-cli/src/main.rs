//! RFD900 Configuration Tool
//!
//! Finds an RFD900 modem (or uses the one named with `--port`), switches it
//! into command mode and opens an interactive shell for reading and writing
//! its registers.

mod select;
mod settings;
mod shell;

use std::io;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use rfd_modem::{
    detect_modems_with, ModemClient, PortScanner, ProbeConfig, SerialOpener, SerialTransport,
};
use settings::Settings;
use shell::RfdShell;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "rfd-config", about = "RFD900 Configuration Tool")]
struct Cli {
    /// Serial port of the modem (discovered when omitted)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate
    #[arg(long)]
    baud_rate: Option<u32>,

    /// Command timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Enable verbose logging
    #[arg(long, default_value_t = false)]
    verbose: bool,

    /// List detected modems and exit
    #[arg(long, default_value_t = false)]
    scan: bool,

    /// Print the scan result as JSON
    #[arg(long, default_value_t = false, requires = "scan")]
    json: bool,

    /// Store the effective baud rate and timeout as defaults
    #[arg(long, default_value_t = false)]
    save_defaults: bool,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("rfd_config=debug,rfd_modem=debug,rfd_protocol=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "rfd_config=info,rfd_modem=info,rfd_protocol=info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load();
    if let Some(baud_rate) = cli.baud_rate {
        settings.baud_rate = baud_rate;
    }
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    let timeout = Duration::try_from_secs_f64(settings.timeout_secs)
        .with_context(|| format!("invalid timeout {}", settings.timeout_secs))?;

    if cli.save_defaults {
        match settings.save() {
            Ok(path) => info!("Saved defaults to {}", path.display()),
            Err(e) => error!("{}", e),
        }
    }

    let probe = ProbeConfig::new(settings.baud_rate, timeout);
    let scanner = PortScanner::with_config(settings.scanner_config());

    if cli.scan {
        let modems = detect_modems_with(&scanner, probe)?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&modems)?);
        } else if modems.is_empty() {
            println!("No RFD900 modems detected.");
        } else {
            for modem in &modems {
                println!("{}\t{}", modem.port, modem.version.replace('\n', " | "));
            }
        }
        return Ok(());
    }

    let port = match cli.port {
        Some(port) => port,
        None => {
            let modems = detect_modems_with(&scanner, probe.clone())?;
            if modems.is_empty() {
                error!("No RFD900 modems detected.");
                return Ok(());
            }
            let stdin = io::stdin();
            match select::choose_modem(&modems, stdin.lock(), io::stdout())? {
                Some(i) => modems[i].port.clone(),
                None => return Ok(()),
            }
        }
    };

    let mut client = ModemClient::connect(&SerialOpener, &port, &probe.link, probe.modem)
        .with_context(|| format!("cannot use {}", port))?;
    let outcome = run_session(&mut client);
    client.disconnect();
    outcome
}

fn run_session(client: &mut ModemClient<SerialTransport>) -> anyhow::Result<()> {
    if !client.enter_command_mode()? {
        bail!("modem on {} did not enter command mode", client.port());
    }

    let stdin = io::stdin();
    RfdShell::new(client).run(stdin.lock(), io::stdout())?;
    Ok(())
}
