// btirc: IRC-style chat over Bluetooth RFCOMM. No arguments: discover nearby devices.
// One argument: open a chat with that address (btspp://98D3318041DE:1).

mod address;
#[cfg(feature = "bluez")]
mod bluez;
mod config;
mod tcp;

use std::process::ExitCode;

use anyhow::Context;
use btirc_core::{
    open_connection, Connector, Device, DiscoveryAgent, DiscoveryCoordinator, SessionError,
    Transcript,
};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Backend;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the command line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Discover,
    Session(String),
    Usage,
}

impl Mode {
    fn from_args(args: &[String]) -> Mode {
        match args {
            [] => Mode::Discover,
            [address] => Mode::Session(address.clone()),
            _ => Mode::Usage,
        }
    }
}

/// `--version` / `-V` as the only argument.
fn wants_version(args: &[String]) -> bool {
    matches!(args, [flag] if flag == "--version" || flag == "-V")
}

/// How a run ended; mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    ConnectFailed,
}

impl Outcome {
    fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Completed => ExitCode::SUCCESS,
            Outcome::ConnectFailed => ExitCode::from(1),
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if wants_version(&args) {
        println!("btirc {}", VERSION);
        return ExitCode::SUCCESS;
    }

    let mode = Mode::from_args(&args);
    let cfg = config::load();
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("btirc: could not start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let result = rt.block_on(run(mode, cfg));
    // A pending stdin read sits on a blocking thread; don't wait for it.
    rt.shutdown_background();
    match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprintln!("btirc: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BTIRC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(mode: Mode, cfg: config::Config) -> anyhow::Result<Outcome> {
    let transcript = Transcript::console();
    let stdin = BufReader::new(tokio::io::stdin());
    debug!(
        backend = ?cfg.backend,
        adapter = ?cfg.adapter,
        inquiry = ?cfg.inquiry_duration(),
        "config loaded"
    );
    match cfg.backend {
        Backend::Tcp => {
            let transport = tcp::TcpTransport::new(cfg.tcp.clone());
            with_shutdown(dispatch(&transport, mode, &cfg, transcript, stdin)).await
        }
        #[cfg(feature = "bluez")]
        Backend::Bluez => {
            let transport =
                bluez::BluezTransport::new(cfg.adapter.as_deref(), cfg.inquiry_duration())
                    .await
                    .context("Bluetooth adapter unavailable")?;
            with_shutdown(dispatch(&transport, mode, &cfg, transcript, stdin)).await
        }
        #[cfg(not(feature = "bluez"))]
        Backend::Bluez => Err(btirc_core::TransportError::Unavailable(
            "built without BlueZ support (enable the `bluez` feature or set backend = \"tcp\")"
                .into(),
        ))
        .context("Bluetooth adapter unavailable"),
    }
}

/// Run until the mode finishes or the process is asked to stop.
async fn with_shutdown(
    work: impl std::future::Future<Output = anyhow::Result<Outcome>>,
) -> anyhow::Result<Outcome> {
    tokio::select! {
        r = work => r,
        _ = shutdown_signal() => {
            debug!("shutdown requested");
            Ok(Outcome::Completed)
        }
    }
}

/// Wait for Ctrl+C or SIGTERM. A handler that can't be installed is logged and skipped.
async fn shutdown_signal() {
    let sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, waiting on Ctrl+C only");
            None
        }
    };
    wait_for_shutdown(sigterm, tokio::signal::ctrl_c()).await
}

async fn wait_for_shutdown(
    sigterm: Option<Signal>,
    ctrl_c: impl std::future::Future<Output = std::io::Result<()>>,
) {
    let term = async {
        match sigterm {
            Some(mut s) => {
                s.recv().await;
            }
            None => std::future::pending().await,
        }
    };
    let interrupt = async {
        if let Err(e) = ctrl_c.await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = term => {}
        _ = interrupt => {}
    }
}

/// Print the local identity banner, then run the requested mode.
async fn dispatch<T, I>(
    transport: &T,
    mode: Mode,
    cfg: &config::Config,
    transcript: Transcript,
    input: I,
) -> anyhow::Result<Outcome>
where
    T: Device + DiscoveryAgent + Connector,
    I: AsyncBufRead + Unpin,
{
    print_banner(transport, &transcript).await?;
    match mode {
        Mode::Discover => {
            let mut coordinator = DiscoveryCoordinator::new(transcript);
            let summary = coordinator.start_discovery(transport).await?;
            debug!(devices = summary.devices, status = summary.status, "discovery finished");
            Ok(Outcome::Completed)
        }
        Mode::Session(address) => {
            match open_connection(
                transport,
                transport,
                &address,
                input,
                transcript,
                cfg.session.clone(),
            )
            .await
            {
                Ok(end) => {
                    debug!(lines_sent = end.lines_sent, "session finished");
                    Ok(Outcome::Completed)
                }
                Err(e @ SessionError::Connect { .. }) => {
                    debug!(error = %e, "connect failed");
                    Ok(Outcome::ConnectFailed)
                }
                Err(e) => Err(e.into()),
            }
        }
        Mode::Usage => {
            print_usage(&transcript);
            Ok(Outcome::Completed)
        }
    }
}

async fn print_banner<D>(local: &D, transcript: &Transcript) -> anyhow::Result<()>
where
    D: Device + ?Sized,
{
    let name = local
        .friendly_name()
        .await
        .context("could not read local device name")?;
    transcript.line("----------- LOCAL DEVICE INFORMATION -----------");
    transcript.line(format!("Address: {}", local.address()));
    transcript.line(format!("Name: {}", name));
    Ok(())
}

fn print_usage(transcript: &Transcript) {
    transcript.error("Usage:");
    transcript.error("<no-args> -> starts device discovery");
    transcript.error("<bluetooth-address> -> opens IRC chat with that device through Bluetooth");
}
