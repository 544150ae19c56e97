//! NTCIP control-center entry point.
//!
//! Connects to one field device, runs the requested commands in order over
//! the same connection, and prints each outcome.
//!
//! ```text
//! ntcip-center --host 127.0.0.1 --port 5000 --address 1 reset
//! ntcip-center time-sync
//! ntcip-center test-nak
//! ntcip-center send "0F 10 52 52"
//! ntcip-center all            -- reset, time-sync, test-nak
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ntcip_center::application::commands::{parse_hex, to_hex, Command};
use ntcip_center::infrastructure::network::{CenterClient, Outcome};

#[derive(Debug, Parser)]
#[command(name = "ntcip-center", version, about = "NTCIP control-center client")]
struct Args {
    /// Device host.
    #[arg(long, default_value = "127.0.0.1", env = "NTCIP_CENTER_HOST")]
    host: IpAddr,

    /// Device TCP port.
    #[arg(short, long, default_value_t = 5000, env = "NTCIP_CENTER_PORT")]
    port: u16,

    /// Device address written into each frame.
    #[arg(short, long, default_value_t = 1, env = "NTCIP_CENTER_ADDRESS")]
    address: u16,

    /// Bound on connecting and on each handshake step, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Send a reset request (0F 10 52 52).
    Reset,
    /// Send a time-sync request with the local wall-clock time.
    TimeSync,
    /// Send a frame with a wrong length and checksum and report the Nak.
    TestNak {
        #[arg(long, default_value_t = 0)]
        seq: u8,
    },
    /// Send an arbitrary payload given as hex, e.g. "0F 10 52 52".
    Send { payload: String },
    /// Reset, time-sync, then test-nak on one connection.
    All,
}

impl Action {
    fn commands(&self) -> anyhow::Result<Vec<Command>> {
        let now = Local::now().naive_local();
        Ok(match self {
            Action::Reset => vec![Command::Reset],
            Action::TimeSync => vec![Command::time_sync_at(&now)],
            Action::TestNak { seq } => vec![Command::TestNak { seq: *seq }],
            Action::Send { payload } => {
                vec![Command::Send(parse_hex(payload).context("parsing payload")?)]
            }
            Action::All => vec![
                Command::Reset,
                Command::time_sync_at(&now),
                Command::TestNak { seq: 0 },
            ],
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.  Level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let commands = args.action.commands()?;
    let addr = SocketAddr::new(args.host, args.port);
    let step = Duration::from_millis(args.timeout_ms);

    let mut client = CenterClient::connect(addr, step)
        .await
        .with_context(|| format!("connecting to {addr}"))?;

    let mut failures = 0usize;
    for command in &commands {
        match client.execute(args.address, command).await {
            Ok(Outcome::Reply(reply)) => info!("{command}: {reply}"),
            Ok(Outcome::TestAnswer(frame)) => match frame.nak_byte() {
                Some(code) => info!("{command}: device answered Nak code 0x{code:02X}"),
                None => info!("{command}: device answered {} frame {}", frame.kind, to_hex(&frame.payload)),
            },
            Err(e) => {
                error!("{command}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} command(s) failed", commands.len());
    }
    Ok(())
}
