//! NTCIP field-device entry point.
//!
//! Loads the configuration, applies command-line overrides, and runs the TCP
//! listener until Ctrl-C.
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML file or defaults
//!  └─ Dispatcher             -- reset + time-sync routes, system clock
//!  └─ Listener::bind()
//!       └─ run(running)      -- one task per control center
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ntcip_core::session::TracingSink;
use ntcip_device::application::clock::SystemClock;
use ntcip_device::application::dispatch::Dispatcher;
use ntcip_device::infrastructure::network::{AllowList, Listener, SessionSettings};
use ntcip_device::infrastructure::storage::config::{load_config, save_config, DeviceConfig};

#[derive(Debug, Parser)]
#[command(name = "ntcip-device", version, about = "NTCIP field-device server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "NTCIP_DEVICE_CONFIG")]
    config: Option<PathBuf>,

    /// TCP port to listen on (overrides `network.port`).
    #[arg(short, long, env = "NTCIP_DEVICE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides `network.bind_address`).
    #[arg(short, long, env = "NTCIP_DEVICE_BIND")]
    bind: Option<IpAddr>,

    /// Device address answered on the link (overrides `device.address`).
    #[arg(short, long, env = "NTCIP_DEVICE_ADDRESS")]
    address: Option<u16>,

    /// Accept connections from any control center (test mode).
    #[arg(long)]
    allow_any: bool,

    /// Write the effective configuration to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_config: Option<PathBuf>,
}

impl Args {
    fn apply(&self, cfg: &mut DeviceConfig) {
        if let Some(port) = self.port {
            cfg.network.port = port;
        }
        if let Some(bind) = self.bind {
            cfg.network.bind_address = bind.to_string();
        }
        if let Some(address) = self.address {
            cfg.device.address = address;
        }
        if self.allow_any {
            cfg.security.allow_any = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut cfg = load_config(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut cfg);

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.device.log_level)),
        )
        .init();

    if let Some(path) = &args.write_config {
        save_config(&cfg, path)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        info!("configuration written to {}", path.display());
        return Ok(());
    }

    info!("NTCIP device starting");

    let addr = cfg.bind_addr().context("resolving bind address")?;
    let allow = if cfg.security.allow_any {
        info!("test mode: accepting connections from any control center");
        AllowList::any()
    } else {
        AllowList::only(cfg.allowed_centers().context("parsing allow-list")?)
    };
    let settings = SessionSettings {
        address: cfg.address_check(),
        ack_timeout: cfg.ack_timeout(),
        assembly_gap: cfg.assembly_gap(),
    };

    let dispatcher = Arc::new(Dispatcher::with_default_routes(Arc::new(SystemClock)));
    let listener = Listener::bind(addr, allow, dispatcher, Arc::new(TracingSink), settings)
        .await
        .with_context(|| format!("binding {addr}"))?;

    // Shutdown flag shared with the accept loop.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!(device_address = cfg.device.address, "device ready.  Press Ctrl-C to exit.");
    listener.run(running).await.context("accept loop failed")?;

    info!("NTCIP device stopped");
    Ok(())
}
