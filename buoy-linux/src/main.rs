// Buoy Linux: election daemon over a simulated radio link.

mod config;
mod election;
mod logging;
mod radio;

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use buoy_core::{BuoyNode, HardwareAddress, Role};
use clap::Parser;
use tracing::{error, info};

use crate::logging::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "buoy-linux", version, about = "Buoy master election and id assignment daemon")]
struct Cli {
    /// Config file (default: ~/.config/buoy/config.toml, then /etc/buoy/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Hardware address of this buoy, e.g. 24:6F:28:00:00:01.
    #[arg(long)]
    address: Option<HardwareAddress>,
    /// UDP port of the simulated radio channel.
    #[arg(long)]
    port: Option<u16>,
    /// Multicast group of the simulated radio channel.
    #[arg(long)]
    group: Option<Ipv4Addr>,
    /// Milliseconds to wait for a master before taking the role.
    #[arg(long)]
    bootstrap_ms: Option<u64>,
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging("info", cli.log_format.unwrap_or_default());

    let mut cfg = config::load(cli.config.as_deref())?;
    if let Some(p) = cli.port {
        cfg.radio_port = p;
    }
    if let Some(g) = cli.group {
        cfg.group = g;
    }
    if let Some(ms) = cli.bootstrap_ms {
        cfg.bootstrap_ms = ms;
    }
    if let Some(a) = cli.address {
        cfg.address = Some(a);
    }

    let address = cfg.address.unwrap_or_else(HardwareAddress::random_local);
    let node = Arc::new(tokio::sync::Mutex::new(BuoyNode::new(address)));
    info!(%address, group = %cfg.group, port = cfg.radio_port, "starting buoy");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let radio = Arc::new(
            radio::Radio::open(cfg.group, cfg.radio_port).context("opening radio link")?,
        );

        let recv_radio = radio.clone();
        let recv_node = node.clone();
        tokio::spawn(async move {
            if let Err(e) = radio::recv_loop(recv_radio, recv_node).await {
                error!(error = %e, "radio receive failed");
            }
        });

        let boot_node = node.clone();
        let window = Duration::from_millis(cfg.bootstrap_ms);
        tokio::spawn(async move {
            match election::run_bootstrap(radio, boot_node, window).await {
                Ok(role) => info!(%role, "bootstrap finished"),
                Err(e) => error!(error = %e, "bootstrap failed"),
            }
        });

        shutdown_signal().await?;

        let node = node.lock().await;
        if node.role() == Role::Master {
            if let Some(registry) = node.registry() {
                info!("shutting down\n{}", registry);
            }
        }
        anyhow::Ok(())
    })?;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => r?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
