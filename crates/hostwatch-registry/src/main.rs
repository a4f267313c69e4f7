//! CLI entry point: replay recorded sweeps through a host registry.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use ipnet::IpNet;
use tracing_subscriber::{fmt, EnvFilter};

use hostwatch_alias::FileAliasStore;
use hostwatch_core::{Endpoint, Interface, MacAddr, RegistryConfig};
use hostwatch_registry::replay::ReplaySource;
use hostwatch_registry::{HostRegistry, SweepScheduler};

#[derive(Parser)]
#[command(name = "hostwatch-replay")]
#[command(about = "Replay recorded discovery sweeps through the hostwatch registry")]
struct Cli {
    /// Local interface address with prefix (e.g., 192.168.1.10/24).
    #[arg(long)]
    iface: IpNet,

    /// Local interface hardware address.
    #[arg(long)]
    iface_mac: String,

    /// Gateway address.
    #[arg(long)]
    gateway_ip: IpAddr,

    /// Gateway hardware address.
    #[arg(long)]
    gateway_mac: String,

    /// JSON-lines file with one sweep per line.
    #[arg(short, long)]
    input: PathBuf,

    /// Override the alias file location.
    #[arg(long)]
    aliases: Option<PathBuf>,

    /// Config file prefix (default: hostwatch).
    #[arg(short, long, default_value = "hostwatch")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut config = RegistryConfig::load(&cli.config)?;
    if cli.aliases.is_some() {
        config.alias_file = cli.aliases.clone();
    }

    let iface_mac: MacAddr = cli.iface_mac.parse()?;
    let gateway_mac: MacAddr = cli.gateway_mac.parse()?;
    let interface = Interface::new(cli.iface, iface_mac);
    let gateway = Endpoint::new(cli.gateway_ip, gateway_mac);

    let alias_path = config.alias_path();
    tracing::info!(
        iface = %cli.iface,
        gateway = %cli.gateway_ip,
        aliases = %alias_path.display(),
        max_liveness = config.max_liveness,
        sweep_interval_ms = config.sweep_interval_ms,
        "Starting registry"
    );

    let registry = Arc::new(HostRegistry::with_config(
        &config,
        interface,
        gateway,
        Arc::new(FileAliasStore::new(alias_path)),
        |e| tracing::info!(mac = %e.mac, ip = %e.ip, name = %e.display_name(), "Endpoint detected"),
        |e| tracing::info!(mac = %e.mac, ip = %e.ip, name = %e.display_name(), "Endpoint lost"),
    ));

    let source = ReplaySource::open(&cli.input).await?;
    let totals = SweepScheduler::new(registry.clone(), source, &config)
        .run()
        .await;

    tracing::info!(
        observed = totals.observed,
        new = totals.new,
        missed = totals.missed,
        "Replay complete"
    );

    let mut hosts = registry.list();
    hosts.sort_by_key(|e| e.ip);
    println!("{}", serde_json::to_string_pretty(&hosts)?);

    Ok(())
}
