use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use world_probe::prober::TcpProber;
use world_probe::registry::Registry;
use world_probe::scanner::{
    FleetScanner, DEFAULT_CONCURRENCY, DEFAULT_PROBE_INTERVAL_SECS, DISABLED_CHANNEL_COUNT,
};
use world_probe::{publish, server};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// world-probe — one-shot TCP reachability probe of game-world login and channel servers.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "world-probe",
    version,
    about = "Probe game-world login and channel servers once and publish a JSON status snapshot.",
    long_about = None
)]
struct Cli {
    /// Registry JSON file. If omitted, the built-in registry is used.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Snapshot file to publish (or serve).
    #[arg(long, global = true, default_value = publish::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Per-endpoint connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Probe cadence advertised in the snapshot, in seconds.
    #[arg(long = "probe-interval-secs", default_value_t = DEFAULT_PROBE_INTERVAL_SECS)]
    probe_interval_secs: u64,

    /// Max concurrent TCP connect attempts across the whole run.
    ///
    /// The timeout applies per attempt once it starts, so a value below the registry's
    /// endpoint count makes the run take up to ceil(endpoints / concurrency) timeouts.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Log filter (trace, debug, info, warn, error, or an env-filter directive).
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Load and validate the registry without probing.
    Validate,

    /// Expose the published snapshot over HTTP until Ctrl+C.
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command.clone() {
        Some(Commands::Validate) => cmd_validate(&cli),
        Some(Commands::Serve { bind }) => cmd_serve(&bind, cli.output.clone()).await,
        None => cmd_probe(&cli).await,
    }
}

fn load_registry(path: Option<&Path>) -> Result<Registry> {
    match path {
        Some(p) => Registry::from_path(p)
            .with_context(|| format!("invalid registry: {}", p.display())),
        None => Registry::builtin().context("invalid built-in registry"),
    }
}

async fn cmd_probe(cli: &Cli) -> Result<()> {
    info!(
        registry = %cli
            .registry
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<built-in>".to_string()),
        output = %cli.output.display(),
        timeout_ms = cli.timeout_ms,
        concurrency = cli.concurrency,
        "Starting server probe"
    );

    let registry = load_registry(cli.registry.as_deref())?;
    let scanner = FleetScanner::new(Arc::new(TcpProber), Duration::from_millis(cli.timeout_ms))
        .with_concurrency(cli.concurrency)
        .with_probe_interval(cli.probe_interval_secs);

    let snapshot = scanner.build_snapshot(&registry).await?;

    publish::write_snapshot(&cli.output, &snapshot)
        .with_context(|| format!("failed to publish snapshot to {}", cli.output.display()))?;
    info!("Results written to {}", cli.output.display());
    publish::log_summary(&snapshot);
    Ok(())
}

fn cmd_validate(cli: &Cli) -> Result<()> {
    let registry = load_registry(cli.registry.as_deref())?;
    let disabled = registry.disabled_groups()?;

    let mut id_w = "id".len();
    let mut name_w = "name".len();
    let mut login_w = "login".len();
    for g in registry.enabled_groups() {
        id_w = id_w.max(g.id.len());
        name_w = name_w.max(g.display_name.len());
        login_w = login_w.max(g.login.to_string().len());
    }
    for d in &disabled {
        id_w = id_w.max(d.id.len());
        name_w = name_w.max(d.display_name.len());
    }

    println!("Registry OK: {} endpoint(s) to probe", registry.endpoint_count());
    println!(
        "{:<id_w$}  {:<name_w$}  {:<login_w$}  {:>8}  {}",
        "id", "name", "login", "channels", "state",
    );
    println!(
        "{:-<id_w$}  {:-<name_w$}  {:-<login_w$}  {:-<8}  {:-<8}",
        "", "", "", "", "",
    );
    for g in registry.enabled_groups() {
        println!(
            "{:<id_w$}  {:<name_w$}  {:<login_w$}  {:>8}  {}",
            g.id,
            g.display_name,
            g.login.to_string(),
            g.channels.len(),
            "enabled",
        );
    }
    for d in &disabled {
        println!(
            "{:<id_w$}  {:<name_w$}  {:<login_w$}  {:>8}  {}",
            d.id, d.display_name, "-", DISABLED_CHANNEL_COUNT, "disabled",
        );
    }
    Ok(())
}

async fn cmd_serve(bind: &str, output: PathBuf) -> Result<()> {
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });
    server::spawn_server(bind, output, cancel).await
}
