//! GPU Pulse - GPU telemetry binary
//!
//! Samples GPU telemetry and serves it as a terminal view, a Prometheus
//! endpoint and a web dashboard.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gpu_pulse::{
    render_cycle, select_source, ActiveSource, AppState, DashboardState, MetricSource,
    MetricsRegistry, MonitorConfig, NvmlSource, Sampler, SourceKind, SourceMode, SyntheticSource,
    TerminalPublisher, WebConfig, WebServer, DEFAULT_INTERVAL_MS, DEFAULT_WEB_PORT,
};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "gpu_pulse")]
#[command(about = "GPU Pulse - GPU telemetry sampler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    long_about = "Samples GPU utilization, memory, power, PCIe throughput and clocks, \
                  and serves them as a terminal view, a Prometheus endpoint and a web dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0", global = true)]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT, global = true)]
    port: u16,

    /// Sampling interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS, global = true)]
    interval: u64,

    /// Metric source: auto falls back to synthetic when no driver is found
    #[arg(long, value_enum, default_value_t = SourceMode::Auto, global = true)]
    source: SourceMode,

    /// Number of devices exposed by the synthetic source
    #[arg(long, default_value_t = 1, global = true)]
    synthetic_devices: u32,

    /// Jitter seed for the synthetic source
    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Pause after announcing a synthetic fallback, in milliseconds
    #[arg(long, default_value_t = 2000, global = true)]
    fallback_grace_ms: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample continuously and serve metrics (default)
    Serve(ServeArgs),

    /// Take a single sample and exit
    Snapshot(SnapshotArgs),

    /// Show driver and device information
    Info,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Do not render the terminal view
    #[arg(long)]
    no_terminal: bool,

    /// Redraw the terminal view without clearing the screen
    #[arg(long)]
    no_clear: bool,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await,
        Some(Commands::Info) => info_command(&cli).await,
        None => serve_command(&cli, &ServeArgs::default()).await,
    }
}

fn log_level(cli: &Cli) -> Level {
    if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// `RUST_LOG` wins when set; otherwise the level picked on the command line.
fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn log_subscriber(filter: EnvFilter) -> impl tracing::Subscriber + Send + Sync + 'static {
    // stderr, so the terminal view on stdout is not scrolled away
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .finish()
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let subscriber = log_subscriber(log_filter(log_level(cli)));
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn print_banner() {
    println!("GPU Pulse - GPU Telemetry Sampler");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!();
}

fn monitor_config(cli: &Cli) -> MonitorConfig {
    MonitorConfig::default()
        .with_interval_ms(cli.interval)
        .with_source_mode(cli.source)
        .with_synthetic_devices(cli.synthetic_devices)
        .with_seed(cli.seed)
        .with_fallback_grace_ms(cli.fallback_grace_ms)
}

/// Initialize the source once, reporting the outcome to the operator.
async fn open_source(config: &MonitorConfig) -> anyhow::Result<ActiveSource> {
    let selection = select_source(config.source_mode, NvmlSource::initialize, || {
        SyntheticSource::new(config.synthetic_devices).with_seed(config.seed)
    })
    .context("No usable GPU source (is the NVIDIA driver installed?)")?;

    let mut source = selection.source;
    match (&selection.fallback_reason, source.kind()) {
        (Some(reason), _) => {
            println!("No NVIDIA driver detected: {}", reason);
            println!("   - Is the NVIDIA driver installed?");
            println!(
                "   - Continuing with {} synthetic device(s)",
                config.synthetic_devices
            );
            tokio::time::sleep(config.fallback_grace()).await;
        }
        (None, SourceKind::Hardware) => {
            let count = source.devices().map(|d| d.len()).unwrap_or(0);
            println!(
                "NVIDIA driver detected: {}",
                source.driver_version().unwrap_or("unknown")
            );
            println!("Found {} GPU(s)", count);
        }
        (None, SourceKind::Synthetic) => {
            println!(
                "Using {} synthetic device(s)",
                config.synthetic_devices
            );
        }
    }

    Ok(source)
}

async fn serve_command(cli: &Cli, args: &ServeArgs) -> anyhow::Result<()> {
    print_banner();

    let config = monitor_config(cli)
        .with_terminal(!args.no_terminal)
        .with_clear_screen(!args.no_clear);
    config.validate()?;

    let source = open_source(&config).await?;

    let registry = MetricsRegistry::new()?;
    let dashboard = DashboardState::new();

    let web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);
    let state = AppState::new(registry.clone(), dashboard.clone(), config.refresh_secs());
    let server = WebServer::bind(&web_config, state).await?;
    println!("Dashboard: http://{}/", server.local_addr());
    println!("Metrics:   http://{}/metrics", server.local_addr());
    let server = server.spawn();

    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config.bind_address());
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Sampling interval: {}ms", config.interval_ms);

    let mut sampler = Sampler::new(source, config.interval())?;
    if config.terminal {
        sampler = sampler
            .with_publisher(TerminalPublisher::stdout().with_clear_screen(config.clear_screen));
    }
    let sampler = sampler
        .with_publisher(registry)
        .with_publisher(dashboard)
        .spawn();

    shutdown_signal().await;
    info!("Received shutdown signal");

    let summary = sampler.stop().await?;
    server.shutdown().await?;

    println!();
    println!(
        "Stopped after {} cycle(s) ({} probe failure(s), {} publisher failure(s))",
        summary.cycles, summary.probe_failures, summary.publish_failures
    );

    Ok(())
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let config = monitor_config(cli).with_fallback_grace_ms(0);
    config.validate()?;

    let source = open_source(&config).await?;
    let mut sampler = Sampler::new(source, config.interval())?;
    let cycle = sampler.sample();
    sampler.finish();

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&cycle)?);
        }
        "pretty" => {
            print!("{}", render_cycle(&cycle));
        }
        other => {
            anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other);
        }
    }

    Ok(())
}

async fn info_command(cli: &Cli) -> anyhow::Result<()> {
    println!("GPU Pulse Device Information");
    println!("============================");
    println!();

    let config = monitor_config(cli).with_fallback_grace_ms(0);
    config.validate()?;

    let mut source = open_source(&config).await?;
    let details = source.describe()?;

    println!();
    println!("Source: {}", source.kind());
    if let Some(version) = source.driver_version() {
        println!("Driver: {}", version);
    }
    println!("Found {} GPU(s):", details.len());

    for detail in &details {
        println!(
            "   [{}] {} (PCIe: {})",
            detail.device.index,
            detail.device.name,
            detail.pci_bus_id.as_deref().unwrap_or("n/a")
        );
        println!(
            "       VRAM: {:.1} / {:.1} GB",
            detail.memory_used_gb, detail.memory_total_gb
        );
    }

    source.release();

    println!();
    println!("Features compiled:");
    #[cfg(feature = "nvml")]
    println!("  - NVML support: yes");
    #[cfg(not(feature = "nvml"))]
    println!("  - NVML support: no");

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
