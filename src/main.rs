use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use uvcpreview::config::DEFAULT_CONFIG_TOML;
use uvcpreview::events::{EventFilter, SessionEvent};
use uvcpreview::simulated::{ControlBlockLedger, SimulatedCameraFactory, SimulatedDeviceMonitor};
use uvcpreview::{EventBusError, PreviewConfig, PreviewOrchestrator, Scenario, ScenarioPlayer};

#[derive(Parser, Debug)]
#[command(name = "uvcpreview")]
#[command(about = "External USB camera preview session host")]
#[command(version)]
#[command(long_about = "Hosts a single external UVC camera preview session. \
Runs a scripted scenario against simulated USB collaborators, prints the session \
events as they happen and the final session snapshot as JSON.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "uvcpreview.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Scenario to play; the built-in demo runs when omitted
    #[arg(long, value_name = "FILE", help = "TOML scenario of simulated device and surface events")]
    scenario: Option<String>,

    /// Keep running after the scenario until SIGINT/SIGTERM
    #[arg(long, help = "Keep the session host running after the scenario finishes")]
    hold: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting uvcpreview v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match PreviewConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    let scenario = match &args.scenario {
        Some(path) => Scenario::load_from_file(path)
            .with_context(|| format!("Failed to load scenario from {}", path))?,
        None => Scenario::demo(),
    };
    info!("Scenario has {} steps", scenario.steps.len());

    let (monitor_tx, monitor_rx) = mpsc::unbounded_channel();
    let (surface_tx, surface_rx) = mpsc::unbounded_channel();
    let ledger = ControlBlockLedger::new();
    let cameras = SimulatedCameraFactory::new();
    let monitor = Arc::new(SimulatedDeviceMonitor::with_events(
        Arc::clone(&ledger),
        monitor_tx.clone(),
        scenario.permission,
    ));

    let mut orchestrator =
        PreviewOrchestrator::new(config, monitor.clone(), Arc::new(cameras.clone())).map_err(
            |e| {
                error!("Failed to create orchestrator: {}", e);
                e
            },
        )?;

    let mut receiver = orchestrator
        .event_bus()
        .subscribe_filtered(EventFilter::All, "console");
    let printer = tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => print_event(&event),
                Err(EventBusError::Lagged { .. }) => continue,
                Err(_) => break,
            }
        }
    });

    orchestrator
        .start(monitor_rx, surface_rx)
        .await
        .map_err(|e| {
            error!("Failed to start session host: {}", e);
            e
        })?;

    let player = ScenarioPlayer::new(ledger, cameras, monitor);
    if let Err(e) = player
        .play(&scenario, orchestrator.machine(), &monitor_tx, &surface_tx)
        .await
    {
        if !e.is_recoverable() {
            error!("Scenario failed: {}", e);
            orchestrator.shutdown().await?;
            return Err(e.into());
        }
        warn!("Scenario stopped early: {}", e);
    }
    tokio::time::sleep(Duration::from_millis(scenario.step_delay_ms.max(50))).await;

    let snapshot = serde_json::to_string_pretty(&orchestrator.snapshot())
        .context("Failed to serialize session snapshot")?;
    println!("{}", snapshot);

    let exit_code = if args.hold {
        orchestrator.run().await
    } else {
        orchestrator.shutdown().await
    }
    .map_err(|e| {
        error!("Session host error during shutdown: {}", e);
        e
    })?;

    printer.abort();
    info!("uvcpreview exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::CameraStatusChanged { connected, .. } => {
            let status = if *connected {
                "USB camera connected"
            } else {
                "USB camera not connected"
            };
            println!("[{}] {}", event.timestamp().format("%H:%M:%S%.3f"), status);
        }
        SessionEvent::AdvisoryIssued { message, .. } => {
            println!("[{}] NOTICE: {}", event.timestamp().format("%H:%M:%S%.3f"), message);
        }
        other => println!(
            "[{}] {}",
            other.timestamp().format("%H:%M:%S%.3f"),
            other.description()
        ),
    }
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("uvcpreview={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() {
    println!("# uvcpreview configuration file");
    println!("# Every key can be overridden with UVCPREVIEW_<SECTION>__<KEY> environment variables");
    println!();
    println!("{}", DEFAULT_CONFIG_TOML);
}
