//! builtin-broker - platform action broker
//!
//! Entry point for the broker binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use builtin_broker::config::{Config, LoggingConfig};
use builtin_broker::host::HeadlessHost;
use builtin_broker::server::ControlServer;
use builtin_broker::service::{BootPhase, BuiltInService};
use builtin_broker::utils::format_user_error;
use builtin_broker::worker::UiWorker;

/// Command-line arguments for builtin-broker
#[derive(Parser, Debug)]
#[command(name = "builtin-broker")]
#[command(version, about = "Platform action broker", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/builtin-broker/config.toml")]
    pub config: PathBuf,

    /// Control socket path
    #[arg(short, long, env = "BUILTIN_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, load_error) = match Config::load(&args.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let config = config.with_overrides(
        args.socket.clone(),
        args.log_format.clone(),
        args.log_file.clone(),
    );
    if let Err(e) = config.validate() {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    let _log_guard = init_logging(&config.logging, args.verbose)?;

    info!("════════════════════════════════════════════════════════");
    info!("  builtin-broker v{}", env!("CARGO_PKG_VERSION"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    if let Some(e) = load_error {
        warn!("Failed to load config: {:#}, using defaults", e);
    } else {
        info!("Configuration loaded from {}", args.config.display());
    }
    tracing::debug!("Config: {:?}", config);

    if let Err(e) = run(config).await {
        eprintln!("{}", format_user_error(&e));
        return Err(e);
    }

    info!("Broker stopped");
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let worker = UiWorker::spawn("ui").context("Failed to start UI worker")?;
    let host = HeadlessHost::new(worker.clone());

    let service = Arc::new(BuiltInService::start(
        &config,
        host.services(),
        worker.clone(),
    ));
    for phase in [
        BootPhase::SystemServicesReady,
        BootPhase::ThirdPartyAppsCanStart,
        BootPhase::BootCompleted,
    ] {
        service.on_boot_phase(phase);
    }

    let primary_user = service.primary_user();
    service.on_user_unlocked(primary_user);

    let server = ControlServer::new(Arc::clone(&service), &config.service.socket_path);
    let listener = server.bind()?;
    server.serve(listener, shutdown_signal()).await?;

    service.on_user_stopped(primary_user);
    worker.flush().context("UI worker stopped before teardown finished")?;
    worker.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Ctrl-C handler failed: {}", e);
            }
            info!("Interrupt received");
        }
        _ = terminate => info!("Terminate received"),
    }
}

/// Initialize tracing; the returned guard flushes the log file on drop
fn init_logging(logging: &LoggingConfig, verbose: u8) -> Result<Option<WorkerGuard>> {
    let log_level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "builtin_broker={level},warn",
            level = log_level
        ))
    });

    let stdout_layer = match logging.format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        "compact" => tracing_subscriber::fmt::layer().compact().boxed(),
        _ => tracing_subscriber::fmt::layer().pretty().boxed(),
    };

    let (file_layer, guard) = match &logging.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = match logging.format.as_str() {
                "json" => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
                _ => tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .boxed(),
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    if let Some(path) = &logging.log_file {
        info!("Logging to file: {}", path.display());
    }
    Ok(guard)
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .with_context(|| format!("Failed to create log file: {}", path.display()))
}
