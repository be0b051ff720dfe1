//! Neoproxy - local MITM proxy that serves preserved Flash game assets.
//!
//! Runs the interception proxy until Ctrl-C, then reports what the session
//! saw: games observed, names discovered, and how much was served locally.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use neoproxy_core::{InterceptConfig, SessionSummary};
use neoproxy_proxy::{CaManager, ProxyConfig, ProxyServer, DEFAULT_PROXY_PORT};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Neoproxy - serve preserved Flash game assets through a local proxy
#[derive(Parser, Debug)]
#[command(name = "neoproxy", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    listen_host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PROXY_PORT)]
    listen_port: u16,

    /// Root directory of substitute assets (<root>/<game>/<file>.swf)
    #[arg(long)]
    asset_root: Option<PathBuf>,

    /// JSON file with interception settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the root CA certificate and key
    #[arg(long)]
    ca_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_host, self.listen_port)
    }

    /// Default `EnvFilter` directive; `--debug` wins over `--log-level`.
    fn log_filter(&self) -> String {
        let level = if self.debug { "debug" } else { &self.log_level };
        format!("neoproxy={},warn", level)
    }

    /// Interception settings: config file first, then command-line overrides.
    fn intercept_config(&self) -> anyhow::Result<InterceptConfig> {
        let mut config = match &self.config {
            Some(path) => InterceptConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => InterceptConfig::default(),
        };
        if let Some(root) = &self.asset_root {
            config = config.with_asset_root(root.clone());
        }
        Ok(config)
    }

    fn ca_manager(&self) -> anyhow::Result<CaManager> {
        match &self.ca_dir {
            Some(dir) => Ok(CaManager::new(dir)),
            None => CaManager::with_default_dir().context("Failed to locate CA directory"),
        }
    }
}

/// Logs live next to the CA under the shared data directory.
fn logs_dir() -> Option<PathBuf> {
    neoproxy_proxy::project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

fn file_appender(log_dir: &Path) -> Option<RollingFileAppender> {
    std::fs::create_dir_all(log_dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix("neoproxy")
        .filename_suffix("log")
        .build(log_dir)
        .ok()
}

/// Console logging, plus a daily rolling file when the data directory is writable.
fn init_logging(args: &Args) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));

    let log_dir = logs_dir();
    let (file_layer, guard) = match log_dir.as_deref().and_then(file_appender) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .init();

    match (&log_dir, &guard) {
        (Some(dir), Some(_)) => tracing::info!("Logging to {:?}", dir),
        _ => tracing::warn!("File logging unavailable, using console only"),
    }
    guard
}

/// Logs the end-of-session report.
fn report(summary: &SessionSummary) {
    tracing::info!("Session summary: {}", summary);
    for id in &summary.games_seen {
        match summary.game_names.iter().find(|(seen, _)| seen == id) {
            Some((_, name)) => tracing::info!("  game {} ({})", id, name),
            None => tracing::info!("  game {}", id),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Keep guard alive for the duration of the program
    let _log_guard = init_logging(&args);

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        tracing::error!("PANIC: {}", panic_info);
        default_hook(panic_info);
    }));

    tracing::info!("Starting Neoproxy...");
    tracing::debug!("Args: {:?}", args);

    let intercept = args.intercept_config()?;
    if !intercept.asset_root.is_dir() {
        tracing::warn!(
            "Asset root {:?} does not exist, no assets will be injected",
            intercept.asset_root
        );
    }

    let config = ProxyConfig::new(args.ca_manager()?)
        .with_addr(args.listen_addr())
        .with_intercept(intercept);

    let server = ProxyServer::new(config).context("Failed to prepare root CA")?;
    tracing::info!(
        "Install {:?} as a trusted root to intercept HTTPS",
        server.ca_cert_path()
    );

    let mut handle = server.start().await.context("Failed to start proxy")?;
    let interceptor = handle.interceptor();
    tracing::info!("Proxy listening on {}", handle.addr());

    let exited = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            None
        }
        exited = handle.exited() => Some(exited),
    };

    if let Some(result) = exited {
        report(&interceptor.summary());
        result.context("Proxy stopped unexpectedly")?;
        anyhow::bail!("Proxy stopped unexpectedly");
    }

    tracing::info!("Shutting down proxy");
    handle.stop().await.context("Proxy failed during shutdown")?;

    report(&interceptor.summary());

    tracing::info!("Neoproxy stopped");
    Ok(())
}
