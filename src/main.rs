use clap::Parser;
use gnss_link::config::{ConfigLoader, ConnectionConfig, LogFormat, LoggingConfig, TransportKind};
use gnss_link::{
    AnyConnection, CancellationToken, ConfigError, ConnectError, Connection, NegotiationReport,
    TracingSink,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Consecutive read timeouts after which the capture stops.
const MAX_IDLE_READS: u32 = 3;

/// Bytes shown in the hex preview.
const PREVIEW_LEN: usize = 64;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Connect to a GNSS receiver over TCP or serial and capture its output.",
    long_about = "Connects to a GNSS receiver using the configured transport. Serial devices are waited for until they appear, switched to raw mode and stepped up to the requested baud rate. Prints a summary of the bytes received."
)]
struct Args {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect over TCP to HOST:PORT
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "serial")]
    tcp: Option<String>,

    /// Connect to a serial device
    #[arg(long, value_name = "PATH")]
    serial: Option<String>,

    /// Target baud rate for serial connections
    #[arg(short, long)]
    baud: Option<u32>,

    /// Enable RTS/CTS hardware flow control
    #[arg(long)]
    flow_control: bool,

    /// Stop after this many bytes (0 only connects)
    #[arg(long, default_value_t = 256)]
    read_bytes: usize,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    transport: TransportKind,
    endpoint: String,
    connect_ms: u128,
    negotiation: Option<NegotiationReport>,
    bytes_read: usize,
    preview_hex: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    apply_args(&mut config.connection, &args)?;
    config.validate()?;

    init_logging(&config.logging)?;
    tracing::info!(
        transport = ?config.connection.transport,
        endpoint = %config.connection.endpoint(),
        "Starting gnss-link"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let connection = config.connection.clone();
    let limit = args.read_bytes;
    let summary =
        tokio::task::spawn_blocking(move || capture(&connection, cancel, limit)).await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

/// Command-line flags override the loaded configuration.
fn apply_args(connection: &mut ConnectionConfig, args: &Args) -> Result<(), ConfigError> {
    if let Some(target) = &args.tcp {
        let (host, port) = target
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::validation("--tcp", "expected HOST:PORT"))?;
        connection.transport = TransportKind::Tcp;
        connection.host = host.to_string();
        connection.port = port.to_string();
    }
    if let Some(device) = &args.serial {
        connection.transport = TransportKind::Serial;
        connection.device = device.clone();
    }
    if let Some(baud) = args.baud {
        connection.baud_rate = baud;
    }
    if args.flow_control {
        connection.flow_control = true;
    }
    Ok(())
}

/// Connect, read up to `limit` bytes, close. Runs on a blocking thread.
fn capture(
    config: &ConnectionConfig,
    cancel: CancellationToken,
    limit: usize,
) -> Result<Summary, ConnectError> {
    let mut conn = AnyConnection::from_config(config, Arc::new(TracingSink), cancel.clone());

    let started = Instant::now();
    conn.connect()?;
    let connect_time = started.elapsed();

    let mut data = Vec::with_capacity(limit);
    let mut buf = [0u8; 1024];
    let mut idle_reads = 0;

    while data.len() < limit && !cancel.is_cancelled() {
        let want = (limit - data.len()).min(buf.len());
        match conn.read_bytes(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => {
                idle_reads = 0;
                data.extend_from_slice(&buf[..n]);
            }
            Err(e) if e.is_timeout() => {
                idle_reads += 1;
                if idle_reads >= MAX_IDLE_READS {
                    tracing::info!(bytes = data.len(), "Receiver went quiet, stopping capture");
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }

    let negotiation = match &conn {
        AnyConnection::Serial(serial) => serial.negotiation_report().cloned(),
        AnyConnection::Tcp(_) => None,
    };
    let summary = Summary {
        transport: conn.transport(),
        endpoint: conn.endpoint().to_string(),
        connect_ms: connect_time.as_millis(),
        negotiation,
        bytes_read: data.len(),
        preview_hex: hex_preview(&data),
    };
    conn.close();

    Ok(summary)
}

fn hex_preview(data: &[u8]) -> String {
    data.iter()
        .take(PREVIEW_LEN)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_summary(summary: &Summary) {
    println!("Endpoint:   {} ({:?})", summary.endpoint, summary.transport);
    println!(
        "Connected:  {:?}",
        Duration::from_millis(summary.connect_ms as u64)
    );
    if let Some(report) = &summary.negotiation {
        println!(
            "Baud rate:  {} -> {} via {:?}",
            report.initial, report.achieved, report.steps
        );
    }
    println!("Bytes read: {}", summary.bytes_read);
    if !summary.preview_hex.is_empty() {
        println!("Preview:    {}", summary.preview_hex);
    }
}

fn init_logging(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG wins over the configured level.
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;
    let registry = Registry::default().with(env_filter);

    // Logs go to stderr so stdout stays clean for the summary.
    match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => return,
    }

    tracing::info!("Signal received, cancelling connection");
    cancel.cancel();
}
