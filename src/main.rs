use clap::{Parser, Subcommand};
use serial_bridge::config::{Config, ConfigLoader, LogFormat};
use serial_bridge::port::{AsyncPortHandle, AsyncVirtualPort};
use serial_bridge::service::BridgeService;
use serial_bridge::stdio::run_stdio_interface;
use serial_bridge::{BridgeError, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Paired virtual serial ports for exercising serial applications without hardware.",
    long_about = "Links each emulated port with an exogenous port like a null-modem cable. \
                  Text written on one side arrives, one line at a time, on the other."
)]
struct Args {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// C header whose #define constants override the bridge limits
    #[arg(long, global = true)]
    header: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the effective configuration and the device table
    Info {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Send lines through one device and print what arrives on another
    Exchange {
        /// Device that receives
        #[arg(long, default_value = "ttyExogenous0")]
        reader: String,

        /// Device that sends
        #[arg(long, default_value = "ttyEmulatedPort0")]
        writer: String,

        /// Lines to send; each becomes one signal
        #[arg(required = true)]
        messages: Vec<String>,

        /// Per-line read timeout in milliseconds
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },

    /// Serve JSON commands on stdin/stdout
    Stdio,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(header) = &args.header {
        loader.merge_header(header)?;
    }
    let config = loader.into_config();
    init_tracing(&config);

    let registry = Arc::new(Registry::init(config.bridge.clone())?);
    let service = BridgeService::new(Arc::clone(&registry), config.defaults.clone());

    match args.command {
        Command::Info { json } => print_info(&config, &service, json)?,
        Command::Exchange {
            reader,
            writer,
            messages,
            timeout_ms,
        } => exchange(&registry, &reader, &writer, &messages, timeout_ms).await?,
        Command::Stdio => {
            let service = service.clone();
            tokio::task::spawn_blocking(move || {
                run_stdio_interface(&service, std::io::stdin().lock(), std::io::stdout().lock())
            })
            .await??;
        }
    }

    registry.teardown();
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn print_info(
    config: &Config,
    service: &BridgeService,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let status = service.status();
    if json {
        let value = serde_json::json!({
            "bridge": config.bridge,
            "defaults": config.defaults,
            "endpoints": status.endpoints,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let bridge = &config.bridge;
    println!(
        "major {} / {}, {} pairs, {} signals of up to {} bytes per endpoint",
        bridge.major,
        bridge.exogenous_major(),
        bridge.max_minors,
        bridge.total_signal_capacity,
        bridge.max_signal_len
    );
    println!("{:<20} {:>5} {:<10} {:>6}", "DEVICE", "MINOR", "SIDE", "QUEUED");
    for endpoint in status.endpoints {
        println!(
            "{:<20} {:>5} {:<10} {:>6}",
            endpoint.name, endpoint.minor, endpoint.side, endpoint.queued_signals
        );
    }
    Ok(())
}

/// Writer sends each message, a concurrent reader task prints each signal
/// as it arrives.
async fn exchange(
    registry: &Registry,
    reader: &str,
    writer: &str,
    messages: &[String],
    timeout_ms: u64,
) -> Result<(), BridgeError> {
    let rx = AsyncPortHandle::new(registry.open(reader)?);
    let tx = AsyncPortHandle::new(registry.open(writer)?);
    let timeout = Some(Duration::from_millis(timeout_ms));
    let expected = messages.len();

    let listener = tokio::spawn({
        let rx = rx.clone();
        async move {
            let mut received = 0;
            while received < expected {
                match rx.read(timeout).await {
                    Ok(signal) => {
                        print!("{}", signal.to_text());
                        received += 1;
                    }
                    Err(e) => {
                        warn!(device = rx.name(), error = %e, "Listener stopped");
                        break;
                    }
                }
            }
            received
        }
    });

    for message in messages {
        let mut line = message.clone().into_bytes();
        line.push(registry.config().delimiter);
        tx.write(&line).await?;
    }

    let received = listener.await.map_err(|_| BridgeError::DriverShutdown)?;
    info!(sent = expected, received, "Exchange finished");

    tx.close()?;
    rx.close()?;
    Ok(())
}
