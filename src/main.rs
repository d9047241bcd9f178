//! ClamAV-compatible CLI scanning files for viruses via Sophos SSSP.

use anyhow::{Context, Result};
use clamscan_sssp::{Config, ScanResult, SsspClient};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ClamAV emulator scans files for viruses via Sophos SSSP.
#[derive(Parser, Debug)]
#[command(name = "clamscan-sssp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to scan, or '-' to read from stdin.
    #[arg(required_unless_present_any = ["example_config", "validate"])]
    file: Option<String>,

    /// Socket for communicating with the SSSP interface.
    #[arg(short = 'S', long)]
    sssp_socket: Option<PathBuf>,

    /// Quarantine infected files. Accepted for clamscan compatibility; not implemented.
    #[arg(short, long)]
    quarantine: bool,

    /// Remove infected files. Accepted for clamscan compatibility; not implemented.
    #[arg(short, long)]
    remove: bool,

    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print example configuration and exit.
    #[arg(long)]
    example_config: bool,

    /// Validate configuration and exit.
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Print example config if requested
    if args.example_config {
        println!("{}", Config::example());
        return Ok(());
    }

    // Load configuration
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };

    // Validate only if requested
    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    if let Some(socket) = args.sssp_socket {
        config.sssp.socket_path = socket;
    }

    if args.quarantine || args.remove {
        warn!("quarantine and remove are not implemented, flags ignored");
    }

    let file = args.file.context("no file to scan")?;

    info!(
        socket = %config.sssp.socket_path.display(),
        "ClamAV emulator starting"
    );

    let max_scan_size = config.sssp.max_scan_size;
    let client = SsspClient::new(config);
    let result = scan_target(&client, &file, max_scan_size).await;

    info!("ClamAV emulator stopping");

    println!("{}", result.summary_line());
    std::process::exit(result.exit_code());
}

/// Open the target and hand it to the client.
///
/// SSSP framing is length-prefixed, so stdin is buffered in full before
/// SCANDATA can be issued; regular files are streamed with the length
/// taken from file metadata. Any local failure is an error outcome, never
/// a clean one.
async fn scan_target(client: &SsspClient, file: &str, max_scan_size: u64) -> ScanResult {
    if file == "-" {
        // Bound the buffer: one byte past the limit is enough for the
        // client to refuse the input.
        let mut data = Vec::new();
        let mut stdin = tokio::io::stdin().take(max_scan_size.saturating_add(1));
        match stdin.read_to_end(&mut data).await {
            Ok(_) => client.scan_bytes("-", &data).await,
            Err(e) => {
                warn!(error = %e, "failed to read stdin");
                ScanResult::error(e)
            }
        }
    } else {
        match open_file(file).await {
            Ok((reader, length)) => client.scan_stream(file, reader, length).await,
            Err(e) => {
                warn!(file = %file, error = %e, "failed to open file");
                ScanResult::error(e)
            }
        }
    }
}

async fn open_file(path: &str) -> std::io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    Ok((file, length))
}
