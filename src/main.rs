use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use alpaca_server::{Config, Daemon};

/// Alpaca - device server for observatory hardware
#[derive(Parser)]
#[command(name = "alpaca", version, about)]
struct Cli {
    /// Port of the Alpaca API (overrides the config file)
    #[arg(short, long, env = "ALPACA_PORT")]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "ALPACA_CONFIG")]
    config: Option<PathBuf>,

    /// UDP discovery port
    #[arg(long, env = "ALPACA_DISCOVERY_PORT")]
    discovery_port: Option<u16>,

    /// Do not answer discovery broadcasts
    #[arg(long)]
    no_discovery: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,alpaca_server=info",
        1 => "info,alpaca_server=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(
        version = alpaca_server::VERSION,
        config = ?cli.config,
        "starting alpaca server"
    );

    // Load configuration, then apply command line overrides
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(port) = cli.discovery_port {
        config.discovery.port = port;
    }
    if cli.no_discovery {
        config.discovery.responder = false;
    }
    tracing::debug!(?config, "loaded configuration");

    // Create and run daemon until interrupted
    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}
