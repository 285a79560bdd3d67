//! Sentinel Gatekeeper CLI.

use anyhow::Result;
use clap::Parser;
use sentinel_gatekeeper::providers::http_client;
use sentinel_gatekeeper::{build_pipeline, Admission, Config, ConnectionInterceptor, Handshake};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sentinel-gatekeeper")]
#[command(about = "Connection gatekeeper - check a player's name and address against the admission pipeline")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gatekeeper.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Display name to check
    #[arg(long, default_value = "Player")]
    name: String,

    /// Source address to check
    #[arg(long, value_name = "IP")]
    address: Option<String>,

    /// Locale used to render the rejection message (e.g. "en_US")
    #[arg(long)]
    locale: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load_or_default(&args.config)?;

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let Some(address) = args.address else {
        anyhow::bail!("--address is required to check a connection");
    };

    let http = http_client()?;
    let pipeline = build_pipeline(&config, &http).await?;
    let interceptor = ConnectionInterceptor::new(
        Arc::new(pipeline),
        Duration::from_secs(config.gatekeeper.timeout_seconds),
    );

    let handshake = Handshake {
        name: args.name,
        uuid: "cli".to_string(),
        usid: "cli".to_string(),
        address,
        locale: args.locale,
    };

    match interceptor.admit(handshake).await {
        Admission::Proceed => println!("admit"),
        Admission::Reject { message, cooldown } => {
            println!("reject (cooldown {}s): {}", cooldown.as_secs(), message)
        }
    }

    Ok(())
}
