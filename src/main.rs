use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn, Level};

use floodgate::config::LimitsConfig;
use floodgate::ratelimit::{Limit, Limiter};
use floodgate::store::RedisClient;

/// Floodgate - distributed rate limiting over Redis
#[derive(Parser, Debug)]
#[command(name = "floodgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the limit rules configuration file
    #[arg(short = 'c', long = "config")]
    config: Option<String>,

    /// Redis URL
    #[arg(short = 'u', long = "url", default_value = "redis://127.0.0.1:6379")]
    url: String,

    /// Key to apply the limits to
    #[arg(short = 'k', long = "key", default_value = "demo")]
    key: String,

    /// Number of limit applications to run
    #[arg(short = 'n', long = "count", default_value_t = 10)]
    count: u32,

    /// Delay between applications in milliseconds
    #[arg(long = "interval", default_value_t = 100)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Floodgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let limits = load_limits(&args);

    let client = Arc::new(RedisClient::connect(&args.url).await?);
    info!(url = %args.url, "Connected to Redis");

    let limiter = Limiter::new(client, limits)?;

    for call in 1..=args.count {
        let decision = limiter.limit(&args.key).await?;
        if decision.is_allowed() {
            info!(
                call,
                counter = decision.counter(),
                remainder = decision.remainder(),
                "admitted"
            );
        } else {
            let wait = decision.retry_after().unwrap_or_default();
            info!(
                call,
                counter = decision.counter(),
                wait_ms = wait.as_millis() as u64,
                "rejected"
            );
        }
        tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
    }

    Ok(())
}

/// Load limits from the configured file path, falling back to a default
/// limit of 10 per second.
fn load_limits(args: &Args) -> Vec<Limit> {
    if let Some(ref config_path) = args.config {
        match LimitsConfig::from_file(config_path) {
            Ok(config) => {
                info!(
                    path = %config_path,
                    rule_count = config.limits.len(),
                    "Limit configuration loaded"
                );
                let limits = config.to_limits();
                if !limits.is_empty() {
                    return limits;
                }
                warn!("Configuration contains no limits, using default limit");
            }
            Err(e) => {
                warn!(
                    path = %config_path,
                    error = %e,
                    "Failed to load limit configuration, using default limit"
                );
            }
        }
    } else {
        info!("No limit configuration specified, using default limit");
    }

    vec![Limit::new(Duration::from_secs(1), 10).with_name("demo")]
}
