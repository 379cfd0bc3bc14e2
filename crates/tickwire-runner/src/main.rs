//! # tickwire-runner
//!
//! Main entry point for the ticker ingestion service.
//!
//! Loads a JSON configuration file, creates one ticker feed adapter per
//! configured exchange connection, and manages their lifecycle. Each
//! normalized tick is logged through a single shared subscriber.
//!
//! # Usage
//!
//! ```bash
//! tickwire-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use tickwire_core::ws::WsTransport;
use tickwire_core::{FeedKind, Tick};
use tickwire_feed::{TickSubscriber, TickerFeed};

/// Ticker Feed Ingestion Runner.
#[derive(Parser)]
#[command(name = "tickwire-runner", about = "Ticker Feed Ingestion Runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config
    /// file's `log.level`.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Optional log directory for file output. Overrides the config file's
    /// `log.dir`.
    #[arg(long)]
    log_dir: Option<String>,
}

/// Writes every delivered tick to the log.
struct LoggingSubscriber;

impl TickSubscriber for LoggingSubscriber {
    fn on_tick(&self, tick: &Tick) {
        info!("{tick}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = tickwire_core::config::load_config(&cli.config)?;

    // 2. Initialize logging — CLI flags override the config's log block
    let log = config.log.clone().unwrap_or_default();
    let log_level = cli.log_level.or(log.level).unwrap_or_else(|| "info".to_string());
    let log_dir = cli.log_dir.or(log.dir);
    tickwire_core::logging::init_logging(&log_level, log_dir.as_deref(), "tickwire-runner");

    info!("tickwire-runner starting — config={}, log_level={log_level}", cli.config.display(),);
    info!("config loaded — {} connection(s)", config.connections.len(),);

    // 3. Create one feed adapter per connection
    let transport = Arc::new(WsTransport::new());
    let sink: Arc<dyn TickSubscriber> = Arc::new(LoggingSubscriber);
    let mut feeds: Vec<TickerFeed> = Vec::new();

    for (idx, conn_config) in config.connections.iter().enumerate() {
        match TickerFeed::new(conn_config, transport.clone()) {
            Ok(feed) => {
                info!("connection[{idx}]: created feed '{}' ({} instrument(s))", feed.source(), conn_config.instruments.len(),);
                for pair in conn_config.parsed_instruments()? {
                    feed.subscribe(FeedKind::Ticker, pair, &sink);
                }
                feeds.push(feed);
            }
            Err(e) => {
                error!("connection[{idx}]: failed to create feed for '{}': {e}", conn_config.exchange,);
            }
        }
    }

    // Start all feeds
    for feed in &mut feeds {
        feed.start().await?;
        info!("feed '{}' started", feed.source());
    }

    info!("all {} feed(s) started — press Ctrl+C to stop", feeds.len(),);

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 5. Stop all feeds gracefully
    for feed in &mut feeds {
        info!("stopping feed '{}'", feed.source());
        feed.stop().await;
    }

    info!("all feeds stopped — goodbye");
    Ok(())
}
