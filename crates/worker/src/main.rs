//! Noticewatch
//!
//! Watches notice boards on a schedule:
//! 1. Fetches each configured board
//! 2. Keeps today's postings whose titles match a keyword
//! 3. Skips what was already delivered today
//! 4. Sends the rest to a Telegram chat

use anyhow::Context;
use clap::Parser;
use noticewatch_common::{
    config::{AppConfig, LedgerBackend, ObservabilityConfig},
    ledger::{DedupLedger, InMemoryLedger, RedisLedger, RedisLedgerConfig},
    metrics, VERSION,
};
use noticewatch_crawler::HttpFetcher;
use noticewatch_notifier::{LogNotifier, Notifier, TelegramNotifier};
use noticewatch_worker::{NoticePipeline, Schedule, Scheduler};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "noticewatch", version, about = "Notice board keyword watcher")]
struct Cli {
    /// Configuration file (defaults to config/ layering plus APP__ env vars)
    #[arg(short, long)]
    config: Option<String>,

    /// Run the pipeline once and exit
    #[arg(long)]
    once: bool,

    /// Use an in-memory ledger and log messages instead of sending them
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(observability: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&observability.log_level));

    if observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let loaded = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    };
    let config = match loaded {
        Ok(config) => {
            init_tracing(&config.observability);
            config
        }
        Err(e) => {
            init_tracing(&ObservabilityConfig::default());
            error!(error = %e, code = e.code().as_code(), "Failed to load configuration");
            return Err(e).context("invalid configuration");
        }
    };

    info!(
        version = VERSION,
        sources = config.sources.len(),
        dry_run = cli.dry_run,
        "Starting Noticewatch"
    );

    metrics::register_metrics();

    // Dedup ledger
    let ledger: Arc<dyn DedupLedger> =
        if cli.dry_run || config.ledger.backend == LedgerBackend::Memory {
            Arc::new(InMemoryLedger::new(config.expiry_policy()))
        } else {
            info!("Connecting to Redis...");
            Arc::new(
                RedisLedger::new(RedisLedgerConfig {
                    url: config.ledger.redis_url.clone(),
                    key_prefix: config.ledger.key_prefix.clone(),
                    expiry: config.expiry_policy(),
                })
                .await?,
            )
        };
    ledger.ping().await.context("ledger unreachable")?;
    info!(backend = ledger.backend_name(), "Ledger ready");

    // Notifier
    let notifier: Arc<dyn Notifier> = if cli.dry_run {
        Arc::new(LogNotifier)
    } else {
        let telegram = TelegramNotifier::new(&config.telegram)?;
        let bot = telegram
            .get_me()
            .await
            .context("Telegram rejected the bot token")?;
        info!(bot_id = bot.id, username = ?bot.username, "Telegram bot authorized");
        Arc::new(telegram)
    };

    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let pipeline = Arc::new(NoticePipeline::from_config(
        &config,
        fetcher,
        ledger,
        notifier,
    )?);
    let source_names: Vec<&str> = pipeline.sources().collect();
    info!(sources = ?source_names, "Pipeline ready");

    let schedule = Schedule::from_config(&config.schedule, config.utc_offset())?;
    let scheduler = Scheduler::new(
        pipeline,
        schedule,
        config.schedule.run_on_start,
        config.run_timeout(),
    );

    if cli.once {
        let report = scheduler
            .run_once()
            .await
            .context("run exceeded its time budget")?;
        if report.all_sources_failed() {
            anyhow::bail!("every source failed: {:?}", report.failed_sources());
        }
        info!(delivered = report.total_delivered(), "Single run complete");
        return Ok(());
    }

    let runs = scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!(runs, "Noticewatch shutting down");
    Ok(())
}
