//! alert-worker: loads events and alert definitions, then evaluates alerts
//! on a schedule.
//!
//! Events come from a JSON-lines file, definitions from a directory of YAML
//! files. Triggers are logged and, when a webhook URL is configured, posted
//! to it. With `--once` a single pass runs and each result is printed as a
//! JSON line on stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use mailpulse_core::config::{load_dotenv, EngineConfig};
use mailpulse_core::{Clock, EventStore, MemoryEventStore, SystemClock};
use mailpulse_notify::{Dispatcher, LogNotifier, Notifier, WebhookNotifier};
use mailpulse_rules::{
    AlertEngine, AlertLoader, AlertRepository, MemoryAlertRepository, SchedulerLoop,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Scheduled alert evaluation over an email event log.
#[derive(Parser, Debug)]
#[command(name = "alert-worker", version, about)]
struct Cli {
    /// Directory of YAML alert definitions.
    #[arg(long, env = "ALERTS_DIR")]
    alerts_dir: Option<PathBuf>,

    /// JSON-lines file of email events.
    #[arg(long, env = "EVENTS_FILE")]
    events_file: Option<PathBuf>,

    /// Webhook receiving every triggered alert.
    #[arg(long, env = "ALERT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Seconds between scheduled passes.
    #[arg(long, env = "ALERT_CHECK_INTERVAL_SECS")]
    interval_secs: Option<u64>,

    /// Run a single pass over every enabled alert and exit.
    #[arg(long)]
    once: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(dir) = cli.alerts_dir {
        config.sources.alerts_dir = dir;
    }
    if let Some(file) = cli.events_file {
        config.sources.events_file = file;
    }
    if let Some(secs) = cli.interval_secs {
        config.scheduler.check_interval_secs = secs.max(1);
    }
    config.log_summary();

    // Events
    let events_file = &config.sources.events_file;
    let store = if events_file.exists() {
        MemoryEventStore::from_jsonl(events_file)?
    } else {
        warn!(path = %events_file.display(), "events file not found, starting empty");
        MemoryEventStore::new()
    };
    let store: Arc<dyn EventStore> = Arc::new(store);

    // Alert definitions
    let report = AlertLoader::new(config.sources.alerts_dir.clone()).load_all()?;
    let repository = Arc::new(MemoryAlertRepository::new());
    for definition in report.definitions {
        repository.upsert(definition).await?;
    }

    // Notification channels
    let mut channels: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier::new())];
    if let Some(url) = cli.webhook_url {
        info!(url = %url, "webhook channel enabled");
        channels.push(Box::new(WebhookNotifier::from_config(url, None, None, None)?));
    }
    let dispatcher = Arc::new(Dispatcher::with_defaults(channels));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine = Arc::new(AlertEngine::new(
        repository,
        store,
        dispatcher,
        Arc::clone(&clock),
        config.clone(),
    ));

    if cli.once {
        let outcomes = engine.evaluate_all().await?;
        for outcome in outcomes {
            match outcome.result {
                Ok(result) => println!("{}", serde_json::to_string(&result)?),
                Err(e) => warn!(alert_id = %outcome.alert_id, error = %e, "evaluation failed"),
            }
        }
        return Ok(());
    }

    let scheduler = Arc::new(SchedulerLoop::from_config(engine, clock));
    let runner = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.run().await }
    });

    info!("alert-worker running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    scheduler.shutdown();

    if tokio::time::timeout(Duration::from_secs(30), runner)
        .await
        .is_err()
    {
        warn!("scheduler did not stop within 30s");
    }
    info!("alert-worker exited cleanly");
    Ok(())
}
