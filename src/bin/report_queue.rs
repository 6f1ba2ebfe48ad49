//! Inspect and drive the local diagnostics queue from the command line.
//!
//! All tracing output goes to stderr; stdout carries command output only.

use async_trait::async_trait;
use report_queue::identity::{DIAGNOSTICS_TAG_SALT, USAGE_TAG_SALT};
use report_queue::{
    Clock, CycleOutcome, DeviceId, FileQueueStorage, MonthlyTagger, QueueStorage, Report,
    ReportGenerator, ReportQueue, ReportScheduler, ReportSender, ReporterConfig,
    RotatingProfileIdentity, SystemClock, app_dirs,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

type Payload = Map<String, Value>;

/// Minimal local payload: build and platform facts only.
struct LocalGenerator;

#[async_trait]
impl ReportGenerator<Payload> for LocalGenerator {
    async fn generate(&self) -> anyhow::Result<Payload> {
        let mut payload = Map::new();
        payload.insert("appVersion".to_owned(), json!(env!("CARGO_PKG_VERSION")));
        payload.insert("os".to_owned(), json!(std::env::consts::OS));
        payload.insert("arch".to_owned(), json!(std::env::consts::ARCH));
        Ok(payload)
    }
}

/// Accepts every batch after logging it. Nothing leaves the machine.
struct DryRunSender {
    tagger: Option<MonthlyTagger>,
}

#[async_trait]
impl ReportSender<Payload> for DryRunSender {
    async fn send(&self, reports: &[Report<Payload>]) -> anyhow::Result<bool> {
        let tag = self
            .tagger
            .as_ref()
            .and_then(|tagger| tagger.tag_for_batch(reports))
            .unwrap_or_default();
        let body = serde_json::to_string(reports)?;
        tracing::info!(count = reports.len(), tag = %tag, "dry-run delivery");
        println!("{body}");
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    let result = match command.as_str() {
        "show" => show().await,
        "purge" => purge().await,
        "run-once" => run_once().await,
        "identity" => identity(),
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => Err(anyhow::anyhow!(
            "unknown subcommand `{other}` (use show|purge|run-once|identity)"
        )),
    };

    result.map_err(|e| {
        tracing::error!(error = %e, "report-queue failed");
        e
    })
}

async fn show() -> anyhow::Result<()> {
    let storage = FileQueueStorage::new(app_dirs::queue_file());
    let queue: Option<ReportQueue<Payload>> = storage.get().await;
    match queue {
        Some(queue) => println!("{}", serde_json::to_string_pretty(&queue)?),
        None => println!("no queued reports at {}", storage.path().display()),
    }
    Ok(())
}

async fn purge() -> anyhow::Result<()> {
    // Purging must not mint a device id on a machine that never reported.
    let scheduler = build_scheduler(None)?;
    match scheduler.set_enabled_and_wait(false).await? {
        CycleOutcome::Purged => {
            println!("removed {}", app_dirs::queue_file().display());
            Ok(())
        }
        other => anyhow::bail!("purge did not run: {other:?}"),
    }
}

async fn run_once() -> anyhow::Result<()> {
    let device_id = DeviceId::load_or_create(&app_dirs::device_id_file())?;
    let scheduler = build_scheduler(Some(MonthlyTagger::new(DIAGNOSTICS_TAG_SALT, device_id)))?;
    let outcome = scheduler.set_enabled_and_wait(true).await;
    scheduler.shutdown();
    let outcome = outcome?;
    tracing::info!(?outcome, "update cycle finished");
    show().await
}

fn identity() -> anyhow::Result<()> {
    let now = SystemClock.now();
    let device_id = DeviceId::load_or_create(&app_dirs::device_id_file())?;
    let profile =
        RotatingProfileIdentity::load_and_rotate(&app_dirs::profile_identity_file(), &now)?;

    println!("device id:        {device_id}");
    println!("profile id:       {} ({})", profile.id, profile.id_month);
    println!(
        "diagnostics tag:  {}",
        MonthlyTagger::new(DIAGNOSTICS_TAG_SALT, device_id.clone()).tag_for(&now)
    );
    println!(
        "usage tag:        {}",
        MonthlyTagger::new(USAGE_TAG_SALT, device_id).tag_for(&now)
    );
    Ok(())
}

fn build_scheduler(tagger: Option<MonthlyTagger>) -> anyhow::Result<ReportScheduler<Payload>> {
    let config = ReporterConfig::load_or_default(&app_dirs::config_file())?;
    let scheduler = ReportScheduler::new(
        &config,
        Arc::new(FileQueueStorage::new(app_dirs::queue_file())),
        Arc::new(LocalGenerator),
        Arc::new(DryRunSender { tagger }),
        Arc::new(SystemClock),
    )?;
    Ok(scheduler)
}

fn print_usage() {
    println!("usage: report-queue <show|purge|run-once|identity>");
}
