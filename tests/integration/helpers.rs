//! Shared helpers for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use report_queue::{
    Clock, FileQueueStorage, ManualClock, Report, ReportGenerator, ReportScheduler, ReportSender,
    ReporterConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Typed payload flattened next to `dateGenerated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LaunchStats {
    pub launch_count: u32,
    pub platform: String,
}

#[derive(Default)]
pub(crate) struct LaunchStatsGenerator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ReportGenerator<LaunchStats> for LaunchStatsGenerator {
    async fn generate(&self) -> anyhow::Result<LaunchStats> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(LaunchStats {
            launch_count: u32::try_from(n)?,
            platform: "linux".to_owned(),
        })
    }
}

/// Sender whose acceptance can be flipped between cycles.
pub(crate) struct ToggleSender {
    pub accept: AtomicBool,
    pub batches: Mutex<Vec<Vec<Report<LaunchStats>>>>,
}

impl ToggleSender {
    pub(crate) fn new(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn sent_dates(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .map(|b| b.iter().map(|r| r.date_generated.to_string()).collect())
            .collect()
    }
}

#[async_trait]
impl ReportSender<LaunchStats> for ToggleSender {
    async fn send(&self, reports: &[Report<LaunchStats>]) -> anyhow::Result<bool> {
        self.batches.lock().unwrap().push(reports.to_vec());
        Ok(self.accept.load(Ordering::SeqCst))
    }
}

pub(crate) struct FileHarness {
    pub scheduler: ReportScheduler<LaunchStats>,
    pub generator: Arc<LaunchStatsGenerator>,
    pub sender: Arc<ToggleSender>,
    pub clock: Arc<ManualClock>,
}

/// Scheduler over a JSON queue file at `path`.
pub(crate) fn file_scheduler(path: &Path, accept: bool, now: DateTime<Utc>) -> FileHarness {
    let generator = Arc::new(LaunchStatsGenerator::default());
    let sender = Arc::new(ToggleSender::new(accept));
    let clock = Arc::new(ManualClock::new(now));
    let scheduler = ReportScheduler::new(
        &ReporterConfig::default(),
        Arc::new(FileQueueStorage::new(path)),
        Arc::clone(&generator) as Arc<dyn ReportGenerator<LaunchStats>>,
        Arc::clone(&sender) as Arc<dyn ReportSender<LaunchStats>>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .expect("build scheduler");
    FileHarness {
        scheduler,
        generator,
        sender,
        clock,
    }
}
