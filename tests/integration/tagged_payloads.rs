//! Hosts attach the monthly tag in the sender, keyed on report dates.

use crate::helpers::utc;
use async_trait::async_trait;
use report_queue::identity::DIAGNOSTICS_TAG_SALT;
use report_queue::{
    Clock, DeviceId, ManualClock, MemoryQueueStorage, MonthlyTagger, Report, ReportGenerator,
    ReportScheduler, ReportSender, ReporterConfig,
};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

type Payload = Map<String, Value>;

struct EmptyGenerator;

#[async_trait]
impl ReportGenerator<Payload> for EmptyGenerator {
    async fn generate(&self) -> anyhow::Result<Payload> {
        Ok(Map::new())
    }
}

/// Sends after the wall clock has already crossed into the next month.
struct LateSender {
    tagger: MonthlyTagger,
    clock: Arc<ManualClock>,
    tags: Mutex<Vec<String>>,
}

#[async_trait]
impl ReportSender<Payload> for LateSender {
    async fn send(&self, reports: &[Report<Payload>]) -> anyhow::Result<bool> {
        self.clock.set(utc(2024, 4, 1, 0, 3));
        let tag = self
            .tagger
            .tag_for_batch(reports)
            .ok_or_else(|| anyhow::anyhow!("empty batch"))?;
        self.tags.lock().unwrap().push(tag);
        Ok(true)
    }
}

#[tokio::test]
async fn batch_sent_after_midnight_keeps_generation_month_tag() {
    let device = DeviceId::new("0123456789abcdef0123456789abcdef");
    let tagger = MonthlyTagger::new(DIAGNOSTICS_TAG_SALT, device);
    let clock = Arc::new(ManualClock::new(utc(2024, 3, 31, 23, 58)));
    let sender = Arc::new(LateSender {
        tagger: tagger.clone(),
        clock: Arc::clone(&clock),
        tags: Mutex::new(Vec::new()),
    });

    let scheduler = ReportScheduler::new(
        &ReporterConfig::default(),
        Arc::new(MemoryQueueStorage::new()),
        Arc::new(EmptyGenerator),
        Arc::clone(&sender) as Arc<dyn ReportSender<Payload>>,
        Arc::clone(&clock) as Arc<dyn Clock>,
    )
    .expect("build scheduler");
    scheduler.set_enabled(true).wait().await;

    let tags = sender.tags.lock().unwrap().clone();
    assert_eq!(tags, vec![tagger.tag_for(&utc(2024, 3, 15, 0, 0))]);
    assert_ne!(tags[0], tagger.tag_for(&clock.now()));
}
