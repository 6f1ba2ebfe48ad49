use crate::helpers::{file_scheduler, utc};
use report_queue::{CycleOutcome, ReportError};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).expect("read queue file")).expect("valid json")
}

#[tokio::test]
async fn pending_report_survives_restart_and_is_not_resent_after_delivery() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("diagnostics-queue.json");

    {
        let h = file_scheduler(&path, false, utc(2024, 3, 10, 9, 0));
        assert!(h.scheduler.set_enabled(true).wait().await);
        assert_eq!(h.sender.sent_dates(), vec![vec!["2024-03-10".to_owned()]]);
    }

    {
        let h = file_scheduler(&path, true, utc(2024, 3, 10, 15, 0));
        assert!(h.scheduler.set_enabled(true).wait().await);
        assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.sender.sent_dates(), vec![vec!["2024-03-10".to_owned()]]);
        let sent = h.sender.batches.lock().unwrap()[0][0].payload.launch_count;
        assert_eq!(sent, 1, "payload generated before the restart was resent");
    }

    assert_eq!(
        read_json(&path),
        json!({ "highWatermark": "2024-03-10", "reports": [] })
    );

    let h = file_scheduler(&path, true, utc(2024, 3, 10, 22, 0));
    assert!(h.scheduler.set_enabled(true).wait().await);
    assert!(h.sender.sent_dates().is_empty());
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsent_report_is_dropped_when_month_rolls_over() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("diagnostics-queue.json");
    let h = file_scheduler(&path, false, utc(2024, 3, 31, 23, 30));
    h.scheduler.set_enabled(true).wait().await;

    h.clock.set(utc(2024, 4, 1, 0, 10));
    h.sender.accept.store(true, Ordering::SeqCst);
    let outcome = h.scheduler.update().await.expect("update");

    assert_eq!(
        outcome,
        CycleOutcome::Delivered {
            count: 1,
            high_watermark: "2024-04-01".parse().unwrap(),
        }
    );
    assert_eq!(
        h.sender.sent_dates(),
        vec![vec!["2024-03-31".to_owned()], vec!["2024-04-01".to_owned()]]
    );
}

#[tokio::test]
async fn disabling_deletes_the_queue_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("diagnostics-queue.json");
    let h = file_scheduler(&path, true, utc(2024, 5, 2, 12, 0));

    h.scheduler.set_enabled(true).wait().await;
    assert!(path.exists());

    h.scheduler.set_enabled(false).wait().await;
    assert!(!path.exists(), "queue file removed, not emptied");

    // Disabling twice is harmless.
    assert!(h.scheduler.set_enabled(false).wait().await);

    h.sender.accept.store(false, Ordering::SeqCst);
    h.scheduler.set_enabled(true).wait().await;
    let value = read_json(&path);
    assert!(value.get("highWatermark").is_none());
    assert_eq!(
        value["reports"],
        json!([{ "dateGenerated": "2024-05-02", "launchCount": 2, "platform": "linux" }])
    );
}

#[tokio::test]
async fn corrupt_queue_file_is_replaced() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("diagnostics-queue.json");
    std::fs::write(&path, b"{\"reports\": [ truncated").unwrap();

    let h = file_scheduler(&path, false, utc(2024, 6, 15, 7, 0));
    h.scheduler.set_enabled(true).wait().await;

    assert_eq!(
        read_json(&path),
        json!({
            "reports": [{ "dateGenerated": "2024-06-15", "launchCount": 1, "platform": "linux" }]
        })
    );
}

#[tokio::test]
async fn disabling_reports_a_queue_file_that_cannot_be_deleted() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("diagnostics-queue.json");
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("pinned"), b"x").unwrap();

    let h = file_scheduler(&path, true, utc(2024, 6, 15, 7, 0));
    let result = h.scheduler.set_enabled_and_wait(false).await;

    assert!(matches!(result, Err(ReportError::Storage(_))), "{result:?}");
    assert!(path.exists());
    assert!(!h.scheduler.is_enabled());
}
