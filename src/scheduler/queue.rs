//! Persisted report queue and its state transitions.
//!
//! [`ReportQueue`] is the whole persisted state: pending reports plus the
//! high-watermark of the newest confirmed delivery. The transitions here are
//! pure; the engine decides when to load, apply and persist them.

use crate::dates::IsoDate;
use serde::{Deserialize, Serialize};

/// One day's diagnostic payload tagged with its UTC generation day.
///
/// The payload is flattened into the same JSON object as `dateGenerated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<T> {
    /// UTC calendar day the report was generated on.
    #[serde(rename = "dateGenerated")]
    pub date_generated: IsoDate,
    /// Opaque host payload.
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Report<T> {
    /// Stamp `payload` with `date`.
    pub fn new(date_generated: IsoDate, payload: T) -> Self {
        Self {
            date_generated,
            payload,
        }
    }
}

/// Persisted queue state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQueue<T> {
    /// Day of the newest report confirmed delivered. Only moves forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_watermark: Option<IsoDate>,
    /// Reports waiting for delivery, at most one per day.
    pub reports: Vec<Report<T>>,
}

impl<T> Default for ReportQueue<T> {
    fn default() -> Self {
        Self {
            high_watermark: None,
            reports: Vec::new(),
        }
    }
}

impl<T> ReportQueue<T> {
    /// Returns `true` when no reports are pending.
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Drop reports outside `[first day of today's month, today]`.
    ///
    /// Returns the number of reports removed. The watermark is left alone.
    pub fn truncate_to_month(&mut self, today: IsoDate) -> usize {
        let window_start = today.month_start();
        let before = self.reports.len();
        self.reports
            .retain(|r| r.date_generated >= window_start && r.date_generated <= today);
        before - self.reports.len()
    }

    /// Whether a report for `today` has already been generated or sent.
    ///
    /// A watermark or pending report dated after `today` also counts, which
    /// keeps a backwards clock jump from producing a second report.
    pub fn covers(&self, today: IsoDate) -> bool {
        if self.high_watermark.is_some_and(|hw| hw >= today) {
            return true;
        }
        self.reports.iter().any(|r| r.date_generated >= today)
    }

    /// Newest `dateGenerated` among pending reports.
    pub fn newest_report_date(&self) -> Option<IsoDate> {
        self.reports.iter().map(|r| r.date_generated).max()
    }

    /// Record a confirmed delivery of every pending report.
    ///
    /// Clears `reports` and advances the watermark to the newest delivered
    /// day, never moving it backwards. Returns the new watermark.
    pub fn mark_delivered(&mut self, today: IsoDate) -> IsoDate {
        let delivered = self.newest_report_date();
        let next = match (delivered, self.high_watermark) {
            (Some(sent), Some(previous)) => sent.max(previous),
            (Some(sent), None) => sent,
            (None, Some(previous)) => previous,
            (None, None) => today,
        };
        self.high_watermark = Some(next);
        self.reports.clear();
        next
    }
}
