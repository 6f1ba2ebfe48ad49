//! Host-supplied collaborators of the report scheduler.
//!
//! The scheduler never inspects report payloads and never talks to the
//! network itself. Hosts plug in a generator that produces one day's payload
//! and a sender that delivers a batch and reports whether it was accepted.

use crate::scheduler::queue::Report;
use async_trait::async_trait;

/// Produces the payload for today's report.
#[async_trait]
pub trait ReportGenerator<T>: Send + Sync {
    /// Build one report payload.
    ///
    /// An error aborts the current update cycle only; nothing is persisted
    /// for it and the next tick tries again.
    async fn generate(&self) -> anyhow::Result<T>;
}

/// Delivers a batch of reports to the remote collector.
#[async_trait]
pub trait ReportSender<T>: Send + Sync {
    /// Send every report in `reports`.
    ///
    /// Return `Ok(true)` only when the collector confirmed the whole batch.
    /// `Ok(false)` and `Err(_)` both leave the queue untouched for retry.
    /// Transport timeouts are the sender's responsibility; a send that never
    /// resolves stalls the scheduler.
    async fn send(&self, reports: &[Report<T>]) -> anyhow::Result<bool>;
}
