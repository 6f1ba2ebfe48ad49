//! Daily diagnostics report scheduler.
//!
//! Generates at most one report per UTC day, keeps pending reports for the
//! current UTC month only, and delivers them with retry on the next tick.
//! Queue state is persisted through a host-supplied [`QueueStorage`].
//!
//! [`QueueStorage`]: crate::storage::QueueStorage

pub mod contracts;
pub mod engine;
pub mod queue;

pub use contracts::{ReportGenerator, ReportSender};
pub use engine::{CycleOutcome, ReportScheduler};
pub use queue::{Report, ReportQueue};
