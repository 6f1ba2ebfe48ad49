//! Report queue: durable, privacy-bounded diagnostics reporting.
//!
//! Decides when a desktop host should generate its anonymized daily
//! diagnostics report, keeps pending reports in a small persisted queue, and
//! delivers them to a collector without re-sending confirmed days.
//!
//! # Architecture
//!
//! - **Dates**: UTC calendar-day formatting, month windows and strict parsing
//! - **Update queue**: a single-worker FIFO that serializes every cycle
//! - **Scheduler**: enable/disable lifecycle, repeating timer, and the
//!   truncate → dedup → append → send → advance-watermark cycle
//! - **Identity**: monthly salted tags and a monthly-rotated profile id
//!
//! The host supplies the payload generator, the sender, the storage backend
//! and the clock.

pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod dates;
pub mod error;
pub mod identity;
pub mod scheduler;
pub mod storage;
pub mod update_queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReporterConfig;
pub use dates::IsoDate;
pub use error::{ReportError, Result};
pub use identity::{DeviceId, MonthlyTagger, RotatingProfileIdentity};
pub use scheduler::{
    CycleOutcome, Report, ReportGenerator, ReportQueue, ReportScheduler, ReportSender,
};
pub use storage::{FileQueueStorage, MemoryQueueStorage, QueueStorage};
pub use update_queue::{CycleTicket, UpdateQueue};
