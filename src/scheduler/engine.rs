//! Report scheduler lifecycle and update cycle.
//!
//! [`ReportScheduler`] is a two-state machine (enabled/disabled) owning at
//! most one repeating timer. The timer and every explicit call enqueue an
//! update cycle on the scheduler's [`UpdateQueue`], so cycles never overlap.
//!
//! One cycle, when enabled:
//!
//! 1. load the queue (or start empty),
//! 2. drop reports outside the current UTC month,
//! 3. generate today's report unless today is already covered,
//! 4. persist if anything changed,
//! 5. send the pending batch,
//! 6. on confirmed delivery advance the watermark, clear the batch, persist.
//!
//! When disabled the only effect of a cycle is deleting the persisted queue.

use crate::clock::Clock;
use crate::config::ReporterConfig;
use crate::dates::IsoDate;
use crate::error::{ReportError, Result};
use crate::scheduler::contracts::{ReportGenerator, ReportSender};
use crate::scheduler::queue::{Report, ReportQueue};
use crate::storage::QueueStorage;
use crate::update_queue::{CycleTicket, UpdateQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one update cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Scheduler was disabled; persisted state was deleted.
    Purged,
    /// Nothing to send (or disabled mid-cycle).
    Idle,
    /// The collector accepted the batch.
    Delivered {
        /// Number of reports delivered.
        count: usize,
        /// Watermark after delivery.
        high_watermark: IsoDate,
    },
    /// The sender returned `false`; the batch stays queued.
    Retained {
        /// Number of reports still pending.
        pending: usize,
    },
}

struct Inner<T> {
    storage: Arc<dyn QueueStorage<T>>,
    generator: Arc<dyn ReportGenerator<T>>,
    sender: Arc<dyn ReportSender<T>>,
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
}

/// Daily diagnostics report scheduler.
pub struct ReportScheduler<T> {
    inner: Arc<Inner<T>>,
    queue: UpdateQueue,
    send_interval: Duration,
    timer: Mutex<Option<CancellationToken>>,
}

impl<T> ReportScheduler<T>
where
    T: Send + Sync + 'static,
{
    /// Build a disabled scheduler inside the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] if `config` is invalid, or
    /// [`ReportError::Runtime`] when called outside a tokio runtime.
    pub fn new(
        config: &ReporterConfig,
        storage: Arc<dyn QueueStorage<T>>,
        generator: Arc<dyn ReportGenerator<T>>,
        sender: Arc<dyn ReportSender<T>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                generator,
                sender,
                clock,
                enabled: AtomicBool::new(false),
            }),
            queue: UpdateQueue::try_new()?,
            send_interval: config.send_interval(),
            timer: Mutex::new(None),
        })
    }

    /// Whether reporting is currently enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_enabled()
    }

    /// Turn reporting on or off.
    ///
    /// Enabling starts the repeating timer if it is not running and always
    /// queues one immediate cycle. Disabling stops the timer and queues one
    /// cycle that deletes the persisted queue. A cycle already in flight is
    /// not interrupted; the new one runs after it.
    ///
    /// The returned ticket only reports whether the cycle ran. Use
    /// [`set_enabled_and_wait`](Self::set_enabled_and_wait) to see its result.
    pub fn set_enabled(&self, enabled: bool) -> CycleTicket {
        self.apply_enabled(enabled);
        self.trigger()
    }

    /// Like [`set_enabled`](Self::set_enabled), but waits for the immediate
    /// cycle and returns its outcome.
    ///
    /// After `set_enabled_and_wait(false)` returns `Ok(CycleOutcome::Purged)`
    /// the persisted queue is gone.
    ///
    /// # Errors
    ///
    /// Returns the cycle's error (for example [`ReportError::Storage`] when
    /// the queue cannot be deleted), or [`ReportError::Stopped`] if the
    /// worker is gone.
    pub async fn set_enabled_and_wait(&self, enabled: bool) -> Result<CycleOutcome> {
        self.apply_enabled(enabled);
        self.update().await
    }

    fn apply_enabled(&self, enabled: bool) {
        // The flag is only written under the timer lock.
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        self.inner.enabled.store(enabled, Ordering::SeqCst);
        if enabled {
            if timer.is_none() {
                *timer = Some(self.spawn_timer());
                let interval_ms =
                    u64::try_from(self.send_interval.as_millis()).unwrap_or(u64::MAX);
                info!(interval_ms, "diagnostics reporting enabled");
            }
        } else if let Some(token) = timer.take() {
            token.cancel();
            info!("diagnostics reporting disabled");
        }
    }

    /// Queue one update cycle without touching the timer.
    pub fn trigger(&self) -> CycleTicket {
        enqueue_cycle(&self.queue, &self.inner)
    }

    /// Queue one update cycle and wait for its outcome.
    ///
    /// # Errors
    ///
    /// Returns the cycle's error, or [`ReportError::Stopped`] if the worker
    /// is gone.
    pub async fn update(&self) -> Result<CycleOutcome> {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        self.queue.add(async move {
            let _ = tx.send(inner.run_cycle().await);
        });
        rx.await.map_err(|_| ReportError::Stopped)?
    }

    /// Wait until every cycle queued so far has finished.
    pub async fn idle(&self) {
        self.queue.idle().await;
    }

    /// Stop the repeating timer. Already queued cycles still run.
    pub fn shutdown(&self) {
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(token) = timer.take() {
            token.cancel();
            debug!("diagnostics timer stopped");
        }
    }

    fn spawn_timer(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let inner = Arc::clone(&self.inner);
        let queue = self.queue.clone();
        let period = self.send_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        // Wait for the cycle so a slow send delays the next tick
                        // instead of piling up queued cycles.
                        let ticket = enqueue_cycle(&queue, &inner);
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = ticket.wait() => {}
                        }
                    }
                }
            }
            debug!("diagnostics timer exited");
        });

        cancel
    }
}

impl<T> Drop for ReportScheduler<T> {
    fn drop(&mut self) {
        let timer = self.timer.get_mut().unwrap_or_else(|p| p.into_inner());
        if let Some(token) = timer.take() {
            token.cancel();
        }
    }
}

fn enqueue_cycle<T>(queue: &UpdateQueue, inner: &Arc<Inner<T>>) -> CycleTicket
where
    T: Send + Sync + 'static,
{
    let inner = Arc::clone(inner);
    queue.add(async move {
        match inner.run_cycle().await {
            Ok(outcome) => debug!(?outcome, "diagnostics update cycle finished"),
            Err(e) => warn!("diagnostics update cycle failed: {e}"),
        }
    })
}

impl<T> Inner<T>
where
    T: Send + Sync + 'static,
{
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn run_cycle(&self) -> Result<CycleOutcome> {
        if !self.is_enabled() {
            self.storage.remove().await?;
            return Ok(CycleOutcome::Purged);
        }

        let today = IsoDate::of(&self.clock.now());
        let mut queue: ReportQueue<T> = self.storage.get().await.unwrap_or_default();

        let dropped = queue.truncate_to_month(today);
        let mut changed = dropped > 0;
        if dropped > 0 {
            info!(dropped, %today, "dropped reports outside the current month");
        }

        if !queue.covers(today) {
            let payload = self
                .generator
                .generate()
                .await
                .map_err(|e| ReportError::Generator(format!("{e:#}")))?;
            queue.reports.push(Report::new(today, payload));
            changed = true;
            debug!(%today, "generated diagnostics report");
        }

        if changed {
            self.storage.set(&queue).await?;
        }

        if !self.is_enabled() || queue.is_empty() {
            return Ok(CycleOutcome::Idle);
        }

        let pending = queue.reports.len();
        let accepted = self
            .sender
            .send(&queue.reports)
            .await
            .map_err(|e| ReportError::Send(format!("{e:#}")))?;

        if !accepted {
            warn!(pending, "diagnostics delivery rejected; retrying next tick");
            return Ok(CycleOutcome::Retained { pending });
        }

        let high_watermark = queue.mark_delivered(today);
        self.storage.set(&queue).await?;
        info!(count = pending, %high_watermark, "diagnostics reports delivered");
        Ok(CycleOutcome::Delivered {
            count: pending,
            high_watermark,
        })
    }
}
