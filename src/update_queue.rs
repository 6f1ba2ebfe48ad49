//! Serialized FIFO task runner.
//!
//! Every queue mutation (timer ticks, enable/disable toggles, manual
//! triggers) goes through one [`UpdateQueue`]. A single worker task runs the
//! submitted futures to completion one at a time in submission order, so a
//! disable-triggered purge can never interleave with an in-flight load/save.

use futures_util::FutureExt;
use crate::error::{ReportError, Result};
use futures_util::future::BoxFuture;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

struct Job {
    task: BoxFuture<'static, ()>,
    done: oneshot::Sender<bool>,
}

/// Completion handle for one queued task.
///
/// Dropping the ticket does not cancel the task.
#[derive(Debug)]
pub struct CycleTicket {
    done: oneshot::Receiver<bool>,
}

impl CycleTicket {
    /// Wait for the task to finish.
    ///
    /// Returns `false` if the task panicked or the worker went away before
    /// running it.
    pub async fn wait(self) -> bool {
        self.done.await.unwrap_or(false)
    }
}

/// Single-consumer task queue.
///
/// Cloning yields another handle onto the same worker.
#[derive(Debug, Clone)]
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl UpdateQueue {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. See [`try_new`](Self::try_new).
    pub fn new() -> Self {
        Self::spawn_on(&Handle::current())
    }

    /// Spawn the worker on the current tokio runtime, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Runtime`] when called outside a tokio runtime.
    pub fn try_new() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| ReportError::Runtime(e.to_string()))?;
        Ok(Self::spawn_on(&handle))
    }

    fn spawn_on(handle: &Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_worker(rx));
        Self { tx }
    }

    /// Queue `task` behind everything already submitted.
    pub fn add<F>(&self, task: F) -> CycleTicket
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job = Job {
            task: task.boxed(),
            done: done_tx,
        };
        if self.tx.send(job).is_err() {
            // The worker only stops once every handle is gone; the ticket
            // resolves to `false` because `done_tx` was dropped with the job.
            debug!("update queue worker stopped; task discarded");
        }
        CycleTicket { done: done_rx }
    }

    /// Wait until every task submitted before this call has finished.
    pub async fn idle(&self) {
        let _ = self.add(async {}).wait().await;
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_worker(mut rx: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = rx.recv().await {
        let completed = AssertUnwindSafe(job.task).catch_unwind().await.is_ok();
        if !completed {
            error!("queued update task panicked; continuing with next task");
        }
        let _ = job.done.send(completed);
    }
    debug!("update queue worker exiting");
}
