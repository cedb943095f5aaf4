//! Registered jobs and the wrapper every dispatched execution runs in.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

pub type JobFuture = BoxFuture<'static, anyhow::Result<()>>;
pub type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// What to do when a job comes due while its previous execution is still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Start another execution alongside the running one.
    #[default]
    Allow,
    /// Skip the tick; at most one execution per job at a time.
    Skip,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub overlap: OverlapPolicy,
    /// Remove the job from the schedule after its first failed execution.
    pub cancel_on_failure: bool,
}

pub(crate) struct Job {
    pub name: String,
    pub interval: Duration,
    pub next_run: Instant,
    pub options: JobOptions,
    func: JobFn,
    running: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

/// Why a due job was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Skipped {
    StillRunning,
    PoolExhausted,
}

impl Job {
    pub fn new(name: String, interval: Duration, options: JobOptions, func: JobFn) -> Self {
        Self {
            name,
            next_run: Instant::now() + interval,
            interval,
            options,
            func,
            running: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_run
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Advance to the next slot. Missed intervals are not caught up.
    pub fn reschedule(&mut self, now: Instant) {
        self.next_run = now + self.interval;
    }

    /// Check the overlap policy for a due job.
    pub fn admit(&self) -> Result<(), Skipped> {
        if self.options.overlap == OverlapPolicy::Skip && self.running() > 0 {
            return Err(Skipped::StillRunning);
        }
        Ok(())
    }

    /// Spawn one execution on `tracker`, holding `permit` until it finishes.
    ///
    /// Errors and panics are logged and swallowed.
    pub fn dispatch(&self, permit: OwnedSemaphorePermit, tracker: &TaskTracker) {
        let name = self.name.clone();
        let func = self.func.clone();
        let running = self.running.clone();
        let cancelled = self.cancelled.clone();
        let cancel_on_failure = self.options.cancel_on_failure;

        running.fetch_add(1, Ordering::SeqCst);
        tracker.spawn(async move {
            let _permit = permit;
            let outcome = AssertUnwindSafe(async move { func().await }).catch_unwind().await;

            let failed = match outcome {
                Ok(Ok(())) => {
                    debug!(job = %name, "Job finished");
                    false
                }
                Ok(Err(e)) => {
                    error!(job = %name, error = ?e, "Job failed");
                    true
                }
                Err(panic) => {
                    error!(job = %name, panic = %panic_message(panic.as_ref()), "Job panicked");
                    true
                }
            };

            // Must precede the decrement: a Skip tick may admit the job as
            // soon as `running` reaches zero.
            if failed && cancel_on_failure {
                info!(job = %name, "Cancelling job after failure");
                cancelled.store(true, Ordering::SeqCst);
            }
            running.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
