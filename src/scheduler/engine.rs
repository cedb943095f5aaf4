use super::job::{Job, Skipped};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Main scheduler execution loop.
///
/// Wakes every `tick`, dispatches due jobs, and exits once `cancel` fires.
/// Executions already dispatched live on `tracker` and finish on their own.
pub(crate) async fn run_scheduler_loop(
    jobs: Arc<Mutex<Vec<Job>>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    tick: Duration,
) {
    info!("Scheduler engine started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(tick) => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        run_pending(&jobs, &permits, &tracker, Instant::now());
    }

    info!("Scheduler engine stopped");
}

pub(crate) fn run_pending(jobs: &Mutex<Vec<Job>>, permits: &Arc<Semaphore>, tracker: &TaskTracker, now: Instant) {
    let mut jobs = jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    jobs.retain(|job| {
        if job.is_cancelled() {
            info!(job = %job.name, "Job removed from schedule");
        }
        !job.is_cancelled()
    });

    for job in jobs.iter_mut().filter(|j| j.is_due(now)) {
        job.reschedule(now);
        info!(job = %job.name, "Task due");

        if let Err(Skipped::StillRunning) = job.admit() {
            warn!(job = %job.name, running = job.running(), "Previous execution still running; tick skipped");
            continue;
        }

        match permits.clone().try_acquire_owned() {
            Ok(permit) => job.dispatch(permit, tracker),
            Err(_) => warn!(job = %job.name, reason = ?Skipped::PoolExhausted, "No free worker; tick skipped"),
        }
    }
}
