//! Fixed-interval job scheduler.
//!
//! One background task wakes every second and spawns each due job on its own
//! task. Dispatch is bounded by a worker semaphore, and each job chooses
//! whether overlapping executions are allowed. Failures inside a job are
//! logged and never stop the schedule.

mod engine;
pub mod job;

pub use self::job::{JobOptions, OverlapPolicy};

use self::job::{Job, JobFn, JobFuture};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("scheduler has been stopped and cannot be restarted")]
    Stopped,

    #[error("scheduler must be started from within a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

pub struct Scheduler {
    jobs: Arc<Mutex<Vec<Job>>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    tick: Duration,
    state: Mutex<SchedulerState>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// A scheduler allowing at most `max_concurrent_jobs` executions at once.
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self::with_tick(max_concurrent_jobs, DEFAULT_TICK)
    }

    pub fn with_tick(max_concurrent_jobs: usize, tick: Duration) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(Vec::new())),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            tick,
            state: Mutex::new(SchedulerState::Idle),
            handle: Mutex::new(None),
        }
    }

    /// Register `job` to run every `interval`, first run one interval from now.
    pub fn every<F, Fut>(&self, interval: Duration, name: impl Into<String>, options: JobOptions, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        info!(job = %name, interval_secs = interval.as_secs_f64(), ?options, "Job scheduled");
        let func: JobFn = Arc::new(move || -> JobFuture { Box::pin(job()) });
        lock(&self.jobs).push(Job::new(name, interval, options, func));
    }

    pub fn job_names(&self) -> Vec<String> {
        lock(&self.jobs).iter().map(|j| j.name.clone()).collect()
    }

    pub fn state(&self) -> SchedulerState {
        *lock(&self.state)
    }

    /// Launch the background loop.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut state = lock(&self.state);
        match *state {
            SchedulerState::Running => return Err(SchedulerError::AlreadyRunning),
            SchedulerState::Stopped => return Err(SchedulerError::Stopped),
            SchedulerState::Idle => {}
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        info!("Starting background response time monitoring");
        let handle = runtime.spawn(engine::run_scheduler_loop(
            self.jobs.clone(),
            self.permits.clone(),
            self.tracker.clone(),
            self.cancel.clone(),
            self.tick,
        ));
        *lock(&self.handle) = Some(handle);
        *state = SchedulerState::Running;
        Ok(())
    }

    /// Stop dispatching new ticks. Executions already in flight continue.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        if *state != SchedulerState::Stopped {
            info!("Stopping background response time monitoring");
        }
        self.cancel.cancel();
        *state = SchedulerState::Stopped;
    }

    /// Wait for the background loop to exit after [`Scheduler::stop`], then
    /// for every execution it dispatched to finish.
    pub async fn wait(&self) {
        let handle = lock(&self.handle).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler loop ended abnormally");
            }
        }

        self.tracker.close();
        if !self.tracker.is_empty() {
            info!(in_flight = self.tracker.len(), "Waiting for in-flight executions to finish");
        }
        self.tracker.wait().await;
    }

    /// Executions dispatched and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
