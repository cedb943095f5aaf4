//! drsprobe -- response-time monitoring for federated DRS data access.
//!
//! This crate times multi-hop access flows against the access broker, the
//! data-index service, and the DRS resolver, appends the results to CSV files
//! on a fixed schedule, and polls workflow submissions until they finish.

pub mod config;
pub mod credentials;
pub mod deployment;
pub mod flows;
pub mod probes;
pub mod report;
pub mod scheduler;
pub mod telemetry;
pub mod workflow;

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DrsProbeConfig;
use crate::credentials::TokenProvider;
use crate::flows::Flow;
use crate::probes::ProbeClient;
use crate::report::Recorder;
use crate::scheduler::{JobOptions, Scheduler};

/// Everything a flow needs, built once per process.
pub struct ProbeContext {
    pub deployment: Arc<deployment::DeploymentConfig>,
    pub http: ProbeClient,
    pub tokens: Arc<dyn TokenProvider>,
    pub recorder: Arc<Recorder>,
}

impl ProbeContext {
    /// Build from configuration, using the ambient credential chain.
    pub fn from_config(config: &DrsProbeConfig) -> Result<Self> {
        let tokens = credentials::ambient(&config.credentials.token_env, &config.credentials.gcloud_path);
        Self::with_tokens(config, tokens)
    }

    pub fn with_tokens(config: &DrsProbeConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let deployment = config.deployment.resolve()?;
        tracing::info!(tier = %deployment.tier, credentials = %tokens.describe(), "Deployment selected");
        let http = ProbeClient::new(Duration::from_secs(config.monitor.http_timeout_secs))?;
        Ok(Self {
            deployment: Arc::new(deployment),
            http,
            tokens,
            recorder: Arc::new(Recorder::new(&config.monitor.output_dir)),
        })
    }

    pub fn flows(&self, names: &[String]) -> Result<Vec<Arc<dyn Flow>>> {
        names
            .iter()
            .map(|name| flows::build(name, &self.http, &self.deployment, &self.tokens).map_err(Into::into))
            .collect()
    }
}

/// Run each named flow once and record it. Returns the files written.
pub async fn probe_once(ctx: &ProbeContext, names: &[String]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for flow in ctx.flows(names)? {
        if let Some(path) = flows::measure_and_report(flow.as_ref(), &ctx.recorder).await? {
            written.push(path);
        }
    }
    Ok(written)
}

/// Resolve once `signal` fires.
///
/// A signal that cannot be listened for is logged and never resolves, so the
/// run period stays the only stop condition.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal; running until the monitoring period elapses");
        std::future::pending::<()>().await;
    }
}

/// Schedule the configured flows and run until `run_for` elapses or
/// `shutdown` resolves, whichever comes first. Executions already started
/// are allowed to finish and record their rows before this returns.
pub async fn monitor(
    ctx: &ProbeContext,
    config: &DrsProbeConfig,
    names: &[String],
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let scheduled = ctx.flows(names)?;
    let options = JobOptions {
        overlap: config.monitor.overlap,
        cancel_on_failure: config.monitor.cancel_on_failure,
    };
    let interval = Duration::from_secs(config.monitor.interval_secs.max(1));

    let scheduler = Scheduler::new(config.monitor.max_concurrent_jobs);
    for flow in scheduled {
        let recorder = ctx.recorder.clone();
        let name = flow.name();
        scheduler.every(interval, name, options, move || {
            let flow = flow.clone();
            let recorder = recorder.clone();
            async move {
                flows::measure_and_report(flow.as_ref(), &recorder)
                    .await
                    .with_context(|| format!("failed to record {} results", flow.name()))?;
                Ok::<(), anyhow::Error>(())
            }
        });
    }

    scheduler.start()?;

    let run_for = config.monitor.run_for_secs;
    let deadline = async move {
        if run_for == 0 {
            std::future::pending::<()>().await
        } else {
            tokio::time::sleep(Duration::from_secs(run_for)).await
        }
    };

    tokio::select! {
        _ = deadline => tracing::info!(run_for_secs = run_for, "Monitoring period elapsed"),
        _ = shutdown => tracing::info!("Shutdown requested"),
    }

    scheduler.stop();
    scheduler.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let fired = tokio::time::timeout(Duration::from_millis(100), shutdown_on(async { Ok::<(), io::Error>(()) })).await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_on_failed_listener_never_resolves() {
        let failed = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no signal handler")) };
        let outcome = tokio::time::timeout(Duration::from_millis(100), shutdown_on(failed)).await;
        assert!(outcome.is_err(), "a failed listener must not trigger shutdown");
    }
}
