use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use drsprobe::config::DrsProbeConfig;
use drsprobe::scheduler::OverlapPolicy;
use drsprobe::workflow::{self, OrchestrationClient, SubmissionRef, WorkflowMonitor};

#[derive(Parser)]
#[command(
    name = "drsprobe",
    about = "Response-time monitoring for DRS data access and workflow submissions",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Periodically measure access flows and append results to CSV
    Monitor {
        /// Deployment tier (dev, alpha, staging, prod)
        #[arg(long)]
        tier: Option<String>,

        /// Seconds between runs of each flow
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Stop after this many seconds (0 = until Ctrl-C)
        #[arg(long)]
        run_for_secs: Option<u64>,

        /// Flow to schedule; repeatable
        #[arg(long = "flow")]
        flows: Vec<String>,

        /// Skip a tick while the previous run of the same flow is still going
        #[arg(long)]
        single_flight: bool,

        /// Directory for result files
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Measure each flow once and append the result
    Probe {
        /// Deployment tier (dev, alpha, staging, prod)
        #[arg(long)]
        tier: Option<String>,

        /// Flow to run; repeatable
        #[arg(long = "flow")]
        flows: Vec<String>,

        /// Directory for result files
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Show a workflow submission and optionally wait for it to finish
    WorkflowStatus {
        /// Deployment tier hosting the orchestration service
        #[arg(long)]
        tier: Option<String>,

        /// Workspace namespace (billing project)
        #[arg(long)]
        namespace: String,

        /// Workspace name
        #[arg(long)]
        name: String,

        /// Submission id
        #[arg(long)]
        submission_id: String,

        /// Print the raw submission document as JSON
        #[arg(long)]
        json: bool,

        /// Poll until the submission leaves the in-process states
        #[arg(long)]
        wait: bool,

        /// Seconds between polls when waiting
        #[arg(long)]
        poll_secs: Option<u64>,
    },

    /// List known deployment tiers
    Tiers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DrsProbeConfig::load(path)?,
        None => DrsProbeConfig::load_or_default()?,
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    match cli.command {
        Commands::Monitor {
            tier,
            interval_secs,
            run_for_secs,
            flows,
            single_flight,
            output_dir,
        } => {
            apply_probe_overrides(&mut config, tier, flows, output_dir);
            if let Some(secs) = interval_secs {
                config.monitor.interval_secs = secs;
            }
            if let Some(secs) = run_for_secs {
                config.monitor.run_for_secs = secs;
            }
            if single_flight {
                config.monitor.overlap = OverlapPolicy::Skip;
            }
            drsprobe::telemetry::init(&config.logging)?;

            let ctx = drsprobe::ProbeContext::from_config(&config)?;
            let names = config.monitor.flows.clone();
            tracing::info!(flows = ?names, interval_secs = config.monitor.interval_secs, "Starting monitor");
            println!("Starting background response time monitoring");
            drsprobe::monitor(&ctx, &config, &names, drsprobe::shutdown_on(tokio::signal::ctrl_c())).await?;
            println!("Stopped background response time monitoring");
        }
        Commands::Probe { tier, flows, output_dir } => {
            apply_probe_overrides(&mut config, tier, flows, output_dir);
            drsprobe::telemetry::init(&config.logging)?;

            let ctx = drsprobe::ProbeContext::from_config(&config)?;
            let written = drsprobe::probe_once(&ctx, &config.monitor.flows).await?;
            if written.is_empty() {
                println!("No results recorded; see the log for details.");
            }
            for path in written {
                println!("Recorded: {}", path.display());
            }
        }
        Commands::WorkflowStatus {
            tier,
            namespace,
            name,
            submission_id,
            json,
            wait,
            poll_secs,
        } => {
            if let Some(tier) = tier {
                config.deployment.tier = tier;
            }
            drsprobe::telemetry::init(&config.logging)?;

            let deployment = config.deployment.resolve()?;
            let tokens = drsprobe::credentials::ambient(&config.credentials.token_env, &config.credentials.gcloud_path);
            let client = OrchestrationClient::new(
                reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.monitor.http_timeout_secs))
                    .build()
                    .context("Failed to build HTTP client")?,
                deployment.orchestration_url.clone(),
            );
            let submission = SubmissionRef {
                workspace_namespace: namespace,
                workspace_name: name,
                submission_id,
            };
            let mut monitor = WorkflowMonitor::new(client, Arc::clone(&tokens), submission);

            let snapshot = monitor.snapshot().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.raw)?);
            }
            println!("Submission time: {}", snapshot.submission_time(None)?);
            println!("Submission Summary:\n{}", snapshot.summary()?);
            println!("Workflow in process: {}", monitor.is_in_process());

            if wait {
                let poll = Duration::from_secs(poll_secs.unwrap_or(config.workflow.poll_interval_secs));
                workflow::wait_for_completion(&mut monitor, poll, &mut std::io::stdout()).await?;
            }
        }
        Commands::Tiers => {
            println!("{:<8} | {:<32} | {:<45} | Orchestration", "Tier", "Bond", "Gen3");
            println!("{:-<8}-|-{:-<32}-|-{:-<45}-|-{:-<20}", "", "", "", "");
            for d in drsprobe::deployment::all() {
                println!(
                    "{:<8} | {:<32} | {:<45} | {}",
                    d.tier, d.bond_host, d.gen3_host, d.orchestration_url
                );
            }
        }
    }

    Ok(())
}

fn apply_probe_overrides(
    config: &mut DrsProbeConfig,
    tier: Option<String>,
    flows: Vec<String>,
    output_dir: Option<PathBuf>,
) {
    if let Some(tier) = tier {
        config.deployment.tier = tier;
    }
    if !flows.is_empty() {
        config.monitor.flows = flows;
    }
    if let Some(dir) = output_dir {
        config.monitor.output_dir = dir;
    }
}
