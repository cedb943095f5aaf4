//! TOML configuration for drsprobe.
//!
//! Every section falls back to compiled-in defaults, so an empty file (or no
//! file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::DEFAULT_TOKEN_ENV;
use crate::deployment::{self, DeploymentConfig, DeploymentError};
use crate::scheduler::OverlapPolicy;

pub const CONFIG_ENV: &str = "DRSPROBE_CONFIG";
pub const LOCAL_CONFIG_FILE: &str = "drsprobe.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrsProbeConfig {
    #[serde(default)]
    pub deployment: DeploymentSection,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DrsProbeConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try, in order: `$DRSPROBE_CONFIG`, `./drsprobe.toml`, defaults.
    ///
    /// A file that is named or present but cannot be loaded is an error;
    /// only the absence of both falls back to defaults.
    pub fn load_or_default() -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::discover(env_path.as_deref(), Path::new(LOCAL_CONFIG_FILE))
    }

    fn discover(env_path: Option<&Path>, local: &Path) -> Result<Self> {
        if let Some(path) = env_path {
            return Self::load(path).with_context(|| format!("{} is set but could not be loaded", CONFIG_ENV));
        }
        if local.exists() {
            return Self::load(local);
        }
        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// Tier selection plus optional per-host overrides of the registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSection {
    pub tier: String,
    pub bond_host: Option<String>,
    pub bond_provider: Option<String>,
    pub martha_host: Option<String>,
    pub gen3_host: Option<String>,
    pub public_drs_uri: Option<String>,
    pub cloud_uri_scheme: Option<String>,
    pub orchestration_url: Option<String>,
}

impl Default for DeploymentSection {
    fn default() -> Self {
        Self {
            tier: "dev".to_string(),
            bond_host: None,
            bond_provider: None,
            martha_host: None,
            gen3_host: None,
            public_drs_uri: None,
            cloud_uri_scheme: None,
            orchestration_url: None,
        }
    }
}

impl DeploymentSection {
    /// Registry entry for `tier`, with any overrides applied.
    pub fn resolve(&self) -> Result<DeploymentConfig, DeploymentError> {
        let mut cfg = deployment::lookup(&self.tier)?;
        let overrides = [
            (&mut cfg.bond_host, &self.bond_host),
            (&mut cfg.bond_provider, &self.bond_provider),
            (&mut cfg.martha_host, &self.martha_host),
            (&mut cfg.gen3_host, &self.gen3_host),
            (&mut cfg.public_drs_uri, &self.public_drs_uri),
            (&mut cfg.cloud_uri_scheme, &self.cloud_uri_scheme),
            (&mut cfg.orchestration_url, &self.orchestration_url),
        ];
        for (field, value) in overrides {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Environment variable holding a ready-made bearer token.
    pub token_env: String,
    /// gcloud binary used when the variable is unset.
    pub gcloud_path: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            gcloud_path: "gcloud".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between executions of each flow.
    pub interval_secs: u64,
    /// How long `monitor` runs before stopping. 0 runs until interrupted.
    pub run_for_secs: u64,
    /// Flows to schedule, by name.
    pub flows: Vec<String>,
    pub overlap: OverlapPolicy,
    /// Upper bound on flow executions in flight at once.
    pub max_concurrent_jobs: usize,
    /// Drop a flow from the schedule after its first failed execution.
    pub cancel_on_failure: bool,
    /// Directory receiving the result CSV files.
    pub output_dir: PathBuf,
    /// Per-request timeout.
    pub http_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            run_for_secs: 90,
            flows: vec![crate::flows::drs_access::FLOW_NAME.to_string()],
            overlap: OverlapPolicy::Allow,
            max_concurrent_jobs: 4,
            cancel_on_failure: false,
            output_dir: PathBuf::from("."),
            http_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub poll_interval_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 30 }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Log file, truncated at startup. Logs go to stderr when unset.
    pub file: Option<PathBuf>,
    /// Emit JSON lines instead of plain text.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
            file: Some(PathBuf::from("drsprobe.log")),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
