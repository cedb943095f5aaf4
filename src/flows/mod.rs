//! Multi-hop access flows.
//!
//! A flow chains several timed calls, each feeding the next, and returns the
//! per-hop results it managed to collect. Failures stop the chain at the
//! flow boundary; they never escape [`Flow::measure`].

pub mod drs_access;
pub mod martha;
pub mod userinfo;

pub use self::drs_access::DrsAccessFlow;
pub use self::martha::MarthaResolveFlow;
pub use self::userinfo::FenceUserInfoFlow;

use crate::credentials::{CredentialError, TokenProvider};
use crate::deployment::DeploymentConfig;
use crate::probes::{BondClient, Gen3Client, MarthaClient, ProbeClient, ProbeError, ProbeResult};
use crate::report::{RecordError, Recorder};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn, Instrument};

/// Per-hop results of one flow execution, in the order hops were recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowResult {
    hops: Vec<(String, ProbeResult)>,
}

impl FlowResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hop. Re-recording an existing hop replaces it in place.
    pub fn insert(&mut self, hop: impl Into<String>, result: ProbeResult) {
        let hop = hop.into();
        match self.hops.iter_mut().find(|(name, _)| *name == hop) {
            Some(slot) => slot.1 = result,
            None => self.hops.push((hop, result)),
        }
    }

    pub fn get(&self, hop: &str) -> Option<&ProbeResult> {
        self.hops.iter().find(|(name, _)| name == hop).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    pub fn hop_names(&self) -> impl Iterator<Item = &str> {
        self.hops.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.hops.iter().map(|(name, r)| (name.as_str(), r))
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("could not acquire identity token: {0}")]
    Credential(#[from] CredentialError),

    #[error("hop '{hop}' failed: {source}")]
    Hop {
        hop: &'static str,
        #[source]
        source: ProbeError,
    },

    #[error("hop '{hop}' returned no token")]
    NoToken { hop: &'static str },
}

/// A measurable chain of calls.
#[async_trait]
pub trait Flow: Send + Sync {
    /// Identifier used on the command line and in logs.
    fn name(&self) -> &'static str;

    /// Result file basename; the recorder adds the run stamp and extension.
    fn output_basename(&self) -> &str;

    /// Hop names this flow can record, in order.
    fn hops(&self) -> &'static [&'static str];

    /// Run the chain once. Never fails; returns whatever hops completed.
    async fn measure(&self) -> FlowResult;
}

/// Record the outcome of one hop and pass its value on.
///
/// A failed request still records the sentinel result it carries.
pub(crate) fn record_hop<T>(
    hops: &mut FlowResult,
    hop: &'static str,
    outcome: Result<(T, ProbeResult), ProbeError>,
) -> Result<T, FlowError> {
    match outcome {
        Ok((value, result)) => {
            hops.insert(hop, result);
            Ok(value)
        }
        Err(source) => {
            if let Some(result) = source.probe_result() {
                hops.insert(hop, result.clone());
            }
            Err(FlowError::Hop { hop, source })
        }
    }
}

/// Log a flow failure and hand back the partial result.
pub(crate) fn finish(flow: &str, hops: FlowResult, outcome: Result<(), FlowError>) -> FlowResult {
    if let Err(e) = outcome {
        warn!(%flow, completed = hops.len(), error = %e, "Exception occurred during flow");
    }
    hops
}

/// Run a flow once and append its result to the flow's output file.
///
/// Returns the file written, or `None` when the flow recorded no hops.
pub async fn measure_and_report(flow: &dyn Flow, recorder: &Recorder) -> Result<Option<PathBuf>, RecordError> {
    let span = tracing::info_span!("flow", flow = flow.name(), run_id = %uuid::Uuid::new_v4());
    let result = flow.measure().instrument(span).await;

    if result.is_empty() {
        warn!(flow = flow.name(), "Flow recorded no hops; nothing written");
        return Ok(None);
    }

    let path = recorder.record(&result, flow.output_basename())?;
    info!(flow = flow.name(), hops = result.len(), path = %path.display(), "Flow result recorded");
    Ok(Some(path))
}

/// Names accepted by [`build`].
pub const FLOW_NAMES: &[&str] = &[
    drs_access::FLOW_NAME,
    martha::FLOW_NAME,
    userinfo::FLOW_NAME,
];

#[derive(Debug, Error)]
#[error("unknown flow '{name}' (known: {known})")]
pub struct UnknownFlow {
    pub name: String,
    pub known: String,
}

/// Construct a flow by name against one deployment.
pub fn build(
    name: &str,
    http: &ProbeClient,
    deployment: &Arc<DeploymentConfig>,
    tokens: &Arc<dyn TokenProvider>,
) -> Result<Arc<dyn Flow>, UnknownFlow> {
    let flow: Arc<dyn Flow> = match name {
        drs_access::FLOW_NAME => Arc::new(DrsAccessFlow::new(
            tokens.clone(),
            BondClient::new(http.clone(), deployment.clone()),
            Gen3Client::new(http.clone(), deployment.clone()),
            deployment.public_drs_uri.clone(),
            deployment.cloud_uri_scheme.clone(),
        )),
        martha::FLOW_NAME => Arc::new(MarthaResolveFlow::new(
            tokens.clone(),
            MarthaClient::new(http.clone(), deployment.clone()),
            deployment.public_drs_uri.clone(),
        )),
        userinfo::FLOW_NAME => Arc::new(FenceUserInfoFlow::new(
            tokens.clone(),
            BondClient::new(http.clone(), deployment.clone()),
            Gen3Client::new(http.clone(), deployment.clone()),
        )),
        _ => {
            return Err(UnknownFlow {
                name: name.to_string(),
                known: FLOW_NAMES.join(", "),
            })
        }
    };
    Ok(flow)
}
