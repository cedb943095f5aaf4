//! Static registry of deployment tiers and the service hosts each one uses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CLOUD_URI_SCHEME: &str = "gs";

const BDC_STAGING_DRS_URI: &str = "drs://dg.712C:dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0";

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("unknown deployment tier '{tier}' (known: {known})")]
    UnknownTier { tier: String, known: String },
}

/// Hostnames and URIs for one deployment tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub tier: String,
    /// Access broker (Bond) host.
    pub bond_host: String,
    /// Identity provider name used in Bond paths.
    pub bond_provider: String,
    /// Token/DRS resolution service (Martha) host.
    pub martha_host: String,
    /// Data-index service (Gen3 indexd and Fence) host.
    pub gen3_host: String,
    /// Publicly resolvable DRS object used by the access flows.
    pub public_drs_uri: String,
    /// Access-method type selected when requesting a signed URL.
    pub cloud_uri_scheme: String,
    /// Workflow orchestration API base URL, no trailing slash.
    pub orchestration_url: String,
}

impl DeploymentConfig {
    pub fn bond_base_url(&self) -> String {
        base_url(&self.bond_host)
    }

    pub fn martha_base_url(&self) -> String {
        base_url(&self.martha_host)
    }

    pub fn gen3_base_url(&self) -> String {
        base_url(&self.gen3_host)
    }
}

/// Hosts are normally bare names reached over HTTPS; a value that already
/// carries a scheme is used as-is.
fn base_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", host.trim_end_matches('/'))
    }
}

/// Orchestration API URL for a tier.
pub fn orchestration_url(tier: &str) -> String {
    format!(
        "https://firecloud-orchestration.dsde-{}.broadinstitute.org",
        tier.to_lowercase()
    )
}

pub const KNOWN_TIERS: &[&str] = &["dev", "alpha", "staging", "prod"];

const BDC_STAGING_GEN3_HOST: &str = "staging.gen3.biodatacatalyst.nhlbi.nih.gov";
const BDC_PROD_GEN3_HOST: &str = "gen3.biodatacatalyst.nhlbi.nih.gov";

/// Look up a tier by name, case-insensitively.
///
/// Only the `dev` hosts are known-good. The other tiers reuse the `dev`
/// naming scheme with the tier substituted, and `prod` alone targets the
/// production Gen3 commons; override any of them under `[deployment]` when a
/// tier names its hosts differently.
pub fn lookup(tier: &str) -> Result<DeploymentConfig, DeploymentError> {
    let tier = tier.to_lowercase();
    if !KNOWN_TIERS.contains(&tier.as_str()) {
        return Err(DeploymentError::UnknownTier {
            tier,
            known: KNOWN_TIERS.join(", "),
        });
    }

    let bond_host = format!("broad-bond-{}.appspot.com", tier);
    let martha_host = format!("us-central1-broad-dsde-{}.cloudfunctions.net", tier);
    let gen3_host = if tier == "prod" {
        BDC_PROD_GEN3_HOST
    } else {
        BDC_STAGING_GEN3_HOST
    };

    Ok(DeploymentConfig {
        orchestration_url: orchestration_url(&tier),
        tier,
        bond_host,
        bond_provider: "fence".to_string(),
        martha_host,
        gen3_host: gen3_host.to_string(),
        public_drs_uri: BDC_STAGING_DRS_URI.to_string(),
        cloud_uri_scheme: DEFAULT_CLOUD_URI_SCHEME.to_string(),
    })
}

/// Every registered tier, in registry order.
pub fn all() -> Vec<DeploymentConfig> {
    KNOWN_TIERS.iter().filter_map(|t| lookup(t).ok()).collect()
}
