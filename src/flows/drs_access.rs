//! End-to-end DRS access: metadata, token exchange, signed URL.

use super::{finish, record_hop, Flow, FlowError, FlowResult};
use crate::credentials::TokenProvider;
use crate::probes::drs::access_id_for_scheme;
use crate::probes::{BondClient, Gen3Client};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub const FLOW_NAME: &str = "drs-access";

pub const HOP_METADATA: &str = "indexd_get_metadata";
pub const HOP_ACCESS_TOKEN: &str = "bond_get_access_token";
pub const HOP_SA_KEY: &str = "bond_get_sa_key";
pub const HOP_SIGNED_URL: &str = "fence_get_signed_url";

const HOPS: &[&str] = &[HOP_METADATA, HOP_ACCESS_TOKEN, HOP_SA_KEY, HOP_SIGNED_URL];

pub struct DrsAccessFlow {
    tokens: Arc<dyn TokenProvider>,
    bond: BondClient,
    gen3: Gen3Client,
    drs_uri: String,
    cloud_uri_scheme: String,
}

impl DrsAccessFlow {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        bond: BondClient,
        gen3: Gen3Client,
        drs_uri: String,
        cloud_uri_scheme: String,
    ) -> Self {
        Self {
            tokens,
            bond,
            gen3,
            drs_uri,
            cloud_uri_scheme,
        }
    }

    async fn run(&self, hops: &mut FlowResult) -> Result<(), FlowError> {
        let user_token = self.tokens.token().await?;

        let metadata = record_hop(hops, HOP_METADATA, self.gen3.drs_metadata(&self.drs_uri).await)?;

        let fence_token = record_hop(hops, HOP_ACCESS_TOKEN, self.bond.access_token(&user_token).await)?
            .ok_or(FlowError::NoToken { hop: HOP_ACCESS_TOKEN })?;

        // Informational only; the key itself is not used further.
        let sa_key = record_hop(hops, HOP_SA_KEY, self.bond.service_account_key(&user_token).await)?;
        debug!(present = sa_key.is_some(), "Service account key fetched");

        let access_id = match &metadata {
            Some(m) => access_id_for_scheme(m, &self.cloud_uri_scheme)
                .map_err(|source| FlowError::Hop { hop: HOP_METADATA, source })?,
            None => None,
        };

        let Some(access_id) = access_id else {
            warn!(scheme = %self.cloud_uri_scheme, "No matching access method; signed URL not requested");
            return Ok(());
        };

        let signed_url = record_hop(
            hops,
            HOP_SIGNED_URL,
            self.gen3.drs_access_url(&fence_token, &self.drs_uri, &access_id).await,
        )?;
        debug!(present = signed_url.is_some(), "Signed URL fetched");

        Ok(())
    }
}

#[async_trait]
impl Flow for DrsAccessFlow {
    fn name(&self) -> &'static str {
        FLOW_NAME
    }

    fn output_basename(&self) -> &str {
        "drs_flow_response_times"
    }

    fn hops(&self) -> &'static [&'static str] {
        HOPS
    }

    async fn measure(&self) -> FlowResult {
        let mut hops = FlowResult::new();
        let outcome = self.run(&mut hops).await;
        finish(FLOW_NAME, hops, outcome)
    }
}
