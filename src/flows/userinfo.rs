//! Fence user lookup with a Bond-issued token.

use super::drs_access::HOP_ACCESS_TOKEN;
use super::{finish, record_hop, Flow, FlowError, FlowResult};
use crate::credentials::TokenProvider;
use crate::probes::{BondClient, Gen3Client};
use async_trait::async_trait;
use std::sync::Arc;

pub const FLOW_NAME: &str = "fence-userinfo";

pub const HOP_USER_INFO: &str = "fence_get_user_info";

const HOPS: &[&str] = &[HOP_ACCESS_TOKEN, HOP_USER_INFO];

pub struct FenceUserInfoFlow {
    tokens: Arc<dyn TokenProvider>,
    bond: BondClient,
    gen3: Gen3Client,
}

impl FenceUserInfoFlow {
    pub fn new(tokens: Arc<dyn TokenProvider>, bond: BondClient, gen3: Gen3Client) -> Self {
        Self { tokens, bond, gen3 }
    }

    async fn run(&self, hops: &mut FlowResult) -> Result<(), FlowError> {
        let user_token = self.tokens.token().await?;

        let fence_token = record_hop(hops, HOP_ACCESS_TOKEN, self.bond.access_token(&user_token).await)?
            .ok_or(FlowError::NoToken { hop: HOP_ACCESS_TOKEN })?;

        record_hop(hops, HOP_USER_INFO, self.gen3.user_info(&fence_token).await)?;
        Ok(())
    }
}

#[async_trait]
impl Flow for FenceUserInfoFlow {
    fn name(&self) -> &'static str {
        FLOW_NAME
    }

    fn output_basename(&self) -> &str {
        "fence_userinfo_response_times"
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
