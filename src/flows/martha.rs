//! Single-hop DRS resolution through Martha.

use super::{finish, record_hop, Flow, FlowError, FlowResult};
use crate::credentials::TokenProvider;
use crate::probes::MarthaClient;
use async_trait::async_trait;
use std::sync::Arc;

pub const FLOW_NAME: &str = "martha-resolve";

pub const HOP_RESOLVE: &str = "martha_resolve_drs";

pub struct MarthaResolveFlow {
    tokens: Arc<dyn TokenProvider>,
    martha: MarthaClient,
    drs_uri: String,
}

impl MarthaResolveFlow {
    pub fn new(tokens: Arc<dyn TokenProvider>, martha: MarthaClient, drs_uri: String) -> Self {
        Self { tokens, martha, drs_uri }
    }

    async fn run(&self, hops: &mut FlowResult) -> Result<(), FlowError> {
        let user_token = self.tokens.token().await?;
        record_hop(hops, HOP_RESOLVE, self.martha.resolve(&user_token, &self.drs_uri).await)?;
        Ok(())
    }
}

#[async_trait]
impl Flow for MarthaResolveFlow {
    fn name(&self) -> &'static str {
        FLOW_NAME
    }

    fn output_basename(&self) -> &str {
        "martha_resolve_response_times"
    }

    fn hops(&self) -> &'static [&'static str] {
        &[HOP_RESOLVE]
    }

    async fn measure(&self) -> FlowResult {
        let mut hops = FlowResult::new();
        let outcome = self.run(&mut hops).await;
        finish(FLOW_NAME, hops, outcome)
    }
}
