//! Access broker (Bond) client.

use super::http::bearer_headers;
use super::{ProbeClient, ProbeError, ProbeResult};
use crate::deployment::DeploymentConfig;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BondClient {
    http: ProbeClient,
    deployment: Arc<DeploymentConfig>,
}

impl BondClient {
    pub fn new(http: ProbeClient, deployment: Arc<DeploymentConfig>) -> Self {
        Self { http, deployment }
    }

    fn link_url(&self, resource: &str) -> String {
        format!(
            "{}/api/link/v1/{}/{}",
            self.deployment.bond_base_url(),
            self.deployment.bond_provider,
            resource
        )
    }

    /// Exchange the caller's identity token for a provider access token.
    pub async fn access_token(&self, user_token: &str) -> Result<(Option<String>, ProbeResult), ProbeError> {
        let (body, result) = self
            .http
            .get(&self.link_url("accesstoken"), bearer_headers(user_token)?)
            .await?;
        let token = body
            .as_ref()
            .and_then(|b| b.get("token"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok((token, result))
    }

    /// Fetch the provider service-account key linked to the caller.
    pub async fn service_account_key(&self, user_token: &str) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        let (body, result) = self
            .http
            .get(&self.link_url("serviceaccount/key"), bearer_headers(user_token)?)
            .await?;
        let key = body.and_then(|mut b| b.get_mut("data").map(Value::take));
        Ok((key, result))
    }
}
