//! DRS resolution service (Martha) client.

use super::http::bearer_headers;
use super::{ProbeClient, ProbeError, ProbeResult};
use crate::deployment::DeploymentConfig;
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MarthaClient {
    http: ProbeClient,
    deployment: Arc<DeploymentConfig>,
}

impl MarthaClient {
    pub fn new(http: ProbeClient, deployment: Arc<DeploymentConfig>) -> Self {
        Self { http, deployment }
    }

    pub async fn resolve(&self, user_token: &str, drs_uri: &str) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        let url = format!("{}/martha_v3/", self.deployment.martha_base_url());
        self.http
            .post(&url, bearer_headers(user_token)?, &json!({ "url": drs_uri }))
            .await
    }
}
