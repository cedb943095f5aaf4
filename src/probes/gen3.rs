//! Data-index service (Gen3 indexd / Fence) client.

use super::drs::object_id;
use super::http::{bearer_headers, bearer_headers_any, json_headers};
use super::{ProbeClient, ProbeError, ProbeResult};
use crate::deployment::DeploymentConfig;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Gen3Client {
    http: ProbeClient,
    deployment: Arc<DeploymentConfig>,
}

impl Gen3Client {
    pub fn new(http: ProbeClient, deployment: Arc<DeploymentConfig>) -> Self {
        Self { http, deployment }
    }

    fn objects_url(&self, drs_uri: &str) -> Result<String, ProbeError> {
        Ok(format!(
            "{}/ga4gh/drs/v1/objects/{}",
            self.deployment.gen3_base_url(),
            object_id(drs_uri)?
        ))
    }

    /// Resolve DRS object metadata. Unauthenticated.
    pub async fn drs_metadata(&self, drs_uri: &str) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        self.http.get(&self.objects_url(drs_uri)?, json_headers()).await
    }

    /// Request a signed URL for one access method of a DRS object.
    pub async fn drs_access_url(
        &self,
        fence_token: &str,
        drs_uri: &str,
        access_id: &str,
    ) -> Result<(Option<String>, ProbeResult), ProbeError> {
        let url = format!("{}/access/{}", self.objects_url(drs_uri)?, access_id);
        let (body, result) = self.http.get(&url, bearer_headers(fence_token)?).await?;
        let signed = body
            .as_ref()
            .and_then(|b| b.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok((signed, result))
    }

    /// Fence user record for the token holder.
    pub async fn user_info(&self, fence_token: &str) -> Result<(Option<Value>, ProbeResult), ProbeError> {
        let url = format!("{}/user/user/", self.deployment.gen3_base_url());
        self.http.get(&url, bearer_headers_any(fence_token)?).await
    }
}
