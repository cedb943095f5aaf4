//! Workflow orchestration API client.

use super::{SubmissionRef, WorkflowError, WorkflowSnapshot};
use crate::probes::bearer_headers;
use reqwest::{Client, Url};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OrchestrationClient {
    client: Client,
    base_url: String,
}

impl OrchestrationClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn submission_url(&self, submission: &SubmissionRef) -> Result<Url, WorkflowError> {
        let invalid = || WorkflowError::InvalidBaseUrl {
            url: self.base_url.clone(),
        };
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend([
                "api",
                "workspaces",
                submission.workspace_namespace.as_str(),
                submission.workspace_name.as_str(),
                "submissions",
                submission.submission_id.as_str(),
            ]);
        Ok(url)
    }

    /// Fetch the current submission document. Any non-success status is an error.
    pub async fn fetch_submission(&self, token: &str, submission: &SubmissionRef) -> Result<WorkflowSnapshot, WorkflowError> {
        let url = self.submission_url(submission)?;
        let url_str = url.to_string();
        let headers = bearer_headers(token).map_err(|_| WorkflowError::InvalidToken)?;

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|source| WorkflowError::Transport {
                url: url_str.clone(),
                source,
            })?;

        debug!(url = %response.url(), "Request URL");

        let status = response.status();
        if !status.is_success() {
            return Err(WorkflowError::Http { url: url_str, status });
        }

        let body = response.bytes().await.map_err(|source| WorkflowError::Transport {
            url: url_str.clone(),
            source,
        })?;
        let raw: serde_json::Value = serde_json::from_slice(&body).map_err(|source| WorkflowError::Decode {
            url: url_str.clone(),
            source,
        })?;
        WorkflowSnapshot::from_value(raw).map_err(|source| WorkflowError::Decode { url: url_str, source })
    }
}
