//! Workflow submission status polling.

pub mod client;
pub mod monitor;

pub use self::client::OrchestrationClient;
pub use self::monitor::{wait_for_completion, WorkflowMonitor};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display format for submission times.
pub const SUBMISSION_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("could not acquire identity token: {0}")]
    Credential(#[from] crate::credentials::CredentialError),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Http { url: String, status: reqwest::StatusCode },

    #[error("unexpected submission document from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid submission date '{value}': {source}")]
    SubmissionDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid orchestration base URL '{url}'")]
    InvalidBaseUrl { url: String },

    #[error("token cannot be used in an authorization header")]
    InvalidToken,

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// Identifies one workflow submission within a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRef {
    pub workspace_namespace: String,
    pub workspace_name: String,
    pub submission_id: String,
}

/// Statuses of a submission that has not finished yet.
pub const IN_PROCESS_STATUSES: [SubmissionStatus; 3] = [
    SubmissionStatus::Queued,
    SubmissionStatus::Submitted,
    SubmissionStatus::Running,
];

/// Submission status as reported by the orchestration service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Queued,
    Submitted,
    Running,
    /// Any other value, including ones never seen before. Terminal.
    Other(String),
}

impl SubmissionStatus {
    /// Exact, case-sensitive match against the in-process names.
    pub fn parse(s: &str) -> Self {
        IN_PROCESS_STATUSES
            .into_iter()
            .find(|status| status.as_str() == s)
            .unwrap_or_else(|| Self::Other(s.to_string()))
    }

    pub fn is_in_process(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "Queued",
            Self::Submitted => "Submitted",
            Self::Running => "Running",
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionEntity {
    pub entity_type: String,
    pub entity_name: String,
}

/// Latest known state of a submission. Everything but the user comment is
/// required, so a snapshot is never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSnapshot {
    pub status: String,
    pub submission_date: String,
    pub submitter: String,
    pub method_configuration_namespace: String,
    pub method_configuration_name: String,
    pub submission_id: String,
    pub submission_entity: SubmissionEntity,
    pub use_call_cache: bool,
    pub user_comment: Option<String>,
    /// The document as received, for JSON output.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl WorkflowSnapshot {
    pub fn from_value(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut snapshot: Self = serde_json::from_value(raw.clone())?;
        snapshot.raw = raw;
        Ok(snapshot)
    }

    pub fn status(&self) -> SubmissionStatus {
        SubmissionStatus::parse(&self.status)
    }

    pub fn method_configuration_display_name(&self) -> String {
        format!("{}/{}", self.method_configuration_namespace, self.method_configuration_name)
    }

    pub fn submission_entity_display_name(&self) -> String {
        format!("{}:{}", self.submission_entity.entity_type, self.submission_entity.entity_name)
    }

    pub fn submitted_at(&self) -> Result<DateTime<Utc>, WorkflowError> {
        DateTime::parse_from_rfc3339(&self.submission_date)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|source| WorkflowError::SubmissionDate {
                value: self.submission_date.clone(),
                source,
            })
    }

    /// Submission time in UTC using `format`, or the raw value when `format` is `None`.
    pub fn submission_time(&self, format: Option<&str>) -> Result<String, WorkflowError> {
        match format {
            Some(fmt) => Ok(self.submitted_at()?.format(fmt).to_string()),
            None => Ok(self.submission_date.clone()),
        }
    }

    /// Multi-line human-readable summary.
    pub fn summary(&self) -> Result<String, WorkflowError> {
        let lines = [
            format!("Method Configuration: {}", self.method_configuration_display_name()),
            format!("Submitter: {}", self.submitter),
            format!("Submitted: {} UTC", self.submission_time(Some(SUBMISSION_TIME_FORMAT))?),
            format!("Submission Id: {}", self.submission_id),
            format!("Submission Entity: {}", self.submission_entity_display_name()),
            format!("Use Call Cache: {}", self.use_call_cache),
            format!("Submission Status: {}", self.status),
            format!("User Comment: {}", self.user_comment.as_deref().unwrap_or("")),
        ];
        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submission_json(status: &str) -> serde_json::Value {
        json!({
            "status": status,
            "submissionDate": "2021-02-03T14:15:16.789Z",
            "submitter": "someone@example.org",
            "methodConfigurationNamespace": "drs-billing-project",
            "methodConfigurationName": "md5sum",
            "submissionId": "32f74aa9-7779-4d28-aec7-641d26307beb",
            "submissionEntity": {"entityType": "sample_set", "entityName": "scale_test"},
            "useCallCache": false,
            "userComment": "scale test",
            "workflows": []
        })
    }

    #[test]
    fn test_in_process_statuses() {
        for status in IN_PROCESS_STATUSES {
            let parsed = SubmissionStatus::parse(status.as_str());
            assert!(parsed.is_in_process(), "{status}");
            assert_eq!(parsed, status);
        }
        assert_eq!(
            SubmissionStatus::parse("Queued"),
            SubmissionStatus::Queued
        );
        for s in ["Done", "Succeeded", "Aborted", "Aborting", "running", "", "Evaluating"] {
            assert!(!SubmissionStatus::parse(s).is_in_process(), "{s}");
        }
    }

    #[test]
    fn test_status_display_roundtrip() {
        assert_eq!(SubmissionStatus::parse("Running").to_string(), "Running");
        assert_eq!(SubmissionStatus::parse("Done").to_string(), "Done");
    }

    #[test]
    fn test_snapshot_parse() {
        let snap = WorkflowSnapshot::from_value(submission_json("Running")).unwrap();
        assert_eq!(snap.status(), SubmissionStatus::Running);
        assert_eq!(snap.method_configuration_display_name(), "drs-billing-project/md5sum");
        assert_eq!(snap.submission_entity_display_name(), "sample_set:scale_test");
        assert_eq!(snap.raw["workflows"], json!([]));
    }

    #[test]
    fn test_snapshot_missing_field_rejected() {
        let mut doc = submission_json("Running");
        doc.as_object_mut().unwrap().remove("submitter");
        assert!(WorkflowSnapshot::from_value(doc).is_err());
    }

    #[test]
    fn test_null_user_comment_allowed() {
        let mut doc = submission_json("Done");
        doc["userComment"] = serde_json::Value::Null;
        let snap = WorkflowSnapshot::from_value(doc).unwrap();
        assert!(snap.summary().unwrap().ends_with("User Comment: "));
    }

    #[test]
    fn test_submission_time_formats() {
        let snap = WorkflowSnapshot::from_value(submission_json("Done")).unwrap();
        assert_eq!(snap.submission_time(None).unwrap(), "2021-02-03T14:15:16.789Z");
        assert_eq!(
            snap.submission_time(Some(SUBMISSION_TIME_FORMAT)).unwrap(),
            "2021/02/03 14:15:16"
        );
    }

    #[test]
    fn test_bad_submission_date() {
        let mut doc = submission_json("Done");
        doc["submissionDate"] = json!("yesterday");
        let snap = WorkflowSnapshot::from_value(doc).unwrap();
        assert!(matches!(snap.summary(), Err(WorkflowError::SubmissionDate { .. })));
    }

    #[test]
    fn test_summary() {
        let snap = WorkflowSnapshot::from_value(submission_json("Succeeded")).unwrap();
        let summary = snap.summary().unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Method Configuration: drs-billing-project/md5sum",
                "Submitter: someone@example.org",
                "Submitted: 2021/02/03 14:15:16 UTC",
                "Submission Id: 32f74aa9-7779-4d28-aec7-641d26307beb",
                "Submission Entity: sample_set:scale_test",
                "Use Call Cache: false",
                "Submission Status: Succeeded",
                "User Comment: scale test",
            ]
        );
    }
}
