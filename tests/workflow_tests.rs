//! Submission polling against an in-process orchestration mock.

mod common;

use common::{MockState, USER_TOKEN};
use drsprobe::credentials::{StaticToken, TokenProvider};
use drsprobe::workflow::{
    wait_for_completion, OrchestrationClient, SubmissionRef, SubmissionStatus, WorkflowError, WorkflowMonitor,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SUBMISSION_ID: &str = "32f74aa9-7779-4d28-aec7-641d26307beb";

fn submission() -> SubmissionRef {
    SubmissionRef {
        workspace_namespace: "drs-billing-project".to_string(),
        workspace_name: "DRS Data Access Scale Testing".to_string(),
        submission_id: SUBMISSION_ID.to_string(),
    }
}

async fn monitor_with(statuses: &[&str]) -> (WorkflowMonitor, Arc<MockState>) {
    let state = Arc::new(MockState {
        statuses: Mutex::new(statuses.iter().map(|s| s.to_string()).collect::<VecDeque<_>>()),
        ..Default::default()
    });
    let base = common::spawn_mock(state.clone()).await;
    let client = OrchestrationClient::new(common::http_client(), base);
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(USER_TOKEN));
    (WorkflowMonitor::new(client, tokens, submission()), state)
}

#[tokio::test]
async fn test_snapshot_is_cached_until_update() {
    let (mut monitor, state) = monitor_with(&["Running", "Done"]).await;
    assert!(!monitor.is_in_process());
    assert!(monitor.latest().is_none());

    assert_eq!(monitor.snapshot().await.unwrap().status, "Running");
    assert_eq!(monitor.snapshot().await.unwrap().status, "Running");
    assert_eq!(state.requests().len(), 1);
    assert!(monitor.is_in_process());

    assert_eq!(monitor.update().await.unwrap().status, "Done");
    assert_eq!(monitor.status(), Some(SubmissionStatus::Other("Done".to_string())));
    assert!(!monitor.is_in_process());
    assert_eq!(state.requests().len(), 2);
}

#[tokio::test]
async fn test_workspace_name_is_path_encoded() {
    let (mut monitor, state) = monitor_with(&["Done"]).await;
    monitor.snapshot().await.unwrap();
    assert_eq!(
        state.requests(),
        vec![format!(
            "submission drs-billing-project/DRS Data Access Scale Testing/{}",
            SUBMISSION_ID
        )]
    );
}

#[tokio::test]
async fn test_wait_for_completion_polls_until_terminal() {
    let (mut monitor, state) = monitor_with(&["Queued", "Running", "Succeeded"]).await;
    let mut out = Vec::new();

    let status = wait_for_completion(&mut monitor, Duration::from_millis(10), &mut out)
        .await
        .unwrap();

    assert_eq!(status, SubmissionStatus::Other("Succeeded".to_string()));
    assert_eq!(state.requests().len(), 3);

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Submission status: Queued",
            "Sleeping for 0.01 seconds ...",
            "Getting current submission status ... ",
            "Submission status: Running",
            "Sleeping for 0.01 seconds ...",
            "Getting current submission status ... ",
            "Final Submission status: Succeeded",
        ]
    );
}

#[tokio::test]
async fn test_wait_for_completion_returns_immediately_when_done() {
    let (mut monitor, state) = monitor_with(&["Aborted"]).await;
    let mut out = Vec::new();

    let status = wait_for_completion(&mut monitor, Duration::from_secs(60), &mut out)
        .await
        .unwrap();

    assert_eq!(status.as_str(), "Aborted");
    assert_eq!(state.requests().len(), 1);
    assert_eq!(String::from_utf8(out).unwrap(), "Final Submission status: Aborted\n");
}

#[tokio::test]
async fn test_missing_submission_is_an_error() {
    let (mut monitor, _) = monitor_with(&[]).await;
    let mut out = Vec::new();

    let err = wait_for_completion(&mut monitor, Duration::from_millis(10), &mut out)
        .await
        .unwrap_err();

    match err {
        WorkflowError::Http { status, .. } => assert_eq!(status.as_u16(), 404),
        other => panic!("unexpected error: {other}"),
    }
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_rejected_token_is_an_error() {
    let state = Arc::new(MockState {
        statuses: Mutex::new(VecDeque::from(vec!["Running".to_string()])),
        ..Default::default()
    });
    let base = common::spawn_mock(state).await;
    let client = OrchestrationClient::new(common::http_client(), base);
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new("someone-else"));
    let mut monitor = WorkflowMonitor::new(client, tokens, submission());

    assert!(matches!(monitor.update().await, Err(WorkflowError::Http { .. })));
    assert!(monitor.latest().is_none());
}
