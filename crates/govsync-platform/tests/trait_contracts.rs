//! Contract tests for HostingPlatform and LocalWorkspace.
//!
//! These tests pin down the behaviour the reconciliation engine relies on,
//! using the in-memory fake. Any conforming implementation must pass these.

use std::path::Path;

use govsync_platform::fakes::{HostCall, MemoryHost, Operation};
use govsync_platform::*;
use serde_json::json;

fn sample_payload() -> BranchProtectionPayload {
    BranchProtectionPayload {
        required_status_checks: None,
        enforce_admins: false,
        required_pull_request_reviews: None,
        restrictions: None,
        required_linear_history: true,
        allow_force_pushes: false,
        allow_deletions: false,
    }
}

// ===========================================================================
// HostingPlatform contract tests
// ===========================================================================

#[tokio::test]
async fn secrets_set_then_listed() {
    let host = MemoryHost::new();
    host.set_secret("AWS_REGION", "eu-west-1").await.unwrap();

    let names = host.list_secrets().await.unwrap();
    assert_eq!(names, vec!["AWS_REGION".to_string()]);
    assert_eq!(host.secret_value("AWS_REGION").as_deref(), Some("eu-west-1"));
}

#[tokio::test]
async fn unprotected_branch_is_not_found() {
    let host = MemoryHost::new();
    let err = host.get_branch_protection("main").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn protection_set_becomes_visible() {
    let host = MemoryHost::new();
    let repo = host.repo_slug().await.unwrap();
    host.set_branch_protection(&repo, "main", &sample_payload())
        .await
        .unwrap();

    let descriptor = host.get_branch_protection("main").await.unwrap();
    assert_eq!(descriptor["required_linear_history"], json!(true));
    assert!(matches!(
        host.calls().as_slice(),
        [HostCall::SetBranchProtection { branch, .. }] if branch == "main"
    ));
}

#[tokio::test]
async fn environments_document_lists_names() {
    let host = MemoryHost::new().with_environments(&["staging"]);
    host.create_or_update_environment("production").await.unwrap();
    // touching an existing environment does not duplicate it
    host.create_or_update_environment("staging").await.unwrap();

    let doc = host.list_environments().await.unwrap();
    let names: Vec<&str> = doc["environments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["staging", "production"]);
}

#[tokio::test]
async fn plan_gated_environments_are_not_found() {
    let host = MemoryHost::new().environments_unavailable();
    let err = host.list_environments().await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn injected_failure_is_scoped_to_target() {
    let host = MemoryHost::new().fail_on_target(Operation::SetSecret, "BROKEN", "HTTP 422");

    assert!(host.set_secret("FINE", "v").await.is_ok());
    let err = host.set_secret("BROKEN", "v").await.unwrap_err();
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("HTTP 422"));
    assert_eq!(
        host.calls(),
        vec![HostCall::SetSecret {
            name: "FINE".to_string()
        }]
    );
}

// ===========================================================================
// LocalWorkspace contract tests
// ===========================================================================

#[tokio::test]
async fn missing_workflows_dir_is_not_found() {
    let host = MemoryHost::new();
    let err = host
        .list_workflow_files(Path::new(".github/workflows"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn workflow_files_are_listed_and_readable() {
    let host = MemoryHost::new()
        .with_workflow("ci.yml", "on: push\n")
        .with_workflow("notes.txt", "ignored");

    let files = host
        .list_workflow_files(Path::new(".github/workflows"))
        .await
        .unwrap();
    assert_eq!(files, vec!["ci.yml".to_string()]);

    let content = host
        .read_file(Path::new(".github/workflows/ci.yml"))
        .await
        .unwrap();
    assert_eq!(content, "on: push\n");
}

#[tokio::test]
async fn repository_flags_reflect_builder() {
    let host = MemoryHost::new().without_remote();
    assert!(host.is_git_repo().await.unwrap());
    assert!(!host.has_remote().await.unwrap());

    let outside = MemoryHost::new().not_a_repo();
    assert!(!outside.is_git_repo().await.unwrap());
}
