//! Actual-state snapshot and the probe that builds it.

use std::collections::BTreeSet;
use std::path::Path;

use govsync_platform::{HostingPlatform, LocalWorkspace, PlatformResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::telemetry::emit_probe_degraded;

/// Directory holding CI workflow definitions, relative to the repo root.
pub const WORKFLOWS_DIR: &str = ".github/workflows";

/// What the repository currently has configured.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualState {
    pub repo_exists: bool,
    pub remote_configured: bool,
    /// Existence only; the rules themselves are not compared.
    pub branch_protection_configured: bool,
    pub secrets_configured: BTreeSet<String>,
    pub environments_configured: BTreeSet<String>,
    pub workflow_files: BTreeSet<String>,
}

/// Pull environment names out of an untyped environments document.
///
/// Accepts both the REST envelope (`{"environments": [...]}`) and a bare
/// array; entries without a string `name` are ignored.
pub fn environment_names(doc: &serde_json::Value) -> Vec<String> {
    let entries = doc
        .get("environments")
        .and_then(|v| v.as_array())
        .or_else(|| doc.as_array());
    entries
        .map(|items| {
            items
                .iter()
                .filter_map(|e| e.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Queries collaborators for the current governance state.
pub struct StateProbe<'a> {
    host: &'a dyn HostingPlatform,
    workspace: &'a dyn LocalWorkspace,
}

impl<'a> StateProbe<'a> {
    pub fn new(host: &'a dyn HostingPlatform, workspace: &'a dyn LocalWorkspace) -> Self {
        StateProbe { host, workspace }
    }

    /// Take a best-effort snapshot.
    ///
    /// Never fails: each field is queried on its own and falls back to its
    /// "not configured" default if the query fails. Outside a git work tree
    /// every field is left at its default.
    pub async fn detect_current_state(&self, branch: &str) -> ActualState {
        let repo_exists = matches!(self.workspace.is_git_repo().await, Ok(true));
        if !repo_exists {
            info!(event = "probe.not_a_repo", "workspace is not a git work tree");
            return ActualState::default();
        }

        let remote_configured = or_default("remote", self.workspace.has_remote().await);

        let branch_protection_configured = or_default(
            "branch_protection",
            self.host.get_branch_protection(branch).await.map(|_| true),
        );

        let secrets_configured = or_default("secrets", self.host.list_secrets().await)
            .into_iter()
            .collect();

        let environments_configured = or_default(
            "environments",
            self.host
                .list_environments()
                .await
                .map(|doc| environment_names(&doc)),
        )
        .into_iter()
        .collect();

        let workflow_files = or_default(
            "workflows",
            self.workspace
                .list_workflow_files(Path::new(WORKFLOWS_DIR))
                .await,
        )
        .into_iter()
        .collect();

        let state = ActualState {
            repo_exists,
            remote_configured,
            branch_protection_configured,
            secrets_configured,
            environments_configured,
            workflow_files,
        };
        info!(
            event = "probe.completed",
            remote = state.remote_configured,
            protected = state.branch_protection_configured,
            secrets = state.secrets_configured.len(),
            environments = state.environments_configured.len(),
            workflows = state.workflow_files.len(),
        );
        state
    }
}

fn or_default<T: Default>(field: &str, result: PlatformResult<T>) -> T {
    result.unwrap_or_else(|e| {
        emit_probe_degraded(field, &e);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn environment_names_from_envelope() {
        let doc = json!({ "total_count": 2, "environments": [{ "name": "a" }, { "name": "b" }] });
        assert_eq!(environment_names(&doc), vec!["a", "b"]);
    }

    #[test]
    fn environment_names_from_bare_array() {
        let doc = json!([{ "name": "prod" }, { "id": 3 }]);
        assert_eq!(environment_names(&doc), vec!["prod"]);
    }

    #[test]
    fn environment_names_from_unexpected_shape() {
        assert!(environment_names(&json!("nope")).is_empty());
        assert!(environment_names(&json!({ "environments": null })).is_empty());
    }
}
