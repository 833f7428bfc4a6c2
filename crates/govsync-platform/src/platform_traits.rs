//! Collaborator trait definitions for govsync
//!
//! These traits define the two boundaries the reconciliation engine talks to:
//! - `HostingPlatform`: remote repository settings (secrets, branch protection,
//!   deployment environments)
//! - `LocalWorkspace`: the checked-out working tree (git metadata, workflow files)
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Result type for collaborator operations
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// Owner and name of the managed repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Kind of a deployment reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewerKind {
    User,
    Team,
}

/// A deployment environment reviewer.
///
/// `id` is the identifier as written in the desired state: a user login, or
/// `org/team-slug` for teams. Resolving it to a numeric platform id is the
/// collaborator's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reviewer {
    #[serde(rename = "type")]
    pub kind: ReviewerKind,
    pub id: String,
}

impl Reviewer {
    /// Classify an approver identifier; anything containing `/` is a team.
    pub fn from_identifier(identifier: &str) -> Self {
        let kind = if identifier.contains('/') {
            ReviewerKind::Team
        } else {
            ReviewerKind::User
        };
        Reviewer {
            kind,
            id: identifier.to_string(),
        }
    }
}

/// A single required status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCheck {
    pub context: String,
}

/// Required status check settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredStatusChecks {
    /// Require branches to be up to date before merging.
    pub strict: bool,
    pub checks: Vec<StatusCheck>,
}

/// Pull-request review requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredPullRequestReviews {
    /// Always empty: nobody is exempt from dismissal.
    pub dismissal_restrictions: serde_json::Map<String, serde_json::Value>,
    pub dismiss_stale_reviews: bool,
    pub require_code_owner_reviews: bool,
    pub required_approving_review_count: u32,
}

/// Mutation payload for the branch protection endpoint.
///
/// Field names follow the hosting platform's REST shape so the payload can
/// be sent as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtectionPayload {
    pub required_status_checks: Option<RequiredStatusChecks>,
    pub enforce_admins: bool,
    pub required_pull_request_reviews: Option<RequiredPullRequestReviews>,
    /// Push restrictions; always `None` (no restriction).
    pub restrictions: Option<serde_json::Value>,
    pub required_linear_history: bool,
    pub allow_force_pushes: bool,
    pub allow_deletions: bool,
}

// ---------------------------------------------------------------------------
// HostingPlatform: remote repository settings
// ---------------------------------------------------------------------------

/// Remote repository settings store.
///
/// Guarantees:
/// - Queries never mutate.
/// - `get_branch_protection` and `list_environments` return
///   `PlatformError::NotFound` when the resource (or the feature) does not
///   exist, distinct from any other failure.
/// - Secret values are never placed on a command line.
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    /// Owner and name of the repository being managed.
    async fn repo_slug(&self) -> PlatformResult<RepoSlug>;

    /// Names of the repository's configured secrets.
    async fn list_secrets(&self) -> PlatformResult<Vec<String>>;

    /// Create or overwrite a secret.
    async fn set_secret(&self, name: &str, value: &str) -> PlatformResult<()>;

    /// Raw protection descriptor for `branch`.
    async fn get_branch_protection(&self, branch: &str) -> PlatformResult<serde_json::Value>;

    /// Replace the protection rules of `branch`.
    async fn set_branch_protection(
        &self,
        repo: &RepoSlug,
        branch: &str,
        payload: &BranchProtectionPayload,
    ) -> PlatformResult<()>;

    /// Raw environments document (`{"environments": [{"name": ..}, ..]}`).
    async fn list_environments(&self) -> PlatformResult<serde_json::Value>;

    /// Create an environment, or touch it if it already exists.
    async fn create_or_update_environment(&self, name: &str) -> PlatformResult<()>;

    /// Require approval from `reviewers` before deploying to `name`.
    async fn set_environment_approvers(
        &self,
        name: &str,
        reviewers: &[Reviewer],
    ) -> PlatformResult<()>;
}

// ---------------------------------------------------------------------------
// LocalWorkspace: the checked-out working tree
// ---------------------------------------------------------------------------

/// Local working tree queries.
#[async_trait]
pub trait LocalWorkspace: Send + Sync {
    /// Whether the workspace root is inside a git work tree.
    async fn is_git_repo(&self) -> PlatformResult<bool>;

    /// Whether at least one git remote is configured.
    async fn has_remote(&self) -> PlatformResult<bool>;

    /// Workflow file names (`.yml` / `.yaml`) directly under `dir`, sorted.
    async fn list_workflow_files(&self, dir: &Path) -> PlatformResult<Vec<String>>;

    /// Read a text file relative to the workspace root.
    async fn read_file(&self, path: &Path) -> PlatformResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reviewer_with_separator_is_team() {
        let reviewer = Reviewer::from_identifier("acme/release-managers");
        assert_eq!(reviewer.kind, ReviewerKind::Team);
        assert_eq!(reviewer.id, "acme/release-managers");
    }

    #[test]
    fn reviewer_without_separator_is_user() {
        assert_eq!(Reviewer::from_identifier("octocat").kind, ReviewerKind::User);
    }

    #[test]
    fn payload_serializes_to_rest_shape() {
        let payload = BranchProtectionPayload {
            required_status_checks: Some(RequiredStatusChecks {
                strict: true,
                checks: vec![StatusCheck {
                    context: "ci/test".to_string(),
                }],
            }),
            enforce_admins: true,
            required_pull_request_reviews: Some(RequiredPullRequestReviews {
                dismissal_restrictions: serde_json::Map::new(),
                dismiss_stale_reviews: true,
                require_code_owner_reviews: false,
                required_approving_review_count: 2,
            }),
            restrictions: None,
            required_linear_history: false,
            allow_force_pushes: false,
            allow_deletions: false,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["required_status_checks"]["checks"][0]["context"], "ci/test");
        assert_eq!(
            value["required_pull_request_reviews"]["required_approving_review_count"],
            2
        );
        assert_eq!(value["required_pull_request_reviews"]["dismissal_restrictions"], json!({}));
        assert!(value["restrictions"].is_null());
    }

    #[test]
    fn repo_slug_display() {
        let slug = RepoSlug {
            owner: "stevedores-org".to_string(),
            name: "govsync".to_string(),
        };
        assert_eq!(slug.to_string(), "stevedores-org/govsync");
    }
}
