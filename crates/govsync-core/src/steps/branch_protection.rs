//! Branch protection executor.

use govsync_platform::{
    BranchProtectionPayload, HostingPlatform, RequiredPullRequestReviews, RequiredStatusChecks,
    StatusCheck,
};
use tracing::info;

use crate::config::{BranchProtectionSpec, DesiredState};
use crate::plan::{plan_branch_protection, Facet, PlanAction};
use crate::state::ActualState;
use crate::summary::StepResult;

/// Translate the desired rules into the platform's mutation payload.
///
/// An empty status-check list means no status-check requirement at all;
/// nobody is exempt from review dismissal and pushes are not restricted.
pub fn build_payload(spec: &BranchProtectionSpec) -> BranchProtectionPayload {
    let required_status_checks = if spec.required_status_checks.is_empty() {
        None
    } else {
        Some(RequiredStatusChecks {
            strict: true,
            checks: spec
                .required_status_checks
                .iter()
                .map(|context| StatusCheck {
                    context: context.clone(),
                })
                .collect(),
        })
    };

    BranchProtectionPayload {
        required_status_checks,
        enforce_admins: spec.enforce_admins,
        required_pull_request_reviews: Some(RequiredPullRequestReviews {
            dismissal_restrictions: serde_json::Map::new(),
            dismiss_stale_reviews: spec.dismiss_stale_reviews,
            require_code_owner_reviews: spec.require_code_owner_reviews,
            required_approving_review_count: spec.required_approvals,
        }),
        restrictions: None,
        required_linear_history: spec.required_linear_history,
        allow_force_pushes: spec.allow_force_pushes,
        allow_deletions: spec.allow_deletions,
    }
}

/// Protect the desired branch unless some protection already exists.
pub async fn apply(
    host: &dyn HostingPlatform,
    desired: &DesiredState,
    actual: &ActualState,
) -> StepResult {
    let step = Facet::BranchProtection.label();
    let spec = match (plan_branch_protection(desired, actual), &desired.branch_protection) {
        (PlanAction::Skip { reason }, _) => return StepResult::skipped(step, reason),
        (PlanAction::Fail { reason }, _) => return StepResult::failed(step, reason),
        (PlanAction::Apply { .. }, Some(spec)) => spec,
        (PlanAction::Apply { .. }, None) => {
            return StepResult::failed(step, "No branch protection configuration provided")
        }
    };

    let repo = match host.repo_slug().await {
        Ok(repo) => repo,
        Err(e) => return StepResult::failed(step, e.to_string()),
    };

    let payload = build_payload(spec);
    info!(repo = %repo, branch = %spec.branch, "applying branch protection");
    match host.set_branch_protection(&repo, &spec.branch, &payload).await {
        Ok(()) => StepResult::succeeded(
            step,
            format!("Branch protection configured for {}", spec.branch),
        ),
        Err(e) => StepResult::failed(step, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_are_conservative() {
        let payload = build_payload(&BranchProtectionSpec::default());
        assert!(payload.required_status_checks.is_none());
        assert!(payload.restrictions.is_none());
        assert!(!payload.allow_force_pushes);
        assert!(!payload.allow_deletions);
        assert!(!payload.required_linear_history);
        let reviews = payload.required_pull_request_reviews.unwrap();
        assert!(reviews.dismissal_restrictions.is_empty());
        assert!(reviews.dismiss_stale_reviews);
        assert_eq!(reviews.required_approving_review_count, 1);
    }

    #[test]
    fn test_payload_follows_explicit_flags() {
        let spec = BranchProtectionSpec {
            required_status_checks: vec!["build".to_string(), "lint".to_string()],
            required_approvals: 2,
            enforce_admins: true,
            require_code_owner_reviews: true,
            required_linear_history: true,
            allow_force_pushes: true,
            allow_deletions: true,
            ..Default::default()
        };
        let payload = build_payload(&spec);
        let checks = payload.required_status_checks.unwrap();
        assert!(checks.strict);
        assert_eq!(
            checks.checks.iter().map(|c| c.context.as_str()).collect::<Vec<_>>(),
            vec!["build", "lint"]
        );
        assert!(payload.enforce_admins);
        assert!(payload.required_linear_history);
        assert!(payload.allow_force_pushes);
        assert!(payload.allow_deletions);
        let reviews = payload.required_pull_request_reviews.unwrap();
        assert!(reviews.require_code_owner_reviews);
        assert_eq!(reviews.required_approving_review_count, 2);
    }
}
