//! Deployment environments executor.

use govsync_platform::{HostingPlatform, Reviewer};
use tracing::info;

use super::plural;
use crate::config::{DesiredState, EnvironmentSpec};
use crate::plan::{missing_environments, plan_environments, Facet, PlanAction};
use crate::state::ActualState;
use crate::summary::StepResult;
use crate::telemetry::emit_item_failed;

/// Reviewers to require for `env`, or `None` when no approval rule applies.
///
/// Approval needs both the flag and at least one approver.
pub fn reviewers_for(env: &EnvironmentSpec) -> Option<Vec<Reviewer>> {
    if !env.requires_approval || env.approvers.is_empty() {
        return None;
    }
    Some(
        env.approvers
            .iter()
            .map(|id| Reviewer::from_identifier(id))
            .collect(),
    )
}

/// Create every desired environment missing from the snapshot.
pub async fn apply(
    host: &dyn HostingPlatform,
    desired: &DesiredState,
    actual: &ActualState,
) -> StepResult {
    let step = Facet::Environments.label();
    match plan_environments(desired, actual) {
        PlanAction::Skip { reason } => return StepResult::skipped(step, reason),
        PlanAction::Fail { reason } => return StepResult::failed(step, reason),
        PlanAction::Apply { .. } => {}
    }

    let mut created = Vec::new();
    let mut errors = Vec::new();
    for env in missing_environments(desired, actual) {
        if let Err(e) = host.create_or_update_environment(&env.name).await {
            emit_item_failed(step, &env.name, &e);
            errors.push(format!("{}: {e}", env.name));
            continue;
        }

        if let Some(reviewers) = reviewers_for(env) {
            if let Err(e) = host.set_environment_approvers(&env.name, &reviewers).await {
                emit_item_failed(step, &env.name, &e);
                errors.push(format!("{}: failed to set approvers: {e}", env.name));
                continue;
            }
        }

        info!(environment = %env.name, "environment configured");
        created.push(env.name.clone());
    }

    let created_msg = if created.is_empty() {
        String::new()
    } else {
        format!(
            "Created {}: {}",
            plural(created.len(), "environment"),
            created.join(", ")
        )
    };

    if errors.is_empty() {
        StepResult::succeeded(step, created_msg)
    } else if created.is_empty() {
        StepResult::failed(
            step,
            format!("Failed to configure environments: {}", errors.join("; ")),
        )
    } else {
        StepResult::failed(
            step,
            format!("{created_msg}; failed: {}", errors.join("; ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govsync_platform::ReviewerKind;

    #[test]
    fn test_no_reviewers_without_approvers() {
        let env = EnvironmentSpec {
            name: "prod".to_string(),
            requires_approval: true,
            approvers: Vec::new(),
        };
        assert!(reviewers_for(&env).is_none());
    }

    #[test]
    fn test_no_reviewers_without_flag() {
        let env = EnvironmentSpec {
            name: "prod".to_string(),
            requires_approval: false,
            approvers: vec!["octocat".to_string()],
        };
        assert!(reviewers_for(&env).is_none());
    }

    #[test]
    fn test_reviewers_split_users_and_teams() {
        let env = EnvironmentSpec::new("prod").with_approvers(&["octocat", "acme/sre"]);
        let reviewers = reviewers_for(&env).unwrap();
        assert_eq!(reviewers[0].kind, ReviewerKind::User);
        assert_eq!(reviewers[1].kind, ReviewerKind::Team);
    }
}
