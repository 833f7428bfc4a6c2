//! Reconciliation planning: what each facet needs, decided from the
//! desired state and the snapshot alone.
//!
//! Executors act on these decisions, and the `plan` command prints them, so a
//! dry run and a real run can never disagree about what would happen.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{DesiredState, EnvironmentSpec};
use crate::state::ActualState;

/// Governance facets, in the fixed order they are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    BranchProtection,
    Secrets,
    Environments,
}

impl Facet {
    pub const ORDER: [Facet; 3] = [Facet::BranchProtection, Facet::Secrets, Facet::Environments];

    /// Step label used in results.
    pub fn label(&self) -> &'static str {
        match self {
            Facet::BranchProtection => "Branch protection",
            Facet::Secrets => "Secrets",
            Facet::Environments => "Environments",
        }
    }
}

/// What to do about one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    /// Already satisfied (or nothing requested).
    Skip { reason: String },
    /// Apply the listed items, in order.
    Apply { items: Vec<String> },
    /// A prerequisite is missing.
    Fail { reason: String },
}

/// Decision for one facet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub facet: Facet,
    #[serde(flatten)]
    pub action: PlanAction,
}

/// Decisions for every facet, in reconciliation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub steps: Vec<PlannedStep>,
}

impl ReconciliationPlan {
    /// Whether a run would change anything.
    pub fn has_changes(&self) -> bool {
        self.steps
            .iter()
            .any(|s| matches!(s.action, PlanAction::Apply { .. }))
    }
}

pub fn plan_branch_protection(desired: &DesiredState, actual: &ActualState) -> PlanAction {
    if actual.branch_protection_configured {
        return PlanAction::Skip {
            reason: "Branch protection already configured".to_string(),
        };
    }
    match &desired.branch_protection {
        None => PlanAction::Fail {
            reason: "No branch protection configuration provided".to_string(),
        },
        Some(bp) => PlanAction::Apply {
            items: vec![bp.branch.clone()],
        },
    }
}

/// Missing secrets in desired order, each once.
pub fn plan_secrets(desired: &DesiredState, actual: &ActualState) -> PlanAction {
    if desired.secrets.is_empty() {
        return PlanAction::Skip {
            reason: "No secrets to configure".to_string(),
        };
    }
    let mut seen = HashSet::new();
    let missing: Vec<String> = desired
        .secrets
        .iter()
        .filter(|name| !actual.secrets_configured.contains(*name))
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        return PlanAction::Skip {
            reason: "All secrets already configured".to_string(),
        };
    }
    PlanAction::Apply { items: missing }
}

/// Missing environments in desired order.
pub fn plan_environments(desired: &DesiredState, actual: &ActualState) -> PlanAction {
    if desired.environments.is_empty() {
        return PlanAction::Skip {
            reason: "No environments to configure".to_string(),
        };
    }
    let missing: Vec<String> = missing_environments(desired, actual)
        .map(|env| env.name.clone())
        .collect();
    if missing.is_empty() {
        return PlanAction::Skip {
            reason: "All environments already configured".to_string(),
        };
    }
    PlanAction::Apply { items: missing }
}

pub(crate) fn missing_environments<'d>(
    desired: &'d DesiredState,
    actual: &'d ActualState,
) -> impl Iterator<Item = &'d EnvironmentSpec> {
    desired
        .environments
        .iter()
        .filter(|env| !actual.environments_configured.contains(&env.name))
}

/// Plan every facet.
pub fn plan(desired: &DesiredState, actual: &ActualState) -> ReconciliationPlan {
    let steps = Facet::ORDER
        .iter()
        .map(|facet| {
            let action = match facet {
                Facet::BranchProtection => plan_branch_protection(desired, actual),
                Facet::Secrets => plan_secrets(desired, actual),
                Facet::Environments => plan_environments(desired, actual),
            };
            PlannedStep {
                facet: *facet,
                action,
            }
        })
        .collect();
    ReconciliationPlan { steps }
}
