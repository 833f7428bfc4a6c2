//! Run report and its human-readable rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::{PlanAction, ReconciliationPlan};
use crate::state::ActualState;
use crate::summary::{SetupSummary, StepOutcome};
use crate::validate::{CheckStatus, ValidationResult};

/// Everything a setup run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// SHA-256 of the desired-state document, when one was loaded.
    pub config_digest: Option<String>,
    pub summary: SetupSummary,
    pub validation: Option<ValidationResult>,
}

impl SetupReport {
    pub fn new(
        run_id: String,
        started_at: DateTime<Utc>,
        config_digest: Option<String>,
        summary: SetupSummary,
        validation: Option<ValidationResult>,
    ) -> Self {
        SetupReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            config_digest,
            summary,
            validation,
        }
    }

    /// No failed step and no failed validation check.
    pub fn succeeded(&self) -> bool {
        !self.summary.has_failures() && self.validation.as_ref().map_or(true, |v| v.passed)
    }
}

fn outcome_marker(outcome: StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Successful => "✓",
        StepOutcome::Failed => "✗",
        StepOutcome::Skipped => "⊘",
    }
}

fn status_marker(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✓",
        CheckStatus::Fail => "✗",
        CheckStatus::Warning => "⚠",
    }
}

pub fn render_setup_text(report: &SetupReport) -> String {
    let mut out = String::new();
    let s = &report.summary;
    let _ = writeln!(out, "Setup run {}", report.run_id);
    for result in &s.results {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            outcome_marker(result.outcome()),
            result.step,
            result.message
        );
    }
    let _ = writeln!(
        out,
        "{} steps: {} successful, {} skipped, {} failed",
        s.total_steps, s.successful, s.skipped, s.failed
    );
    if let Some(validation) = &report.validation {
        out.push('\n');
        out.push_str(&render_validation_text(validation));
    }
    out
}

pub fn render_validation_text(result: &ValidationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Validation");
    for check in &result.checks {
        let _ = writeln!(
            out,
            "  {} {}: {}",
            status_marker(check.status),
            check.name,
            check.message
        );
        if let Some(remediation) = &check.remediation {
            let _ = writeln!(out, "      → {remediation}");
        }
    }
    let s = &result.summary;
    let _ = writeln!(
        out,
        "{} checks: {} passed, {} warnings, {} failed: {}",
        s.total,
        s.passed,
        s.warnings,
        s.failed,
        if result.passed { "PASSED" } else { "FAILED" }
    );
    out
}

pub fn render_plan_text(plan: &ReconciliationPlan) -> String {
    let mut out = String::new();
    for step in &plan.steps {
        let line = match &step.action {
            PlanAction::Skip { reason } => format!("  ⊘ {}: skip ({reason})", step.facet.label()),
            PlanAction::Apply { items } => {
                format!("  + {}: apply {}", step.facet.label(), items.join(", "))
            }
            PlanAction::Fail { reason } => format!("  ✗ {}: cannot apply ({reason})", step.facet.label()),
        };
        let _ = writeln!(out, "{line}");
    }
    if !plan.has_changes() {
        let _ = writeln!(out, "Nothing to change.");
    }
    out
}

pub fn render_state_text(state: &ActualState) -> String {
    let yes_no = |b: bool| if b { "yes" } else { "no" };
    let list = |items: &std::collections::BTreeSet<String>| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.iter().cloned().collect::<Vec<_>>().join(", ")
        }
    };
    let mut out = String::new();
    let _ = writeln!(out, "Repository:        {}", yes_no(state.repo_exists));
    let _ = writeln!(out, "Remote:            {}", yes_no(state.remote_configured));
    let _ = writeln!(out, "Branch protection: {}", yes_no(state.branch_protection_configured));
    let _ = writeln!(out, "Secrets:           {}", list(&state.secrets_configured));
    let _ = writeln!(out, "Environments:      {}", list(&state.environments_configured));
    let _ = writeln!(out, "Workflows:         {}", list(&state.workflow_files));
    out
}
