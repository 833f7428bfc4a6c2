//! Secrets executor.

use govsync_platform::HostingPlatform;
use tracing::info;

use super::plural;
use crate::config::DesiredState;
use crate::plan::{plan_secrets, Facet, PlanAction};
use crate::prompt::{PromptError, SecretReader};
use crate::state::ActualState;
use crate::summary::StepResult;
use crate::telemetry::emit_item_failed;

/// Prompt for and submit every desired secret missing from the snapshot.
///
/// Secrets are handled one at a time in desired order. A blank value, a
/// cancelled prompt or a rejected submission fails that secret only; the
/// others are still attempted and nothing already submitted is undone.
pub async fn apply(
    host: &dyn HostingPlatform,
    prompt: &dyn SecretReader,
    desired: &DesiredState,
    actual: &ActualState,
) -> StepResult {
    let step = Facet::Secrets.label();
    let missing = match plan_secrets(desired, actual) {
        PlanAction::Skip { reason } => return StepResult::skipped(step, reason),
        PlanAction::Fail { reason } => return StepResult::failed(step, reason),
        PlanAction::Apply { items } => items,
    };

    let mut configured = 0usize;
    let mut errors = Vec::new();
    for name in &missing {
        let value = match prompt.read_secret(name).await {
            Ok(value) => value,
            Err(PromptError::Cancelled) => {
                emit_item_failed(step, name, &"cancelled");
                errors.push(format!("{name}: input cancelled"));
                continue;
            }
            Err(e) => {
                emit_item_failed(step, name, &e);
                errors.push(format!("{name}: {e}"));
                continue;
            }
        };

        if value.is_blank() {
            emit_item_failed(step, name, &"empty value");
            errors.push(format!("{name}: empty value, not submitted"));
            continue;
        }

        match host.set_secret(name, value.expose()).await {
            Ok(()) => {
                info!(secret = %name, "secret configured");
                configured += 1;
            }
            Err(e) => {
                emit_item_failed(step, name, &e);
                errors.push(format!("{name}: {e}"));
            }
        }
    }

    if errors.is_empty() {
        StepResult::succeeded(step, format!("Configured {}", plural(configured, "secret")))
    } else if configured > 0 {
        StepResult::failed(
            step,
            format!(
                "Configured {}, {} failed: {}",
                plural(configured, "secret"),
                errors.len(),
                errors.join("; ")
            ),
        )
    } else {
        StepResult::failed(
            step,
            format!("Failed to configure secrets: {}", errors.join("; ")),
        )
    }
}
