//! Reconciliation pipeline.
//!
//! A run is a fixed sequence: load desired state, probe, reconcile each facet,
//! validate, summarize. Each facet executor already folds its own failures
//! into a `StepResult`; the pipeline additionally catches panics around every
//! executor so one broken step can never end the run. Only an unloadable
//! configuration or a crashed probe stop a run early, and both still produce
//! a report.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use govsync_platform::{HostingPlatform, LocalWorkspace};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::DesiredState;
use crate::plan::Facet;
use crate::prompt::SecretReader;
use crate::report::SetupReport;
use crate::state::{ActualState, StateProbe};
use crate::steps::{branch_protection, environments, secrets};
use crate::summary::{generate_summary, StepResult};
use crate::telemetry::{emit_run_finished, emit_step_finished};
use crate::validate::{ValidationEngine, ValidationOptions};

/// Step label for a configuration that could not be loaded.
pub const LOAD_CONFIG_STEP: &str = "Load configuration";
/// Step label for a state probe that crashed.
pub const DETECT_STATE_STEP: &str = "Detect current state";

/// Runs `fut`, turning a panic into a failed result for `step`.
pub async fn guarded<F>(step: &str, fut: F) -> StepResult
where
    F: Future<Output = StepResult>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            error!(event = "step.panicked", step = %step, detail = %detail);
            StepResult::failed(step, format!("Unexpected error: {detail}"))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Applies the facet executors in their fixed order.
pub struct Reconciler<'a> {
    host: &'a dyn HostingPlatform,
    prompt: &'a dyn SecretReader,
}

impl<'a> Reconciler<'a> {
    pub fn new(host: &'a dyn HostingPlatform, prompt: &'a dyn SecretReader) -> Self {
        Reconciler { host, prompt }
    }

    /// One result per facet, always three, in reconciliation order.
    pub async fn run(&self, desired: &DesiredState, actual: &ActualState) -> Vec<StepResult> {
        let mut results = Vec::with_capacity(Facet::ORDER.len());
        for facet in Facet::ORDER {
            info!(event = "step.started", step = %facet.label());
            let result = guarded(facet.label(), self.execute(facet, desired, actual)).await;
            emit_step_finished(&result.step, result.outcome().as_str(), &result.message);
            results.push(result);
        }
        results
    }

    async fn execute(&self, facet: Facet, desired: &DesiredState, actual: &ActualState) -> StepResult {
        match facet {
            Facet::BranchProtection => branch_protection::apply(self.host, desired, actual).await,
            Facet::Secrets => secrets::apply(self.host, self.prompt, desired, actual).await,
            Facet::Environments => environments::apply(self.host, desired, actual).await,
        }
    }
}

/// Full setup run over a set of collaborators.
pub struct SetupRunner<'a> {
    host: &'a dyn HostingPlatform,
    workspace: &'a dyn LocalWorkspace,
    prompt: &'a dyn SecretReader,
    validate: bool,
}

impl<'a> SetupRunner<'a> {
    pub fn new(
        host: &'a dyn HostingPlatform,
        workspace: &'a dyn LocalWorkspace,
        prompt: &'a dyn SecretReader,
    ) -> Self {
        SetupRunner {
            host,
            workspace,
            prompt,
            validate: true,
        }
    }

    /// Skip the post-run validation pass.
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    /// Load the desired state from `config_path` and run.
    pub async fn run_from_file(&self, config_path: &Path) -> SetupReport {
        match DesiredState::load(config_path).await {
            Ok(desired) => self.run(&desired).await,
            Err(e) => {
                error!(event = "run.config_failed", error = %e);
                let started_at = Utc::now();
                let run_id = Uuid::new_v4().to_string();
                let summary = generate_summary(vec![StepResult::failed(LOAD_CONFIG_STEP, e.to_string())]);
                emit_run_finished(&run_id, summary.total_steps, summary.failed, 0);
                SetupReport::new(run_id, started_at, None, summary, None)
            }
        }
    }

    /// Probe, reconcile, then validate against fresh state.
    pub async fn run(&self, desired: &DesiredState) -> SetupReport {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let config_digest = desired.digest().ok();
        info!(event = "run.started", run_id = %run_id);

        let probe = StateProbe::new(self.host, self.workspace);
        let probed = AssertUnwindSafe(probe.detect_current_state(desired.protected_branch()))
            .catch_unwind()
            .await;
        let actual = match probed {
            Ok(actual) => actual,
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(event = "run.probe_failed", detail = %detail);
                let summary = generate_summary(vec![StepResult::failed(
                    DETECT_STATE_STEP,
                    format!("Unable to detect current state: {detail}"),
                )]);
                emit_run_finished(&run_id, summary.total_steps, summary.failed, elapsed_ms(start));
                return SetupReport::new(run_id, started_at, config_digest, summary, None);
            }
        };

        let results = Reconciler::new(self.host, self.prompt)
            .run(desired, &actual)
            .await;

        let validation = if self.validate {
            let engine = ValidationEngine::new(self.host, self.workspace);
            Some(engine.generate_report(&ValidationOptions::from(desired)).await)
        } else {
            None
        };

        let summary = generate_summary(results);
        emit_run_finished(&run_id, summary.total_steps, summary.failed, elapsed_ms(start));
        SetupReport::new(run_id, started_at, config_digest, summary, validation)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
