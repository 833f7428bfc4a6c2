//! Tracing setup and structured lifecycle events.
//!
//! Events are emitted with a stable `event` field so JSON logs can be
//! filtered by name. Logs go to stderr; stdout is reserved for reports.
//! Secret values never pass through here.

use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides `level` when set. Calling this twice is harmless.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// A probe query failed and its field fell back to the default.
pub fn emit_probe_degraded(field: &str, error: &dyn std::fmt::Display) {
    warn!(event = "probe.field_degraded", field = %field, error = %error);
}

/// A reconciliation step produced its result.
pub fn emit_step_finished(step: &str, outcome: &str, message: &str) {
    info!(event = "step.finished", step = %step, outcome = %outcome, message = %message);
}

/// A single item inside a step (one secret, one environment) failed.
pub fn emit_item_failed(step: &str, item: &str, error: &dyn std::fmt::Display) {
    warn!(event = "step.item_failed", step = %step, item = %item, error = %error);
}

/// A validation check was recorded.
pub fn emit_check_recorded(name: &str, status: &str) {
    info!(event = "validation.check", check = %name, status = %status);
}

/// The whole run finished.
pub fn emit_run_finished(run_id: &str, total: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        total_steps = total,
        failed = failed,
        duration_ms = duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
        emit_step_finished("Secrets", "skipped", "All secrets already configured");
        emit_probe_degraded("secrets", &"HTTP 403");
    }
}
