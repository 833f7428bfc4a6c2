//! Step executors, one per governance facet.
//!
//! Every executor returns a `StepResult` and never an error: all failure
//! paths are folded into `StepResult { success: false, .. }`.

pub mod branch_protection;
pub mod environments;
pub mod secrets;

/// "1 secret", "3 secrets".
pub(crate) fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
