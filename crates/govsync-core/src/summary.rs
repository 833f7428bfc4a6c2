//! Step results and the run summary built from them.

use serde::{Deserialize, Serialize};

/// Outcome of one reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
}

/// The bucket a step result is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Skipped,
    Failed,
    Successful,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Skipped => "skipped",
            StepOutcome::Failed => "failed",
            StepOutcome::Successful => "successful",
        }
    }
}

impl StepResult {
    pub fn succeeded(step: &str, message: impl Into<String>) -> Self {
        StepResult {
            step: step.to_string(),
            success: true,
            message: message.into(),
            skipped: None,
        }
    }

    pub fn failed(step: &str, message: impl Into<String>) -> Self {
        StepResult {
            step: step.to_string(),
            success: false,
            message: message.into(),
            skipped: None,
        }
    }

    /// Nothing to do; counts as a success for the step itself.
    pub fn skipped(step: &str, message: impl Into<String>) -> Self {
        StepResult {
            step: step.to_string(),
            success: true,
            message: message.into(),
            skipped: Some(true),
        }
    }

    /// Categorize with precedence skipped > failed > successful.
    pub fn outcome(&self) -> StepOutcome {
        if self.skipped == Some(true) {
            StepOutcome::Skipped
        } else if !self.success {
            StepOutcome::Failed
        } else {
            StepOutcome::Successful
        }
    }
}

/// Aggregate of every step result in a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupSummary {
    pub total_steps: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: Vec<StepResult>,
}

impl SetupSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Count results into mutually exclusive buckets.
pub fn generate_summary(results: Vec<StepResult>) -> SetupSummary {
    let (mut successful, mut failed, mut skipped) = (0, 0, 0);
    for result in &results {
        match result.outcome() {
            StepOutcome::Skipped => skipped += 1,
            StepOutcome::Failed => failed += 1,
            StepOutcome::Successful => successful += 1,
        }
    }
    SetupSummary {
        total_steps: results.len(),
        successful,
        failed,
        skipped,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_skipped_beats_failed() {
        let odd = StepResult {
            step: "Secrets".to_string(),
            success: false,
            message: "skipped but unsuccessful".to_string(),
            skipped: Some(true),
        };
        assert_eq!(odd.outcome(), StepOutcome::Skipped);
    }

    #[test]
    fn test_explicit_not_skipped_is_not_skipped() {
        let result = StepResult {
            skipped: Some(false),
            ..StepResult::failed("Environments", "boom")
        };
        assert_eq!(result.outcome(), StepOutcome::Failed);
    }

    #[test]
    fn test_every_flag_combination_lands_in_one_bucket() {
        let mut results = Vec::new();
        for success in [true, false] {
            for skipped in [None, Some(false), Some(true)] {
                results.push(StepResult {
                    step: "x".to_string(),
                    success,
                    message: String::new(),
                    skipped,
                });
            }
        }

        let summary = generate_summary(results);
        assert_eq!(summary.total_steps, 6);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.successful, 2);
        assert_eq!(
            summary.successful + summary.failed + summary.skipped,
            summary.total_steps
        );
    }

    #[test]
    fn test_empty_summary() {
        let summary = generate_summary(Vec::new());
        assert_eq!(summary.total_steps, 0);
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_serializes_camel_case_and_omits_absent_skip() {
        let summary = generate_summary(vec![StepResult::succeeded("Secrets", "Configured 2 secrets")]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["totalSteps"], 1);
        assert!(value["results"][0].get("skipped").is_none());
    }
}
