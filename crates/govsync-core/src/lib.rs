//! govsync Core Library
//!
//! Reconciles a repository's governance settings (branch protection, secrets,
//! deployment environments) toward a declared desired state, then validates
//! the result and reports per-step outcomes.

pub mod config;
pub mod error;
pub mod fakes;
pub mod plan;
pub mod prompt;
pub mod reconcile;
pub mod report;
pub mod state;
pub mod steps;
pub mod summary;
pub mod telemetry;
pub mod validate;

pub use config::{BranchProtectionSpec, DesiredState, EnvironmentSpec, DEFAULT_BRANCH};
pub use error::{GovsyncError, Result};

pub use plan::{plan, Facet, PlanAction, PlannedStep, ReconciliationPlan};

pub use prompt::{
    capture_secret, CrosstermTerminal, EnvSecretReader, KeyInput, PromptError, PromptState,
    SecretCapture, SecretReader, SecretValue, Terminal, TerminalSecretPrompt,
};

pub use reconcile::{Reconciler, SetupRunner};
pub use report::{render_plan_text, render_setup_text, render_state_text, render_validation_text, SetupReport};
pub use state::{ActualState, StateProbe, WORKFLOWS_DIR};
pub use summary::{generate_summary, SetupSummary, StepOutcome, StepResult};
pub use telemetry::init_tracing;
pub use validate::{
    CheckStatus, ValidationCheck, ValidationEngine, ValidationOptions, ValidationResult,
    ValidationSummary,
};
