//! Desired-state document: schema, loading and validation.
//!
//! The document is read once per run and never mutated afterwards. JSON, YAML
//! and TOML are accepted; keys are camelCase in every format.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GovsyncError, Result};

/// Branch used when a document omits it.
pub const DEFAULT_BRANCH: &str = "main";

/// Upper bound the hosting platform accepts for required approvals.
pub const MAX_REQUIRED_APPROVALS: u32 = 6;

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_required_approvals() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Desired branch protection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchProtectionSpec {
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub required_status_checks: Vec<String>,
    #[serde(default = "default_required_approvals")]
    pub required_approvals: u32,
    #[serde(default)]
    pub enforce_admins: bool,
    #[serde(default = "default_true")]
    pub dismiss_stale_reviews: bool,
    #[serde(default)]
    pub require_code_owner_reviews: bool,
    #[serde(default)]
    pub required_linear_history: bool,
    #[serde(default)]
    pub allow_force_pushes: bool,
    #[serde(default)]
    pub allow_deletions: bool,
}

impl Default for BranchProtectionSpec {
    fn default() -> Self {
        BranchProtectionSpec {
            branch: default_branch(),
            required_status_checks: Vec::new(),
            required_approvals: default_required_approvals(),
            enforce_admins: false,
            dismiss_stale_reviews: true,
            require_code_owner_reviews: false,
            required_linear_history: false,
            allow_force_pushes: false,
            allow_deletions: false,
        }
    }
}

/// Desired deployment environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSpec {
    pub name: String,
    #[serde(default)]
    pub requires_approval: bool,
    /// User logins, or `org/team-slug` for teams.
    #[serde(default)]
    pub approvers: Vec<String>,
}

impl EnvironmentSpec {
    pub fn new(name: &str) -> Self {
        EnvironmentSpec {
            name: name.to_string(),
            requires_approval: false,
            approvers: Vec::new(),
        }
    }

    /// Require approval from the given approver identifiers.
    pub fn with_approvers(mut self, approvers: &[&str]) -> Self {
        self.requires_approval = true;
        self.approvers = approvers.iter().map(|a| a.to_string()).collect();
        self
    }
}

/// The governance configuration a repository should end up with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredState {
    #[serde(default)]
    pub branch_protection: Option<BranchProtectionSpec>,
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub environments: Vec<EnvironmentSpec>,
}

impl DesiredState {
    /// Read, parse and validate a desired-state document.
    ///
    /// The format is chosen by file extension.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| GovsyncError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &content)
    }

    /// Parse and validate `content` as the document at `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let parse_err = |detail: String| GovsyncError::ConfigParse {
            path: path.to_path_buf(),
            detail,
        };

        let state: DesiredState = match ext.as_deref() {
            Some("json") => serde_json::from_str(content).map_err(|e| parse_err(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string()))?
            }
            Some("toml") => toml::from_str(content).map_err(|e| parse_err(e.to_string()))?,
            _ => return Err(GovsyncError::UnsupportedFormat(path.to_path_buf())),
        };

        state.validate()?;
        Ok(state)
    }

    /// Check the document against the rules the hosting platform enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(bp) = &self.branch_protection {
            if bp.branch.trim().is_empty() {
                return invalid("branchProtection.branch must not be empty");
            }
            if bp.required_approvals > MAX_REQUIRED_APPROVALS {
                return invalid(format!(
                    "branchProtection.requiredApprovals must be at most {MAX_REQUIRED_APPROVALS}, got {}",
                    bp.required_approvals
                ));
            }
            if bp.required_status_checks.iter().any(|c| c.trim().is_empty()) {
                return invalid("branchProtection.requiredStatusChecks contains an empty context");
            }
        }

        for name in &self.secrets {
            if !secret_name_pattern().is_match(name) {
                return invalid(format!(
                    "secret name {name:?} must contain only letters, digits and underscores and not start with a digit"
                ));
            }
            if name.to_ascii_uppercase().starts_with("GITHUB_") {
                return invalid(format!("secret name {name:?} must not start with GITHUB_"));
            }
        }

        let mut seen = HashSet::new();
        for env in &self.environments {
            if env.name.trim().is_empty() {
                return invalid("environment name must not be empty");
            }
            if !seen.insert(env.name.as_str()) {
                return invalid(format!("environment {:?} is declared twice", env.name));
            }
            for approver in &env.approvers {
                if approver.trim().is_empty() || approver.matches('/').count() > 1 {
                    return invalid(format!(
                        "environment {:?} has malformed approver {approver:?}",
                        env.name
                    ));
                }
            }
        }
        Ok(())
    }

    /// Branch the protection facet targets.
    pub fn protected_branch(&self) -> &str {
        self.branch_protection
            .as_ref()
            .map(|bp| bp.branch.as_str())
            .unwrap_or(DEFAULT_BRANCH)
    }

    /// Names of the desired environments, in declaration order.
    pub fn environment_names(&self) -> Vec<String> {
        self.environments.iter().map(|e| e.name.clone()).collect()
    }

    /// SHA-256 of the canonical JSON form, for tying a report to its input.
    pub fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }
}

fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(GovsyncError::InvalidConfig(msg.into()))
}

fn secret_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}
