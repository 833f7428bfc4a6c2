//! In-memory fakes for the collaborator traits (testing only)
//!
//! `MemoryHost` implements both `HostingPlatform` and `LocalWorkspace` over a
//! single in-memory repository. Mutations are visible to later queries, every
//! mutation is recorded in a call log, and any operation can be made to fail.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::error::PlatformError;
use crate::platform_traits::*;

/// Collaborator operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    RepoSlug,
    ListSecrets,
    SetSecret,
    GetBranchProtection,
    SetBranchProtection,
    ListEnvironments,
    CreateEnvironment,
    SetEnvironmentApprovers,
    IsGitRepo,
    HasRemote,
    ListWorkflowFiles,
    ReadFile,
}

/// A recorded mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SetSecret {
        name: String,
    },
    SetBranchProtection {
        repo: RepoSlug,
        branch: String,
        payload: BranchProtectionPayload,
    },
    CreateEnvironment {
        name: String,
    },
    SetEnvironmentApprovers {
        name: String,
        reviewers: Vec<Reviewer>,
    },
}

#[derive(Debug)]
struct Failure {
    op: Operation,
    target: Option<String>,
    message: String,
}

#[derive(Debug)]
struct HostState {
    is_repo: bool,
    has_remote: bool,
    slug: RepoSlug,
    secrets: BTreeMap<String, String>,
    protection: HashMap<String, serde_json::Value>,
    environments: Vec<String>,
    environments_available: bool,
    workflows_dir: String,
    workflow_files: Option<BTreeMap<String, String>>,
    failures: Vec<Failure>,
    calls: Vec<HostCall>,
}

impl Default for HostState {
    fn default() -> Self {
        HostState {
            is_repo: true,
            has_remote: true,
            slug: RepoSlug {
                owner: "acme".to_string(),
                name: "widgets".to_string(),
            },
            secrets: BTreeMap::new(),
            protection: HashMap::new(),
            environments: Vec::new(),
            environments_available: true,
            workflows_dir: ".github/workflows".to_string(),
            workflow_files: None,
            failures: Vec::new(),
            calls: Vec::new(),
        }
    }
}

/// In-memory repository implementing both collaborator traits.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    /// A reachable git repository with a remote and nothing configured.
    pub fn new() -> Self {
        Self::default()
    }

    fn edit(self, f: impl FnOnce(&mut HostState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn not_a_repo(self) -> Self {
        self.edit(|s| s.is_repo = false)
    }

    pub fn without_remote(self) -> Self {
        self.edit(|s| s.has_remote = false)
    }

    pub fn with_secrets(self, names: &[&str]) -> Self {
        self.edit(|s| {
            for name in names {
                s.secrets.insert(name.to_string(), "preexisting".to_string());
            }
        })
    }

    pub fn with_protection(self, branch: &str, descriptor: serde_json::Value) -> Self {
        self.edit(|s| {
            s.protection.insert(branch.to_string(), descriptor);
        })
    }

    pub fn with_environments(self, names: &[&str]) -> Self {
        self.edit(|s| s.environments.extend(names.iter().map(|n| n.to_string())))
    }

    /// Make the environments feature answer not-found (plan-gated).
    pub fn environments_unavailable(self) -> Self {
        self.edit(|s| s.environments_available = false)
    }

    /// Add a workflow file under `.github/workflows`.
    pub fn with_workflow(self, name: &str, content: &str) -> Self {
        self.edit(|s| {
            s.workflow_files
                .get_or_insert_with(BTreeMap::new)
                .insert(name.to_string(), content.to_string());
        })
    }

    /// Create an empty `.github/workflows` directory.
    pub fn with_empty_workflows_dir(self) -> Self {
        self.edit(|s| {
            s.workflow_files.get_or_insert_with(BTreeMap::new);
        })
    }

    /// Fail every invocation of `op`.
    pub fn fail_on(self, op: Operation, message: &str) -> Self {
        self.edit(|s| {
            s.failures.push(Failure {
                op,
                target: None,
                message: message.to_string(),
            })
        })
    }

    /// Fail invocations of `op` whose target (secret, environment, branch or
    /// file name) equals `target`.
    pub fn fail_on_target(self, op: Operation, target: &str, message: &str) -> Self {
        self.edit(|s| {
            s.failures.push(Failure {
                op,
                target: Some(target.to_string()),
                message: message.to_string(),
            })
        })
    }

    /// Recorded mutations, in invocation order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Value last stored for a secret.
    pub fn secret_value(&self, name: &str) -> Option<String> {
        self.state.lock().unwrap().secrets.get(name).cloned()
    }

    /// Names of configured environments, in creation order.
    pub fn environment_names(&self) -> Vec<String> {
        self.state.lock().unwrap().environments.clone()
    }

    fn check(&self, op: Operation, target: Option<&str>) -> PlatformResult<()> {
        let state = self.state.lock().unwrap();
        let hit = state.failures.iter().find(|f| {
            f.op == op && (f.target.is_none() || f.target.as_deref() == target)
        });
        match hit {
            Some(f) => Err(PlatformError::CommandFailed {
                command: format!("{op:?}"),
                stderr: f.message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostingPlatform for MemoryHost {
    async fn repo_slug(&self) -> PlatformResult<RepoSlug> {
        self.check(Operation::RepoSlug, None)?;
        Ok(self.state.lock().unwrap().slug.clone())
    }

    async fn list_secrets(&self) -> PlatformResult<Vec<String>> {
        self.check(Operation::ListSecrets, None)?;
        Ok(self.state.lock().unwrap().secrets.keys().cloned().collect())
    }

    async fn set_secret(&self, name: &str, value: &str) -> PlatformResult<()> {
        self.check(Operation::SetSecret, Some(name))?;
        let mut state = self.state.lock().unwrap();
        state.secrets.insert(name.to_string(), value.to_string());
        state.calls.push(HostCall::SetSecret {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn get_branch_protection(&self, branch: &str) -> PlatformResult<serde_json::Value> {
        self.check(Operation::GetBranchProtection, Some(branch))?;
        self.state
            .lock()
            .unwrap()
            .protection
            .get(branch)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                resource: format!("branches/{branch}/protection"),
            })
    }

    async fn set_branch_protection(
        &self,
        repo: &RepoSlug,
        branch: &str,
        payload: &BranchProtectionPayload,
    ) -> PlatformResult<()> {
        self.check(Operation::SetBranchProtection, Some(branch))?;
        let descriptor = serde_json::to_value(payload)?;
        let mut state = self.state.lock().unwrap();
        state.protection.insert(branch.to_string(), descriptor);
        state.calls.push(HostCall::SetBranchProtection {
            repo: repo.clone(),
            branch: branch.to_string(),
            payload: payload.clone(),
        });
        Ok(())
    }

    async fn list_environments(&self) -> PlatformResult<serde_json::Value> {
        self.check(Operation::ListEnvironments, None)?;
        let state = self.state.lock().unwrap();
        if !state.environments_available {
            return Err(PlatformError::NotFound {
                resource: "environments".to_string(),
            });
        }
        let entries: Vec<_> = state
            .environments
            .iter()
            .map(|name| json!({ "name": name }))
            .collect();
        Ok(json!({ "total_count": entries.len(), "environments": entries }))
    }

    async fn create_or_update_environment(&self, name: &str) -> PlatformResult<()> {
        self.check(Operation::CreateEnvironment, Some(name))?;
        let mut state = self.state.lock().unwrap();
        if !state.environments.iter().any(|e| e == name) {
            state.environments.push(name.to_string());
        }
        state.calls.push(HostCall::CreateEnvironment {
            name: name.to_string(),
        });
        Ok(())
    }

    async fn set_environment_approvers(
        &self,
        name: &str,
        reviewers: &[Reviewer],
    ) -> PlatformResult<()> {
        self.check(Operation::SetEnvironmentApprovers, Some(name))?;
        let mut state = self.state.lock().unwrap();
        state.calls.push(HostCall::SetEnvironmentApprovers {
            name: name.to_string(),
            reviewers: reviewers.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl LocalWorkspace for MemoryHost {
    async fn is_git_repo(&self) -> PlatformResult<bool> {
        self.check(Operation::IsGitRepo, None)?;
        Ok(self.state.lock().unwrap().is_repo)
    }

    async fn has_remote(&self) -> PlatformResult<bool> {
        self.check(Operation::HasRemote, None)?;
        Ok(self.state.lock().unwrap().has_remote)
    }

    async fn list_workflow_files(&self, dir: &Path) -> PlatformResult<Vec<String>> {
        self.check(Operation::ListWorkflowFiles, None)?;
        let state = self.state.lock().unwrap();
        match &state.workflow_files {
            Some(files) if dir == Path::new(&state.workflows_dir) => Ok(files
                .keys()
                .filter(|name| name.ends_with(".yml") || name.ends_with(".yaml"))
                .cloned()
                .collect()),
            _ => Err(PlatformError::NotFound {
                resource: dir.display().to_string(),
            }),
        }
    }

    async fn read_file(&self, path: &Path) -> PlatformResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.check(Operation::ReadFile, Some(&file_name))?;
        let state = self.state.lock().unwrap();
        let in_workflows_dir = path.parent() == Some(Path::new(&state.workflows_dir));
        state
            .workflow_files
            .as_ref()
            .filter(|_| in_workflows_dir)
            .and_then(|files| files.get(&file_name))
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                resource: path.display().to_string(),
            })
    }
}
