//! `gh` command-line backed hosting platform
//!
//! Every operation is one `gh` invocation. Request bodies and secret values
//! travel over the child's stdin so they never show up in process listings.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::PlatformError;
use crate::platform_traits::*;

/// GitHub CLI client.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
    workdir: PathBuf,
}

impl GhCli {
    /// Create a client running `program` (usually `gh`) inside `workdir`.
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        GhCli {
            program: program.into(),
            workdir: workdir.into(),
        }
    }

    /// Working directory the CLI resolves `{owner}/{repo}` from.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str], stdin: Option<&[u8]>) -> PlatformResult<String> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!(command = %command_line, "invoking hosting platform CLI");

        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PlatformError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_not_found_message(&stderr) {
            return Err(PlatformError::NotFound {
                resource: args.last().copied().unwrap_or_default().to_string(),
            });
        }
        Err(PlatformError::CommandFailed {
            command: command_line,
            stderr,
        })
    }

    async fn api(&self, args: &[&str], body: Option<&serde_json::Value>) -> PlatformResult<String> {
        let mut full = vec!["api", "-H", "Accept: application/vnd.github+json"];
        full.extend_from_slice(args);
        match body {
            Some(body) => {
                full.extend_from_slice(&["--input", "-"]);
                let bytes = serde_json::to_vec(body)?;
                self.run(&full, Some(&bytes)).await
            }
            None => self.run(&full, None).await,
        }
    }

    async fn api_json(&self, args: &[&str]) -> PlatformResult<serde_json::Value> {
        let out = self.api(args, None).await?;
        Ok(serde_json::from_str(&out)?)
    }

    /// Resolve a reviewer identifier to the numeric id the API expects.
    async fn resolve_reviewer_id(&self, reviewer: &Reviewer) -> PlatformResult<u64> {
        let endpoint = match reviewer.kind {
            ReviewerKind::User => format!("users/{}", urlencoding::encode(&reviewer.id)),
            ReviewerKind::Team => {
                let (org, slug) =
                    reviewer
                        .id
                        .split_once('/')
                        .ok_or_else(|| PlatformError::InvalidResponse {
                            command: "resolve team".to_string(),
                            detail: format!("team identifier {} has no org", reviewer.id),
                        })?;
                format!(
                    "orgs/{}/teams/{}",
                    urlencoding::encode(org),
                    urlencoding::encode(slug)
                )
            }
        };
        let value = self.api_json(&[&endpoint]).await?;
        value["id"]
            .as_u64()
            .ok_or_else(|| PlatformError::InvalidResponse {
                command: endpoint,
                detail: "missing numeric id".to_string(),
            })
    }
}

/// Percent-encode a branch name, keeping `/` as the path separator.
fn encode_branch(branch: &str) -> String {
    branch
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn protection_endpoint(repo: &str, branch: &str) -> String {
    format!("repos/{repo}/branches/{}/protection", encode_branch(branch))
}

/// Environment names are a single path segment, so `/` is encoded too.
fn environment_endpoint(name: &str) -> String {
    format!("repos/{{owner}}/{{repo}}/environments/{}", urlencoding::encode(name))
}

/// `gh` reports REST 404s on stderr as `HTTP 404` / `Not Found`.
fn is_not_found_message(stderr: &str) -> bool {
    stderr.contains("HTTP 404") || stderr.contains("Not Found")
}

#[derive(Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Deserialize)]
struct RepoView {
    owner: RepoOwner,
    name: String,
}

#[derive(Deserialize)]
struct RepoOwner {
    login: String,
}

#[async_trait]
impl HostingPlatform for GhCli {
    async fn repo_slug(&self) -> PlatformResult<RepoSlug> {
        let out = self.run(&["repo", "view", "--json", "owner,name"], None).await?;
        let view: RepoView = serde_json::from_str(&out)?;
        Ok(RepoSlug {
            owner: view.owner.login,
            name: view.name,
        })
    }

    async fn list_secrets(&self) -> PlatformResult<Vec<String>> {
        let out = self.run(&["secret", "list", "--json", "name"], None).await?;
        let entries: Vec<NamedEntry> = serde_json::from_str(&out)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    async fn set_secret(&self, name: &str, value: &str) -> PlatformResult<()> {
        self.run(&["secret", "set", name], Some(value.as_bytes()))
            .await
            .map(|_| ())
    }

    async fn get_branch_protection(&self, branch: &str) -> PlatformResult<serde_json::Value> {
        let endpoint = protection_endpoint("{owner}/{repo}", branch);
        self.api_json(&[&endpoint]).await
    }

    async fn set_branch_protection(
        &self,
        repo: &RepoSlug,
        branch: &str,
        payload: &BranchProtectionPayload,
    ) -> PlatformResult<()> {
        let slug = format!(
            "{}/{}",
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        );
        let endpoint = protection_endpoint(&slug, branch);
        let body = serde_json::to_value(payload)?;
        self.api(&["-X", "PUT", &endpoint], Some(&body)).await.map(|_| ())
    }

    async fn list_environments(&self) -> PlatformResult<serde_json::Value> {
        self.api_json(&["repos/{owner}/{repo}/environments"]).await
    }

    async fn create_or_update_environment(&self, name: &str) -> PlatformResult<()> {
        let endpoint = environment_endpoint(name);
        self.api(&["-X", "PUT", &endpoint], None).await.map(|_| ())
    }

    async fn set_environment_approvers(
        &self,
        name: &str,
        reviewers: &[Reviewer],
    ) -> PlatformResult<()> {
        let mut resolved = Vec::with_capacity(reviewers.len());
        for reviewer in reviewers {
            let id = self.resolve_reviewer_id(reviewer).await?;
            resolved.push(json!({ "type": reviewer.kind, "id": id }));
        }
        let endpoint = environment_endpoint(name);
        let body = json!({ "reviewers": resolved });
        self.api(&["-X", "PUT", &endpoint], Some(&body)).await.map(|_| ())
    }
}
