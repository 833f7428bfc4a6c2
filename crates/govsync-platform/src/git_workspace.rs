//! Local working tree backed by `git` and the filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::PlatformError;
use crate::platform_traits::*;

/// Working tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        GitWorkspace { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn git(&self, args: &[&str]) -> PlatformResult<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|source| PlatformError::Spawn {
                program: "git".to_string(),
                source,
            })
    }
}

fn is_workflow_file(name: &str) -> bool {
    name.ends_with(".yml") || name.ends_with(".yaml")
}

#[async_trait]
impl LocalWorkspace for GitWorkspace {
    async fn is_git_repo(&self) -> PlatformResult<bool> {
        let output = self.git(&["rev-parse", "--is-inside-work-tree"]).await?;
        Ok(output.status.success() && String::from_utf8_lossy(&output.stdout).trim() == "true")
    }

    async fn has_remote(&self) -> PlatformResult<bool> {
        let output = self.git(&["remote"]).await?;
        if !output.status.success() {
            return Err(PlatformError::CommandFailed {
                command: "git remote".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
    }

    async fn list_workflow_files(&self, dir: &Path) -> PlatformResult<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.root.join(dir)).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_workflow_file(&name) {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> PlatformResult<String> {
        Ok(tokio::fs::read_to_string(self.root.join(path)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_only_yaml_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let workflows = dir.path().join(".github/workflows");
        std::fs::create_dir_all(workflows.join("nested")).unwrap();
        std::fs::write(workflows.join("release.yaml"), "on: push\n").unwrap();
        std::fs::write(workflows.join("ci.yml"), "on: push\n").unwrap();
        std::fs::write(workflows.join("README.md"), "docs").unwrap();

        let workspace = GitWorkspace::new(dir.path());
        let files = workspace
            .list_workflow_files(Path::new(".github/workflows"))
            .await
            .unwrap();
        assert_eq!(files, vec!["ci.yml".to_string(), "release.yaml".to_string()]);
    }

    #[tokio::test]
    async fn missing_workflow_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = GitWorkspace::new(dir.path());
        let err = workspace
            .list_workflow_files(Path::new(".github/workflows"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn plain_directory_is_not_a_repo() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = GitWorkspace::new(dir.path());
        // git may be absent in minimal environments; either way it's not a repo
        assert!(!workspace.is_git_repo().await.unwrap_or(false));
    }

    #[tokio::test]
    async fn reads_file_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ci.yml"), "name: ci\n").unwrap();
        let workspace = GitWorkspace::new(dir.path());
        let content = workspace.read_file(Path::new("ci.yml")).await.unwrap();
        assert_eq!(content, "name: ci\n");
    }
}
