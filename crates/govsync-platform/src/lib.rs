//! govsync-platform: collaborators for the govsync reconciliation engine
//!
//! This crate owns every side effect the engine performs against the outside
//! world. It exposes two async traits and their implementations:
//!
//! - `HostingPlatform`: remote repository settings, backed by the `gh` CLI
//!   (`GhCli`)
//! - `LocalWorkspace`: the local working tree, backed by `git` and the
//!   filesystem (`GitWorkspace`)
//!
//! `fakes::MemoryHost` implements both in memory for tests.

mod error;
pub mod fakes;
pub mod gh_cli;
pub mod git_workspace;
pub mod platform_traits;

pub use error::PlatformError;
pub use gh_cli::GhCli;
pub use git_workspace::GitWorkspace;
pub use platform_traits::{
    BranchProtectionPayload, HostingPlatform, LocalWorkspace, PlatformResult, RepoSlug,
    RequiredPullRequestReviews, RequiredStatusChecks, Reviewer, ReviewerKind, StatusCheck,
};
