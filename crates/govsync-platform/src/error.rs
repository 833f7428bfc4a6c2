//! Error types for govsync-platform

use thiserror::Error;

/// Errors produced by a collaborator invocation.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The queried resource (or the feature serving it) does not exist
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The command ran but exited unsuccessfully
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// The command could not be started at all
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command answered with something we could not interpret
    #[error("unexpected response from {command}: {detail}")]
    InvalidResponse { command: String, detail: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatformError {
    /// Whether this error means "the thing does not exist" rather than
    /// "we could not find out".
    pub fn is_not_found(&self) -> bool {
        match self {
            PlatformError::NotFound { .. } => true,
            PlatformError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
