//! Error taxonomy for govsync-core.
//!
//! Most failures in the engine are data (`StepResult`, `ValidationCheck`).
//! The errors here are the ones that stop a run before it starts.

use std::path::PathBuf;

/// Errors raised while loading or checking the desired-state document.
#[derive(Debug, thiserror::Error)]
pub enum GovsyncError {
    #[error("cannot read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse configuration {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("unsupported configuration format: {0} (expected .json, .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for govsync-core operations.
pub type Result<T> = std::result::Result<T, GovsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_name_the_file() {
        let err = GovsyncError::ConfigParse {
            path: PathBuf::from("govsync.yaml"),
            detail: "expected a mapping".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("govsync.yaml"));
        assert!(msg.contains("expected a mapping"));
    }

    #[test]
    fn test_invalid_config_display() {
        let err = GovsyncError::InvalidConfig("secret name is empty".to_string());
        assert!(err.to_string().contains("invalid configuration"));
    }
}
