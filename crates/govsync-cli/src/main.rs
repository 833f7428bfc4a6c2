//! govsync - repository governance reconciliation CLI
//!
//! The `govsync` command brings a repository's branch protection, secrets and
//! deployment environments in line with a desired-state document.
//!
//! ## Commands
//!
//! - `setup`: Probe, reconcile every facet, then validate
//! - `validate`: Run the validation checks only
//! - `plan`: Show what `setup` would change, without changing anything
//! - `status`: Show the currently configured state
//!
//! Reports go to stdout (text or JSON); logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, Level};

use govsync_core::{
    init_tracing, plan, render_plan_text, render_setup_text, render_state_text,
    render_validation_text, DesiredState, EnvSecretReader, PlanAction, SecretReader, SetupRunner,
    StateProbe, TerminalSecretPrompt, ValidationEngine, ValidationOptions, DEFAULT_BRANCH,
};
use govsync_platform::{GhCli, GitWorkspace, HostingPlatform, LocalWorkspace};

const DEFAULT_CONFIG: &str = "govsync.yaml";

#[derive(Parser)]
#[command(name = "govsync")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Repository governance reconciliation", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Repository working tree to operate on
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// GitHub CLI executable
    #[arg(long, global = true, env = "GOVSYNC_GH", default_value = "gh")]
    gh: String,

    /// Report format written to stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the repository toward the desired state
    Setup {
        /// Desired-state document (.json, .yaml, .yml or .toml)
        #[arg(short, long, env = "GOVSYNC_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        /// Do not run validation after reconciling
        #[arg(long)]
        skip_validation: bool,

        /// Read secret values from same-named environment variables
        #[arg(long)]
        secrets_from_env: bool,
    },

    /// Check the repository without changing it
    Validate {
        /// Desired-state document naming required secrets and environments
        #[arg(short, long, env = "GOVSYNC_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Show what setup would change
    Plan {
        /// Desired-state document (.json, .yaml, .yml or .toml)
        #[arg(short, long, env = "GOVSYNC_CONFIG", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Show the currently configured state
    Status {
        /// Branch whose protection is reported
        #[arg(short, long, default_value = DEFAULT_BRANCH)]
        branch: String,
    },
}

/// A rendered report and whether the command succeeded.
struct Rendered {
    body: String,
    passed: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json_logs, level);

    let host = GhCli::new(cli.gh.clone(), cli.repo.clone());
    let workspace = GitWorkspace::new(cli.repo.clone());

    let rendered = match cli.command {
        Commands::Setup {
            config,
            skip_validation,
            secrets_from_env,
        } => {
            let prompt: Box<dyn SecretReader> = if secrets_from_env {
                Box::new(EnvSecretReader)
            } else {
                Box::new(TerminalSecretPrompt)
            };
            cmd_setup(
                &host,
                &workspace,
                prompt.as_ref(),
                &config,
                skip_validation,
                cli.format,
            )
            .await?
        }
        Commands::Validate { config } => {
            cmd_validate(&host, &workspace, config.as_deref(), cli.format).await?
        }
        Commands::Plan { config } => cmd_plan(&host, &workspace, &config, cli.format).await?,
        Commands::Status { branch } => cmd_status(&host, &workspace, &branch, cli.format).await?,
    };

    print!("{}", rendered.body);
    Ok(if rendered.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
            Ok(format!("{json}\n"))
        }
    }
}

async fn load_config(path: &Path) -> Result<DesiredState> {
    DesiredState::load(path)
        .await
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

async fn cmd_setup(
    host: &dyn HostingPlatform,
    workspace: &dyn LocalWorkspace,
    prompt: &dyn SecretReader,
    config: &Path,
    skip_validation: bool,
    format: OutputFormat,
) -> Result<Rendered> {
    let mut runner = SetupRunner::new(host, workspace, prompt);
    if skip_validation {
        runner = runner.without_validation();
    }
    let report = runner.run_from_file(config).await;
    let passed = report.succeeded();
    info!(run_id = %report.run_id, passed, "setup finished");

    Ok(Rendered {
        body: render(format, &report, render_setup_text)?,
        passed,
    })
}

async fn cmd_validate(
    host: &dyn HostingPlatform,
    workspace: &dyn LocalWorkspace,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<Rendered> {
    let options = match config {
        Some(path) => ValidationOptions::from(&load_config(path).await?),
        None => ValidationOptions::default(),
    };
    let result = ValidationEngine::new(host, workspace)
        .generate_report(&options)
        .await;

    Ok(Rendered {
        body: render(format, &result, render_validation_text)?,
        passed: result.passed,
    })
}

async fn cmd_plan(
    host: &dyn HostingPlatform,
    workspace: &dyn LocalWorkspace,
    config: &Path,
    format: OutputFormat,
) -> Result<Rendered> {
    let desired = load_config(config).await?;
    let actual = StateProbe::new(host, workspace)
        .detect_current_state(desired.protected_branch())
        .await;
    let plan = plan(&desired, &actual);
    let passed = !plan
        .steps
        .iter()
        .any(|s| matches!(s.action, PlanAction::Fail { .. }));

    Ok(Rendered {
        body: render(format, &plan, render_plan_text)?,
        passed,
    })
}

async fn cmd_status(
    host: &dyn HostingPlatform,
    workspace: &dyn LocalWorkspace,
    branch: &str,
    format: OutputFormat,
) -> Result<Rendered> {
    let actual = StateProbe::new(host, workspace)
        .detect_current_state(branch)
        .await;

    Ok(Rendered {
        body: render(format, &actual, render_state_text)?,
        passed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use govsync_core::fakes::ScriptedSecretReader;
    use govsync_platform::fakes::MemoryHost;

    fn write_config(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_setup_flags_parse() {
        let cli = Cli::try_parse_from([
            "govsync",
            "--format",
            "json",
            "setup",
            "--config",
            "gov.toml",
            "--secrets-from-env",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Setup {
                config,
                skip_validation,
                secrets_from_env,
            } => {
                assert_eq!(config, PathBuf::from("gov.toml"));
                assert!(!skip_validation);
                assert!(secrets_from_env);
            }
            _ => panic!("expected setup"),
        }
    }

    #[tokio::test]
    async fn test_setup_reports_success_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(
            &dir,
            "gov.json",
            r#"{"branchProtection": {"branch": "main"}, "secrets": ["DEPLOY_KEY"]}"#,
        );
        let host = MemoryHost::new().with_workflow("ci.yml", "on: push\n");
        let reader = ScriptedSecretReader::new().with_value("DEPLOY_KEY", "k");

        let rendered = cmd_setup(&host, &host, &reader, &config, false, OutputFormat::Json)
            .await
            .unwrap();

        assert!(rendered.passed);
        let report: serde_json::Value = serde_json::from_str(&rendered.body).unwrap();
        assert_eq!(report["summary"]["totalSteps"], 3);
        assert_eq!(report["validation"]["passed"], true);
    }

    #[tokio::test]
    async fn test_setup_with_bad_config_fails_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let host = MemoryHost::new();
        let reader = ScriptedSecretReader::new();

        let rendered = cmd_setup(
            &host,
            &host,
            &reader,
            &dir.path().join("missing.yaml"),
            false,
            OutputFormat::Text,
        )
        .await
        .unwrap();

        assert!(!rendered.passed);
        assert!(rendered.body.contains("Load configuration"));
    }

    #[tokio::test]
    async fn test_validate_without_config_checks_defaults() {
        let host = MemoryHost::new();
        let rendered = cmd_validate(&host, &host, None, OutputFormat::Text)
            .await
            .unwrap();

        assert!(!rendered.passed);
        assert!(rendered.body.contains("Branch 'main' is not protected"));
    }

    #[tokio::test]
    async fn test_plan_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(&dir, "gov.yaml", "secrets:\n  - A\n  - B\n");
        let host = MemoryHost::new().with_secrets(&["A"]);

        let rendered = cmd_plan(&host, &host, &config, OutputFormat::Text)
            .await
            .unwrap();

        assert!(rendered.body.contains("Secrets: apply B"));
        assert!(!rendered.passed, "missing protection config is a planned failure");
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plan_with_unreadable_config_is_an_error() {
        let host = MemoryHost::new();
        let result = cmd_plan(&host, &host, Path::new("/nonexistent/gov.yaml"), OutputFormat::Text).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_status_lists_configured_items() {
        let host = MemoryHost::new()
            .with_secrets(&["A"])
            .with_environments(&["staging"]);
        let rendered = cmd_status(&host, &host, "main", OutputFormat::Text)
            .await
            .unwrap();

        assert!(rendered.passed);
        assert!(rendered.body.contains("Secrets:           A"));
        assert!(rendered.body.contains("Environments:      staging"));
    }
}
