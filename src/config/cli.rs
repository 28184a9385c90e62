use crate::utils::error::{AuditError, Result};
use crate::utils::validation::{self, Validate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "canon-audit")]
#[command(about = "Compliance audits, canon URI checks and merge-conflict resolution")]
#[command(version)]
pub struct CliConfig {
    /// Configuration file; `canon-audit.toml` is used when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Audit the configured repositories.
    Audit(AuditArgs),

    /// Validate canon URIs.
    Uri {
        #[arg(required = true)]
        uris: Vec<String>,
    },

    /// Validate document frontmatter.
    Metadata {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Lifecycle status the documents had before this change.
        #[arg(long)]
        previous_status: Option<String>,
    },

    /// Analyze conflict-marked files and resolve what can be resolved safely.
    Resolve {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write fully resolved files back in place.
        #[arg(long)]
        write: bool,
    },

    /// Bundle export checks.
    Bundle {
        #[command(subcommand)]
        action: BundleCommand,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AuditArgs {
    /// Only audit the repository with this id or name.
    #[arg(long)]
    pub service: Option<String>,

    /// Mark live probes as skipped instead of running them.
    #[arg(long)]
    pub skip_runtime: bool,

    #[arg(long)]
    pub facts_dir: Option<String>,

    /// Write the JSON report here instead of stdout.
    #[arg(long)]
    pub output: Option<String>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[arg(long)]
    pub deadline_seconds: Option<u64>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum BundleCommand {
    /// Check configuration, credentials and output directory before an export.
    Preflight {
        #[arg(long)]
        bundle: Option<String>,
    },
    /// Check an exported bundle against its manifest.
    Verify { bundle: String },
}

impl Validate for AuditArgs {
    fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency {
            validation::validate_positive_number("--concurrency", concurrency, 1)?;
        }
        if let Some(deadline) = self.deadline_seconds {
            validation::validate_positive_number("--deadline-seconds", deadline as usize, 1)?;
        }
        if let Some(dir) = &self.facts_dir {
            validation::validate_path("--facts-dir", dir)?;
        }
        if let Some(output) = &self.output {
            validation::validate_path("--output", output)?;
        }
        Ok(())
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Audit(args) => args.validate(),
            Command::Uri { uris } if uris.is_empty() => Err(AuditError::MissingConfigError {
                field: "uris".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_audit_flags() {
        let cli = CliConfig::parse_from([
            "canon-audit",
            "--verbose",
            "audit",
            "--skip-runtime",
            "--concurrency",
            "2",
            "--service",
            "chittyid",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Command::Audit(args) => {
                assert!(args.skip_runtime);
                assert_eq!(args.concurrency, Some(2));
                assert_eq!(args.service.as_deref(), Some("chittyid"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let cli = CliConfig::parse_from(["canon-audit", "audit", "--concurrency", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_bundle_verify_takes_positional_bundle() {
        let cli = CliConfig::parse_from(["canon-audit", "bundle", "verify", "governance"]);
        assert!(matches!(
            cli.command,
            Command::Bundle {
                action: BundleCommand::Verify { ref bundle }
            } if bundle == "governance"
        ));
    }
}
