use canon_audit::adapters::{FileFactSheetProvider, HttpProbe, LocalStorage};
use canon_audit::app::bundle::{self, ExportConfig, DEFAULT_EXPORT_CONFIG, TOKEN_VARIABLE};
use canon_audit::config::{AuditArgs, AuditConfig, BundleCommand, CliConfig, Command, DEFAULT_CONFIG_PATH};
use canon_audit::core::canon_uri;
use canon_audit::core::conflict;
use canon_audit::core::metadata::{self, LifecycleStatus};
use canon_audit::domain::model::Repository;
use canon_audit::domain::ports::Storage;
use canon_audit::utils::error::{AuditError, ErrorSeverity, Result};
use canon_audit::utils::{logger, validation::Validate};
use canon_audit::Auditor;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting canon-audit CLI");
    tracing::debug!("CLI config: {:?}", cli);

    if let Err(e) = cli.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(3);
    }

    let exit_code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(
                "❌ canon-audit failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            // 0-2 are verdicts; anything that stopped the command is fatal
            match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium | ErrorSeverity::High | ErrorSeverity::Critical => 3,
            }
        }
    };

    std::process::exit(exit_code);
}

async fn run(cli: &CliConfig) -> Result<i32> {
    match &cli.command {
        Command::Audit(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_audit(&config, args).await
        }
        Command::Uri { uris } => Ok(run_uri(uris)),
        Command::Metadata {
            files,
            previous_status,
        } => run_metadata(files, previous_status.as_deref()).await,
        Command::Resolve { files, write } => run_resolve(files, *write).await,
        Command::Bundle { action } => {
            let config = load_config(cli.config.as_deref())?;
            run_bundle(&config, action).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AuditConfig> {
    let config = match path {
        Some(path) => AuditConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AuditConfig::from_file(DEFAULT_CONFIG_PATH)?,
        None => {
            tracing::warn!("⚠️ No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
            AuditConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

async fn run_audit(config: &AuditConfig, args: &AuditArgs) -> Result<i32> {
    let mut settings = config.audit_settings();
    settings.skip_runtime = args.skip_runtime;
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(deadline) = args.deadline_seconds {
        settings.deadline = Duration::from_secs(deadline);
    }

    let facts_dir = args
        .facts_dir
        .clone()
        .or_else(|| config.facts.directory.clone())
        .ok_or_else(|| AuditError::MissingConfigError {
            field: "facts.directory".to_string(),
        })?;

    let repositories: Vec<Repository> = config
        .repositories
        .iter()
        .filter(|repo| match args.service.as_deref() {
            Some(service) => repo.id == service || repo.name() == service,
            None => true,
        })
        .cloned()
        .collect();
    if let (Some(service), true) = (&args.service, repositories.is_empty()) {
        return Err(AuditError::ValidationError {
            message: format!("No configured repository matches '{}'", service),
        });
    }

    let auditor = Auditor::new(
        config.resolver()?,
        Arc::new(FileFactSheetProvider::new(LocalStorage::new(facts_dir))),
        Arc::new(HttpProbe::new()),
        settings,
    );
    let run = auditor.audit_all(&repositories).await;
    let json = run.to_json()?;

    match &args.output {
        Some(path) => {
            LocalStorage::new(".").write_file(path, json.as_bytes()).await?;
            tracing::info!("📁 Report saved to: {}", path);
        }
        None => println!("{}", json),
    }

    Ok(run.exit_code())
}

fn run_uri(uris: &[String]) -> i32 {
    let mut exit_code = 0;
    for input in uris {
        match canon_uri::validate(input) {
            Ok(uri) => println!("✅ {}", uri),
            Err(e) => {
                println!("❌ {}", e);
                exit_code = 1;
            }
        }
    }
    exit_code
}

async fn run_metadata(files: &[PathBuf], previous_status: Option<&str>) -> Result<i32> {
    let previous = previous_status
        .map(|value| {
            value
                .parse::<LifecycleStatus>()
                .map_err(|reason| AuditError::InvalidConfigValueError {
                    field: "--previous-status".to_string(),
                    value: value.to_string(),
                    reason,
                })
        })
        .transpose()?;

    let mut exit_code = 0;
    for path in files {
        let text = tokio::fs::read_to_string(path).await?;
        let errors: Vec<String> = match metadata::parse_frontmatter(&text) {
            Ok(fields) => metadata::validate_metadata(&fields, previous)
                .into_iter()
                .map(|e| e.to_string())
                .collect(),
            Err(e) => vec![e.to_string()],
        };

        if errors.is_empty() {
            println!("✅ {}", path.display());
        } else {
            exit_code = 1;
            println!("❌ {}", path.display());
            for error in errors {
                println!("   - {}", error);
            }
        }
    }
    Ok(exit_code)
}

async fn run_resolve(files: &[PathBuf], write: bool) -> Result<i32> {
    let mut inputs = Vec::with_capacity(files.len());
    for path in files {
        let text = tokio::fs::read_to_string(path).await?;
        inputs.push((path.display().to_string(), text));
    }

    let mut exit_code = 0;
    for (path, outcome) in conflict::resolve_batch(inputs).await {
        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(e) => {
                println!("❌ {}: {}", path, e);
                exit_code = 3;
                continue;
            }
        };

        for (region, proposal) in resolution.regions.iter().zip(&resolution.resolutions) {
            println!(
                "   region {} (lines {}-{}): {} - {}",
                region.index, region.start_line, region.end_line, proposal.strategy, proposal.rationale
            );
        }

        match &resolution.resolved {
            Some(resolved) if write && !resolution.regions.is_empty() => {
                tokio::fs::write(&path, &resolved.text).await?;
                println!("✅ {}: resolved and written", path);
            }
            Some(_) => println!("✅ {}: {} region(s) resolvable", path, resolution.regions.len()),
            None => {
                println!(
                    "⚠️ {}: regions {:?} need manual review",
                    path, resolution.unresolved
                );
                exit_code = exit_code.max(1);
            }
        }
    }
    Ok(exit_code)
}

async fn run_bundle(config: &AuditConfig, action: &BundleCommand) -> Result<i32> {
    let path = config
        .bundles
        .as_ref()
        .map(|b| b.config.clone())
        .unwrap_or_else(|| DEFAULT_EXPORT_CONFIG.to_string());
    tracing::info!("🔍 Bundle export config: {}", path);
    let export = ExportConfig::from_file(&path)?;

    let check = match action {
        BundleCommand::Preflight { bundle: key } => {
            let token = std::env::var(TOKEN_VARIABLE).ok();
            bundle::preflight(&export, key.as_deref(), token.as_deref()).await
        }
        BundleCommand::Verify { bundle: key } => bundle::verify(&export, key).await?,
    };

    println!("{}", serde_json::to_string_pretty(&check)?);
    Ok(check.exit_code())
}
