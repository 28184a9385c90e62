use anyhow::Result;
use canon_audit::core::catalog::DimensionCatalog;
use canon_audit::domain::ecosystem::EcosystemConfig;
use canon_audit::domain::facts::RepoFactSheet;
use canon_audit::domain::model::{DimensionKind, OverallVerdict, Repository, Verdict};
use canon_audit::{
    AuditSettings, Auditor, FileFactSheetProvider, HttpProbe, LocalStorage, ProfileMatrix,
    ProfileResolver,
};
use httpmock::prelude::*;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const CONNECT_YML: &str = r#"service: chittyid
onboarding:
  auth_provider: chittyauth
  provisions:
    - chitty_id
    - chitty_auth_token
    - chitty_trust_score
    - chitty_cert
"#;

const SYNC_WORKFLOW: &str = r#"name: chittyconnect-sync
on:
  schedule:
    - cron: "0 */6 * * *"
jobs: {}
"#;

const DEPLOY_WORKFLOW: &str = r#"name: deploy
on: [push]
jobs:
  deploy:
    steps:
      - run: wrangler deploy
      - run: curl -X POST https://registry.chitty.cc/api/v1/heartbeat
"#;

fn worker_facts(id: &str) -> RepoFactSheet {
    RepoFactSheet::new(id)
        .with_file(".chittyconnect.yml", CONNECT_YML)
        .with_file(".github/workflows/chittyconnect-sync.yml", SYNC_WORKFLOW)
        .with_file(".github/workflows/deploy.yml", DEPLOY_WORKFLOW)
        .with_file("CHARTER.md", "# Charter")
        .with_file("CHITTY.md", "# Chitty")
        .with_file("CODEOWNERS", "* @chittyos/platform")
        .with_package_manifest(json!({
            "name": "chittyid",
            "dependencies": {"@chittyos/chittybeacon": "^1.2.0"}
        }))
        .with_branch_protection(1, false)
}

fn write_facts(dir: &Path, facts: &RepoFactSheet) -> Result<()> {
    let name = format!("{}.json", facts.repository.replace('/', "__"));
    std::fs::write(dir.join(name), serde_json::to_vec_pretty(facts)?)?;
    Ok(())
}

fn auditor(facts_dir: &Path, ecosystem: EcosystemConfig, skip_runtime: bool) -> Auditor {
    let resolver = ProfileResolver::new(DimensionCatalog::builtin(), ProfileMatrix::builtin(), ecosystem);
    Auditor::new(
        resolver,
        Arc::new(FileFactSheetProvider::new(LocalStorage::new(facts_dir))),
        Arc::new(HttpProbe::new()),
        AuditSettings {
            concurrency: 4,
            probe_timeout: Duration::from_secs(5),
            deadline: Duration::from_secs(30),
            skip_runtime,
        },
    )
}

fn ecosystem_for(server: &MockServer) -> EcosystemConfig {
    EcosystemConfig {
        registry_url: server.base_url(),
        router_url: server.base_url(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_fully_compliant_worker() -> Result<()> {
    let server = MockServer::start();
    let registry = server.mock(|when, then| {
        when.method(GET).path("/api/v1/services/chittyid");
        then.status(200).json_body(json!({"registered": true}));
    });
    let router = server.mock(|when, then| {
        when.method(GET).path_contains("/api/v1/routes/");
        then.status(200).json_body(json!({"registered": true}));
    });
    let health = server.mock(|when, then| {
        when.method(GET).path("/health");
        then.status(200).json_body(json!({"status": "ok"}));
    });

    let dir = TempDir::new()?;
    write_facts(dir.path(), &worker_facts("chittyos/chittyid"))?;
    let repo = Repository::new("chittyos/chittyid", "cloudflare-worker").with_domain(server.base_url());

    let run = auditor(dir.path(), ecosystem_for(&server), false)
        .audit_all(&[repo])
        .await;

    registry.assert();
    router.assert();
    health.assert();

    let report = run.entries[0].report().expect("audited");
    for result in &report.results {
        assert_eq!(result.verdict, Verdict::Pass, "{:?}", result);
    }
    assert_eq!(report.overall, OverallVerdict::Compliant);
    assert_eq!(run.exit_code(), 0);
    Ok(())
}

#[tokio::test]
async fn test_worker_missing_codeowners_with_failing_health() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/health");
        then.status(503).body("unavailable");
    });
    server.mock(|when, then| {
        when.method(GET).path_contains("/api/v1/");
        then.status(200).json_body(json!({"registered": true}));
    });

    let dir = TempDir::new()?;
    let mut facts = worker_facts("chittyos/chittyid");
    facts.files.remove("CODEOWNERS");
    write_facts(dir.path(), &facts)?;
    let repo = Repository::new("chittyos/chittyid", "cloudflare-worker").with_domain(server.base_url());

    let run = auditor(dir.path(), ecosystem_for(&server), false)
        .audit_all(std::slice::from_ref(&repo))
        .await;
    let report = run.entries[0].report().expect("audited");
    assert_eq!(report.verdict_of(DimensionKind::Canon), Some(Verdict::Fail));
    assert_eq!(report.verdict_of(DimensionKind::HealthEndpoint), Some(Verdict::Fail));
    assert_eq!(report.overall, OverallVerdict::NonCompliant);
    assert_eq!(run.exit_code(), 1);

    let skipped = auditor(dir.path(), ecosystem_for(&server), true)
        .audit_all(&[repo])
        .await;
    let report = skipped.entries[0].report().expect("audited");
    assert_eq!(report.verdict_of(DimensionKind::HealthEndpoint), Some(Verdict::Unknown));
    assert_eq!(report.verdict_of(DimensionKind::Canon), Some(Verdict::Fail));
    assert_eq!(report.overall, OverallVerdict::NonCompliant);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_registry_is_indeterminate_not_failed() -> Result<()> {
    let dir = TempDir::new()?;
    write_facts(dir.path(), &worker_facts("chittyos/chittyid"))?;
    let ecosystem = EcosystemConfig {
        registry_url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    // No domain: route and health drop out, only the registry probe runs.
    let repo = Repository::new("chittyos/chittyid", "cloudflare-worker");

    let run = auditor(dir.path(), ecosystem, false).audit_all(&[repo]).await;
    let report = run.entries[0].report().expect("audited");
    assert_eq!(
        report.verdict_of(DimensionKind::ServiceRegistration),
        Some(Verdict::Unknown)
    );
    assert_eq!(
        report.verdict_of(DimensionKind::HealthEndpoint),
        Some(Verdict::NotApplicable)
    );
    assert_eq!(report.overall, OverallVerdict::Indeterminate);
    assert_eq!(run.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn test_documentation_repo_without_connect_config_is_compliant() -> Result<()> {
    let dir = TempDir::new()?;
    let facts = RepoFactSheet::new("chittyos/handbook")
        .with_file("CHARTER.md", "# Charter")
        .with_file("CHITTY.md", "# Chitty")
        .with_file(".github/CODEOWNERS", "* @chittyos/docs")
        .with_branch_protection(2, false);
    write_facts(dir.path(), &facts)?;

    let run = auditor(dir.path(), EcosystemConfig::default(), false)
        .audit_all(&[Repository::new("chittyos/handbook", "documentation")])
        .await;
    let report = run.entries[0].report().expect("audited");
    assert_eq!(report.results.len(), 7);
    assert_eq!(
        report.verdict_of(DimensionKind::Connect),
        Some(Verdict::NotApplicable)
    );
    assert_eq!(report.overall, OverallVerdict::Compliant);
    Ok(())
}

#[tokio::test]
async fn test_entries_keep_input_order_across_failures() -> Result<()> {
    let dir = TempDir::new()?;
    write_facts(dir.path(), &worker_facts("chittyos/a"))?;
    let repos = vec![
        Repository::new("chittyos/b", "npm-package"),
        Repository::new("chittyos/mystery", "lambda"),
        Repository::new("chittyos/a", "tool"),
    ];

    let run = auditor(dir.path(), EcosystemConfig::default(), true)
        .audit_all(&repos)
        .await;
    let order: Vec<&str> = run.entries.iter().map(|e| e.repository()).collect();
    assert_eq!(order, vec!["chittyos/b", "chittyos/mystery", "chittyos/a"]);
    assert_eq!(
        run.entries[0].report().map(|r| r.overall),
        Some(OverallVerdict::Indeterminate)
    );
    assert!(run.entries[1].report().is_none());
    assert_eq!(run.exit_code(), 3);

    let json = run.to_json()?;
    assert!(json.contains("\"status\": \"failed\""));
    assert!(json.contains("\"status\": \"audited\""));
    Ok(())
}
