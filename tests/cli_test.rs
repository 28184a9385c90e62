use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::path::Path;
use tempfile::TempDir;

fn cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("canon-audit").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn write_docs_facts(dir: &Path, with_charter: bool) -> Result<()> {
    let facts_dir = dir.join("facts");
    std::fs::create_dir_all(&facts_dir)?;
    let mut files = serde_json::json!({
        "CHITTY.md": "# Chitty",
        ".github/CODEOWNERS": "* @chittyos/docs"
    });
    if with_charter {
        files["CHARTER.md"] = serde_json::json!("# Charter");
    }
    let facts = serde_json::json!({
        "repository": "chittyos/handbook",
        "files": files,
        "branch_protection": {"branch": "main", "required_reviews": 1, "allow_force_pushes": false}
    });
    std::fs::write(
        facts_dir.join("chittyos__handbook.json"),
        serde_json::to_vec_pretty(&facts)?,
    )?;
    Ok(())
}

fn write_config(dir: &Path, extra: &str) -> Result<()> {
    let config = format!(
        "[facts]\ndirectory = \"facts\"\n\n[[repositories]]\nid = \"chittyos/handbook\"\nservice_type = \"documentation\"\n{}",
        extra
    );
    std::fs::write(dir.join("canon-audit.toml"), config)?;
    Ok(())
}

#[test]
fn test_uri_exit_codes() -> Result<()> {
    let dir = TempDir::new()?;
    cmd(dir.path())
        .args(["uri", "chitty://docs/tech/spec/canon-uri"])
        .assert()
        .code(0)
        .stdout(contains("chitty://docs/tech/spec/canon-uri"));

    cmd(dir.path())
        .args(["uri", "chitty://core/ok", "chitty://docs/tech/memo/x"])
        .assert()
        .code(1)
        .stdout(contains("type is 'memo'"));
    Ok(())
}

#[test]
fn test_resolve_exit_codes() -> Result<()> {
    let dir = TempDir::new()?;
    let combinable = dir.path().join("list.md");
    std::fs::write(
        &combinable,
        "<<<<<<< HEAD\n- a\n- b\n=======\n- a\n- c\n>>>>>>> feature\n",
    )?;
    let contested = dir.path().join("version.toml");
    std::fs::write(
        &contested,
        "<<<<<<< HEAD\nversion = 2\n=======\nversion = 3\n>>>>>>> feature\n",
    )?;
    let broken = dir.path().join("broken.txt");
    std::fs::write(&broken, "<<<<<<< HEAD\nx\n")?;

    cmd(dir.path())
        .args(["resolve", "--write", "list.md"])
        .assert()
        .code(0)
        .stdout(contains("Combine"));
    assert_eq!(std::fs::read_to_string(&combinable)?, "- a\n- b\n- c\n");

    cmd(dir.path())
        .args(["resolve", "version.toml"])
        .assert()
        .code(1)
        .stdout(contains("manual review"));

    cmd(dir.path())
        .args(["resolve", "version.toml", "broken.txt"])
        .assert()
        .code(3)
        .stdout(contains("Malformed conflict markers"));
    Ok(())
}

#[test]
fn test_audit_skip_runtime_reports_verdict_exit_codes() -> Result<()> {
    let dir = TempDir::new()?;
    write_config(dir.path(), "")?;

    write_docs_facts(dir.path(), true)?;
    cmd(dir.path())
        .args(["audit", "--skip-runtime"])
        .assert()
        .code(0)
        .stdout(contains("\"overall\": \"Compliant\""));

    write_docs_facts(dir.path(), false)?;
    cmd(dir.path())
        .args(["audit", "--skip-runtime"])
        .assert()
        .code(1)
        .stdout(contains("missing CHARTER.md").and(contains("NonCompliant")));
    Ok(())
}

#[test]
fn test_audit_unknown_service_type_is_fatal_for_the_run() -> Result<()> {
    let dir = TempDir::new()?;
    write_docs_facts(dir.path(), true)?;
    write_config(
        dir.path(),
        "\n[[repositories]]\nid = \"chittyos/mainframe\"\nservice_type = \"mainframe\"\n",
    )?;

    cmd(dir.path())
        .args(["audit", "--skip-runtime", "--output", "report.json"])
        .assert()
        .code(3);

    let report = std::fs::read_to_string(dir.path().join("report.json"))?;
    assert!(report.contains("\"status\": \"audited\""));
    assert!(report.contains("mainframe"));
    Ok(())
}

#[test]
fn test_invalid_config_exits_fatal() -> Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(
        dir.path().join("canon-audit.toml"),
        "[runtime]\nconcurrency = 0\n",
    )?;
    cmd(dir.path())
        .args(["audit", "--skip-runtime"])
        .assert()
        .code(3)
        .stderr(contains("❌"));
    Ok(())
}
