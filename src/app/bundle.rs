//! Readiness and integrity checks for bundle exports.
//!
//! `preflight` runs before an export: configuration shape, credentials and a
//! writable output root. `verify` runs after one: the manifest, every CSV it
//! lists, and the audit trail.

use crate::adapters::storage::LocalStorage;
use crate::domain::ports::Storage;
use crate::utils::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_EXPORT_CONFIG: &str = "chittyos-export.yaml";
pub const TOKEN_VARIABLE: &str = "NOTION_TOKEN";
pub const MIN_TOKEN_LENGTH: usize = 20;
const TODO_PREFIX: &str = "TODO:";
const WRITE_CHECK_FILE: &str = ".preflight_test";

fn default_output_root() -> String {
    "packages".to_string()
}

fn default_manifest_filename() -> String {
    "manifest.json".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub export_bundles: BTreeMap<String, BundleSpec>,
    #[serde(default)]
    pub defaults: ExportDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportDefaults {
    #[serde(default = "default_output_root")]
    pub output_root: String,
    #[serde(default = "default_manifest_filename")]
    pub manifest_filename: String,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            manifest_filename: default_manifest_filename(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleSpec {
    pub name: Option<String>,
    pub schema_version: Option<String>,
    #[serde(default)]
    pub databases: Vec<DatabaseSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseSpec {
    pub key: Option<String>,
    #[serde(default)]
    pub notion_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    pub schema_version: Option<String>,
    #[serde(default)]
    pub items: Vec<ManifestItem>,
    #[serde(default)]
    pub audit: ManifestAudit,
    pub exported_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestItem {
    pub db_key: Option<String>,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestAudit {
    pub chitty_id: Option<String>,
}

impl ExportConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingLevel {
    Ok,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub level: FindingLevel,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundleCheck {
    pub findings: Vec<Finding>,
}

impl BundleCheck {
    fn record(&mut self, level: FindingLevel, subject: impl Into<String>, message: impl Into<String>) {
        let finding = Finding {
            level,
            subject: subject.into(),
            message: message.into(),
        };
        match level {
            FindingLevel::Ok => tracing::info!("✅ {}: {}", finding.subject, finding.message),
            FindingLevel::Warning => tracing::warn!("⚠️ {}: {}", finding.subject, finding.message),
            FindingLevel::Error => tracing::error!("❌ {}: {}", finding.subject, finding.message),
        }
        self.findings.push(finding);
    }

    fn ok(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.record(FindingLevel::Ok, subject, message);
    }

    fn warn(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.record(FindingLevel::Warning, subject, message);
    }

    fn error(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.record(FindingLevel::Error, subject, message);
    }

    pub fn passed(&self) -> bool {
        self.findings.iter().all(|f| f.level != FindingLevel::Error)
    }

    pub fn count(&self, level: FindingLevel) -> usize {
        self.findings.iter().filter(|f| f.level == level).count()
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}

/// A leftover check file is reported but does not fail the preflight.
async fn remove_write_check(check: &mut BundleCheck, storage: &LocalStorage) {
    let path = storage.resolve(WRITE_CHECK_FILE);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        check.warn(
            path.display().to_string(),
            format!("could not remove write check file: {}", e),
        );
    }
}

fn check_token(check: &mut BundleCheck, token: Option<&str>) {
    match token {
        None | Some("") => check.error(TOKEN_VARIABLE, "environment variable not set"),
        Some(t) if t.len() < MIN_TOKEN_LENGTH => check.error(
            TOKEN_VARIABLE,
            format!("appears too short (< {} chars)", MIN_TOKEN_LENGTH),
        ),
        Some(_) => check.ok(TOKEN_VARIABLE, "is set"),
    }
}

fn check_bundle_spec(check: &mut BundleCheck, key: &str, spec: &BundleSpec) {
    let subject = format!("bundle {}", key);
    match &spec.name {
        Some(name) => check.ok(&subject, format!("name: {}", name)),
        None => check.error(&subject, "missing 'name' field"),
    }
    match &spec.schema_version {
        Some(version) => check.ok(&subject, format!("schema version: {}", version)),
        None => check.error(&subject, "missing 'schema_version' field"),
    }
    if spec.databases.is_empty() {
        check.error(&subject, "no databases configured");
        return;
    }
    check.ok(&subject, format!("{} database(s) configured", spec.databases.len()));

    for database in &spec.databases {
        let db_key = database.key.as_deref().unwrap_or("unknown");
        if database.notion_url.starts_with(TODO_PREFIX) {
            check.warn(
                format!("{} / {}", subject, db_key),
                format!("placeholder URL, will not export: {}", database.notion_url),
            );
        } else {
            check.ok(format!("{} / {}", subject, db_key), "URL configured");
        }
    }
}

/// `token` is the value of `NOTION_TOKEN`, passed in by the caller.
pub async fn preflight(config: &ExportConfig, bundle: Option<&str>, token: Option<&str>) -> BundleCheck {
    let mut check = BundleCheck::default();
    check_token(&mut check, token);

    if config.export_bundles.is_empty() {
        check.error("config", "no 'export_bundles' section");
    } else {
        let keys: Vec<&str> = match bundle {
            Some(key) => vec![key],
            None => config.export_bundles.keys().map(String::as_str).collect(),
        };
        for key in keys {
            match config.export_bundles.get(key) {
                Some(spec) => check_bundle_spec(&mut check, key, spec),
                None => check.error(format!("bundle {}", key), "not found in config"),
            }
        }
    }

    let output_root = &config.defaults.output_root;
    let storage = LocalStorage::new(output_root);
    let written = storage.write_file(WRITE_CHECK_FILE, b"test").await;
    match written {
        Ok(()) => {
            check.ok(output_root.as_str(), "output directory is writable");
            remove_write_check(&mut check, &storage).await;
        }
        Err(e) => check.error(output_root.as_str(), format!("cannot write: {}", e)),
    }

    check
}

fn data_rows(data: &[u8]) -> Result<u64> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut rows = 0u64;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(rows.saturating_sub(1))
}

pub async fn verify(config: &ExportConfig, bundle: &str) -> Result<BundleCheck> {
    let spec = config
        .export_bundles
        .get(bundle)
        .ok_or_else(|| AuditError::ValidationError {
            message: format!("Bundle '{}' not found in export config", bundle),
        })?;

    let storage = LocalStorage::new(Path::new(&config.defaults.output_root).join(bundle));
    let manifest_name = &config.defaults.manifest_filename;
    let mut check = BundleCheck::default();

    let manifest: Manifest = match storage.read_file(manifest_name).await {
        Ok(data) => match serde_json::from_slice(&data) {
            Ok(manifest) => {
                check.ok(manifest_name.as_str(), "manifest loaded");
                manifest
            }
            Err(e) => {
                check.error(manifest_name.as_str(), format!("invalid JSON: {}", e));
                return Ok(check);
            }
        },
        Err(e) => {
            check.error(manifest_name.as_str(), format!("manifest not readable: {}", e));
            return Ok(check);
        }
    };

    if manifest.items.is_empty() {
        check.error(manifest_name.as_str(), "no items in manifest");
    }
    for item in &manifest.items {
        let db_key = item.db_key.as_deref().unwrap_or("unknown");
        let rows = match storage.read_file(&item.output).await {
            Ok(data) => data_rows(&data),
            Err(e) => Err(e),
        };
        match rows {
            Ok(actual) if actual != item.row_count => check.warn(
                db_key,
                format!("row count mismatch: manifest={}, actual={}", item.row_count, actual),
            ),
            Ok(actual) => check.ok(db_key, format!("{} verified ({} rows)", item.output, actual)),
            Err(e) => check.error(db_key, format!("cannot read {}: {}", item.output, e)),
        }
    }

    let expected = spec.schema_version.as_deref().unwrap_or("1.0.0");
    match manifest.schema_version.as_deref() {
        None => check.error("schema_version", "missing from manifest"),
        Some(actual) if actual != expected => check.error(
            "schema_version",
            format!("mismatch: manifest={}, config={}", actual, expected),
        ),
        Some(actual) => check.ok("schema_version", actual),
    }

    match manifest.audit.chitty_id.as_deref() {
        Some(id) if !id.is_empty() => check.ok("audit.chitty_id", id),
        _ => check.warn("audit.chitty_id", "no ChittyID in audit trail"),
    }

    if let Some(exported_at) = &manifest.exported_at {
        match chrono::DateTime::parse_from_rfc3339(exported_at) {
            Ok(ts) => check.ok("exported_at", ts.to_rfc3339()),
            Err(e) => check.error("exported_at", format!("'{}' is not RFC 3339: {}", exported_at, e)),
        }
    }

    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOKEN: &str = "secret_abcdefghijklmnopqrstuvwxyz";

    fn export_config(root: &Path) -> ExportConfig {
        ExportConfig::from_yaml_str(&format!(
            r#"
defaults:
  output_root: "{}"
export_bundles:
  governance:
    name: Governance
    schema_version: "1.2.0"
    databases:
      - key: policies
        notion_url: https://notion.so/policies
      - key: minutes
        notion_url: "TODO: add url"
"#,
            root.display()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_passes_with_warning_for_placeholder() {
        let dir = TempDir::new().unwrap();
        let config = export_config(dir.path());
        let check = preflight(&config, None, Some(TOKEN)).await;
        assert!(check.passed(), "{:?}", check.findings);
        assert_eq!(check.count(FindingLevel::Warning), 1);
        assert!(!dir.path().join(WRITE_CHECK_FILE).exists());
    }

    #[tokio::test]
    async fn test_leftover_write_check_file_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path());
        let mut check = BundleCheck::default();

        remove_write_check(&mut check, &storage).await;
        assert!(check.passed());
        assert_eq!(check.count(FindingLevel::Warning), 1);
        assert!(check.findings[0].message.contains("could not remove"));

        storage.write_file(WRITE_CHECK_FILE, b"test").await.unwrap();
        let mut check = BundleCheck::default();
        remove_write_check(&mut check, &storage).await;
        assert!(check.findings.is_empty());
        assert!(!dir.path().join(WRITE_CHECK_FILE).exists());
    }

    #[tokio::test]
    async fn test_preflight_rejects_short_token_and_unknown_bundle() {
        let dir = TempDir::new().unwrap();
        let config = export_config(dir.path());
        let check = preflight(&config, Some("finance"), Some("short")).await;
        assert!(!check.passed());
        assert_eq!(check.count(FindingLevel::Error), 2);
    }

    #[tokio::test]
    async fn test_preflight_requires_export_bundles() {
        let dir = TempDir::new().unwrap();
        let config = ExportConfig::from_yaml_str(&format!(
            "defaults:\n  output_root: \"{}\"\n",
            dir.path().display()
        ))
        .unwrap();
        let check = preflight(&config, None, Some(TOKEN)).await;
        assert!(check.findings.iter().any(|f| f.subject == "config"));
    }

    fn write_bundle(root: &Path, manifest: &str, csv: &str) {
        let pkg = root.join("governance");
        std::fs::create_dir_all(&pkg).unwrap();
        std::fs::write(pkg.join("manifest.json"), manifest).unwrap();
        std::fs::write(pkg.join("policies.csv"), csv).unwrap();
    }

    #[tokio::test]
    async fn test_verify_good_bundle() {
        let dir = TempDir::new().unwrap();
        write_bundle(
            dir.path(),
            r#"{"schema_version": "1.2.0", "exported_at": "2025-01-02T03:04:05Z",
                "audit": {"chitty_id": "CHITTY-1"},
                "items": [{"db_key": "policies", "output": "policies.csv", "row_count": 2}]}"#,
            "id,title\n1,a\n2,b\n",
        );
        let check = verify(&export_config(dir.path()), "governance").await.unwrap();
        assert!(check.passed(), "{:?}", check.findings);
        assert_eq!(check.count(FindingLevel::Warning), 0);
    }

    #[tokio::test]
    async fn test_verify_flags_mismatches() {
        let dir = TempDir::new().unwrap();
        write_bundle(
            dir.path(),
            r#"{"schema_version": "1.0.0", "exported_at": "yesterday",
                "items": [{"db_key": "policies", "output": "policies.csv", "row_count": 5},
                          {"db_key": "minutes", "output": "minutes.csv", "row_count": 1}]}"#,
            "id,title\n1,a\n",
        );
        let check = verify(&export_config(dir.path()), "governance").await.unwrap();
        assert!(!check.passed());
        // row count and missing chitty_id
        assert_eq!(check.count(FindingLevel::Warning), 2);
        // missing csv, schema version and timestamp
        assert_eq!(check.count(FindingLevel::Error), 3);
    }

    #[tokio::test]
    async fn test_verify_unknown_bundle_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(verify(&export_config(dir.path()), "finance").await.is_err());
    }
}
