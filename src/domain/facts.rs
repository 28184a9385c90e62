use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WORKFLOW_DIR: &str = ".github/workflows/";

/// Snapshot of a repository's observable state, supplied by whoever gathers it.
///
/// `files` maps repository-relative paths to their contents; presence of a key is
/// presence of the file. An empty string is a file whose contents were not fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoFactSheet {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub branch_protection: Option<BranchProtection>,
    #[serde(default)]
    pub package_manifest: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchProtection {
    pub branch: String,
    #[serde(default)]
    pub required_reviews: u32,
    #[serde(default)]
    pub allow_force_pushes: bool,
}

impl RepoFactSheet {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            ..Default::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    pub fn with_branch_protection(mut self, required_reviews: u32, allow_force_pushes: bool) -> Self {
        self.branch_protection = Some(BranchProtection {
            branch: "main".to_string(),
            required_reviews,
            allow_force_pushes,
        });
        self
    }

    pub fn with_package_manifest(mut self, manifest: serde_json::Value) -> Self {
        self.package_manifest = Some(manifest);
        self
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn workflows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(|(path, _)| path.starts_with(WORKFLOW_DIR))
            .map(|(path, contents)| (path.as_str(), contents.as_str()))
    }

    /// Explicit manifest if supplied, otherwise `package.json` parsed from `files`.
    pub fn manifest(&self) -> Option<serde_json::Value> {
        if let Some(manifest) = &self.package_manifest {
            return Some(manifest.clone());
        }
        self.file("package.json")
            .and_then(|contents| serde_json::from_str(contents).ok())
    }
}
