use crate::domain::facts::RepoFactSheet;
use crate::domain::model::Repository;
use crate::domain::ports::{FactSheetProvider, Storage};
use crate::utils::error::{AuditError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// `org/name` becomes `org__name.json`.
pub fn fact_sheet_file_name(repository_id: &str) -> String {
    format!("{}.json", repository_id.replace('/', "__"))
}

/// Reads pre-gathered fact sheets, one JSON document per repository.
#[derive(Debug, Clone)]
pub struct FileFactSheetProvider<S: Storage> {
    storage: S,
}

impl<S: Storage> FileFactSheetProvider<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl<S: Storage> FactSheetProvider for FileFactSheetProvider<S> {
    async fn fetch(&self, repository: &Repository) -> Result<RepoFactSheet> {
        let file_name = fact_sheet_file_name(&repository.id);
        let data = self
            .storage
            .read_file(&file_name)
            .await
            .map_err(|e| AuditError::FactSheetUnavailable {
                repository: repository.id.clone(),
                reason: format!("cannot read {}: {}", file_name, e),
            })?;

        let mut facts: RepoFactSheet =
            serde_json::from_slice(&data).map_err(|e| AuditError::FactSheetUnavailable {
                repository: repository.id.clone(),
                reason: format!("{} is not a valid fact sheet: {}", file_name, e),
            })?;
        if facts.repository.is_empty() {
            facts.repository = repository.id.clone();
        }
        tracing::debug!(
            "📄 Loaded fact sheet for {} ({} files)",
            repository.id,
            facts.files.len()
        );
        Ok(facts)
    }
}

/// Fact sheets held in memory, keyed by repository id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFactSheetProvider {
    sheets: HashMap<String, RepoFactSheet>,
}

impl InMemoryFactSheetProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, facts: RepoFactSheet) -> Self {
        self.insert(facts);
        self
    }

    pub fn insert(&mut self, facts: RepoFactSheet) {
        self.sheets.insert(facts.repository.clone(), facts);
    }
}

#[async_trait]
impl FactSheetProvider for InMemoryFactSheetProvider {
    async fn fetch(&self, repository: &Repository) -> Result<RepoFactSheet> {
        self.sheets
            .get(&repository.id)
            .cloned()
            .ok_or_else(|| AuditError::FactSheetUnavailable {
                repository: repository.id.clone(),
                reason: "no fact sheet registered".to_string(),
            })
    }
}
