use crate::core::profile::ProfileResolver;
use crate::domain::model::{ComplianceReport, DimensionKind, Repository};
use crate::domain::ports::{FactSheetProvider, ProbeOutcome, RuntimeProbe};
use crate::utils::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_DEADLINE_SECONDS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditSettings {
    /// Shared by fact fetches and probes.
    pub concurrency: usize,
    pub probe_timeout: Duration,
    /// Whole-run budget; probes still in flight when it passes are `TimedOut`.
    pub deadline: Duration,
    pub skip_runtime: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECONDS),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECONDS),
            skip_runtime: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditEntry {
    Audited(ComplianceReport),
    /// The repository could not be audited at all, e.g. an unknown service type.
    Failed { repository: String, error: String },
}

impl AuditEntry {
    pub fn repository(&self) -> &str {
        match self {
            AuditEntry::Audited(report) => &report.repository,
            AuditEntry::Failed { repository, .. } => repository,
        }
    }

    pub fn report(&self) -> Option<&ComplianceReport> {
        match self {
            AuditEntry::Audited(report) => Some(report),
            AuditEntry::Failed { .. } => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            AuditEntry::Audited(report) => report.overall.exit_code(),
            AuditEntry::Failed { .. } => 3,
        }
    }

    fn from_result(repository: &Repository, result: Result<ComplianceReport>) -> Self {
        match result {
            Ok(report) => AuditEntry::Audited(report),
            Err(e) => {
                tracing::error!("❌ {}: {}", repository.id, e);
                AuditEntry::Failed {
                    repository: repository.id.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRun {
    pub catalog_version: String,
    pub matrix_version: String,
    pub skip_runtime: bool,
    /// In the order the repositories were given.
    pub entries: Vec<AuditEntry>,
}

impl AuditRun {
    /// Worst outcome across entries: 3 beats 2 beats 1 beats 0.
    pub fn exit_code(&self) -> i32 {
        self.entries
            .iter()
            .map(AuditEntry::exit_code)
            .max()
            .unwrap_or(0)
    }

    pub fn entry(&self, repository: &str) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| e.repository() == repository)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs audits over many repositories. Cloning is cheap; everything is shared.
#[derive(Clone)]
pub struct Auditor {
    resolver: Arc<ProfileResolver>,
    facts: Arc<dyn FactSheetProvider>,
    probe: Arc<dyn RuntimeProbe>,
    settings: AuditSettings,
}

impl Auditor {
    pub fn new(
        resolver: ProfileResolver,
        facts: Arc<dyn FactSheetProvider>,
        probe: Arc<dyn RuntimeProbe>,
        settings: AuditSettings,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            facts,
            probe,
            settings,
        }
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    pub async fn audit_all(&self, repositories: &[Repository]) -> AuditRun {
        tracing::info!(
            "🔍 Auditing {} repositories (concurrency {}, skip_runtime {})",
            repositories.len(),
            self.settings.concurrency,
            self.settings.skip_runtime
        );

        let deadline = Instant::now() + self.settings.deadline;
        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));

        let handles: Vec<_> = repositories
            .iter()
            .cloned()
            .map(|repository| {
                let auditor = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move { auditor.audit_one(&repository, semaphore, deadline).await })
            })
            .collect();

        let mut entries = Vec::with_capacity(handles.len());
        for (repository, handle) in repositories.iter().zip(handles) {
            let entry = handle.await.unwrap_or_else(|e| AuditEntry::Failed {
                repository: repository.id.clone(),
                error: format!("audit task failed: {}", e),
            });
            entries.push(entry);
        }

        let run = AuditRun {
            catalog_version: self.resolver.catalog().version.to_string(),
            matrix_version: self.resolver.matrix().version().to_string(),
            skip_runtime: self.settings.skip_runtime,
            entries,
        };
        tracing::info!("✅ Audit finished, exit code {}", run.exit_code());
        run
    }

    pub async fn audit_one(
        &self,
        repository: &Repository,
        semaphore: Arc<Semaphore>,
        deadline: Instant,
    ) -> AuditEntry {
        let plan = match self.resolver.plan(repository) {
            Ok(plan) => plan,
            Err(e) => return AuditEntry::from_result(repository, Err(e)),
        };
        tracing::debug!("📋 {}: profile {}", repository.id, plan.service_type);

        let fetched = {
            let _permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            tokio::time::timeout_at(deadline, self.facts.fetch(repository)).await
        };
        let facts = match fetched {
            Ok(Ok(facts)) => facts,
            Ok(Err(e)) => {
                tracing::warn!("⚠️ {}: fact sheet unavailable: {}", repository.id, e);
                let reason = e.to_string();
                return AuditEntry::from_result(repository, self.resolver.unavailable(repository, &reason));
            }
            Err(_) => {
                tracing::warn!("⚠️ {}: deadline passed while fetching facts", repository.id);
                return AuditEntry::from_result(
                    repository,
                    self.resolver.unavailable(repository, "audit deadline exceeded"),
                );
            }
        };

        let requests = self.resolver.probe_requests(repository, &facts, &plan);
        let probes = if self.settings.skip_runtime {
            requests
                .into_iter()
                .map(|(kind, _)| (kind, ProbeOutcome::Skipped))
                .collect()
        } else {
            self.run_probes(requests, &semaphore, deadline).await
        };

        let entry = AuditEntry::from_result(repository, self.resolver.resolve(repository, &facts, &probes));
        if let AuditEntry::Audited(report) = &entry {
            tracing::info!("📊 {}: {:?}", repository.id, report.overall);
        }
        entry
    }

    async fn run_probes(
        &self,
        requests: Vec<(DimensionKind, String)>,
        semaphore: &Arc<Semaphore>,
        deadline: Instant,
    ) -> BTreeMap<DimensionKind, ProbeOutcome> {
        let timeout = self.settings.probe_timeout;
        let handles: Vec<_> = requests
            .into_iter()
            .map(|(kind, url)| {
                let probe = Arc::clone(&self.probe);
                let semaphore = Arc::clone(semaphore);
                let handle = tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.ok();
                    tracing::debug!("📡 Probing {} for {}", url, kind);
                    tokio::time::timeout(timeout, probe.probe(&url, timeout))
                        .await
                        .unwrap_or(ProbeOutcome::TimedOut)
                });
                (kind, handle)
            })
            .collect();

        let mut outcomes = BTreeMap::new();
        for (kind, mut handle) in handles {
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => ProbeOutcome::Unreachable {
                    reason: format!("probe task failed: {}", e),
                },
                Err(_) => {
                    handle.abort();
                    ProbeOutcome::TimedOut
                }
            };
            outcomes.insert(kind, outcome);
        }
        outcomes
    }
}
