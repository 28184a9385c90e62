use crate::core::catalog::{DimensionCatalog, DimensionSpec};
use crate::core::dimensions::{self, EvaluationContext};
use crate::domain::ecosystem::EcosystemConfig;
use crate::domain::facts::RepoFactSheet;
use crate::domain::model::{
    Applicability, ComplianceReport, DimensionKind, DimensionResult, OverallVerdict, Repository,
    ServiceType, Verdict,
};
use crate::domain::ports::ProbeOutcome;
use crate::utils::error::{AuditError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Service type × dimension → applicability. Every combination is defined;
/// construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileMatrix {
    version: String,
    entries: BTreeMap<(ServiceType, DimensionKind), Applicability>,
}

impl ProfileMatrix {
    pub const VERSION: &'static str = "2025.1";

    pub fn builtin() -> Self {
        use Applicability::{NotApplicable as NA, Optional as O, Required as R};
        use ServiceType::*;

        // Columns follow DimensionKind::ALL: connect, monitoring, canon,
        // service-registration, route-registration, trust-chain, health-endpoint.
        let rows: [(ServiceType, [Applicability; 7]); 5] = [
            (CloudflareWorker, [R, R, R, R, R, R, R]),
            (NpmPackage, [R, O, R, NA, NA, R, NA]),
            (Tool, [R, O, R, O, O, O, NA]),
            (Documentation, [NA, NA, R, NA, NA, NA, NA]),
            (ClientSdk, [R, NA, R, NA, NA, R, NA]),
        ];

        let entries = rows
            .into_iter()
            .flat_map(|(service, row)| {
                DimensionKind::ALL
                    .into_iter()
                    .zip(row)
                    .map(move |(kind, applicability)| ((service, kind), applicability))
            })
            .collect();

        Self {
            version: Self::VERSION.to_string(),
            entries,
        }
    }

    pub fn from_entries(
        version: impl Into<String>,
        entries: impl IntoIterator<Item = ((ServiceType, DimensionKind), Applicability)>,
    ) -> Result<Self> {
        let matrix = Self {
            version: version.into(),
            entries: entries.into_iter().collect(),
        };
        matrix.ensure_complete()?;
        Ok(matrix)
    }

    /// Replaces whole rows. A row that leaves any dimension undefined is
    /// rejected rather than filled from the previous matrix.
    pub fn with_overrides(
        &self,
        version: impl Into<String>,
        overrides: &BTreeMap<ServiceType, BTreeMap<DimensionKind, Applicability>>,
    ) -> Result<Self> {
        let mut missing = Vec::new();
        let mut entries = self.entries.clone();
        for (service, row) in overrides {
            for kind in DimensionKind::ALL {
                match row.get(&kind) {
                    Some(applicability) => {
                        entries.insert((*service, kind), *applicability);
                    }
                    None => missing.push(format!("{}.{}", service, kind)),
                }
            }
        }
        if !missing.is_empty() {
            return Err(AuditError::IncompleteProfileMatrix { missing });
        }
        Self::from_entries(version, entries)
    }

    fn ensure_complete(&self) -> Result<()> {
        let missing: Vec<String> = ServiceType::ALL
            .iter()
            .flat_map(|service| {
                DimensionKind::ALL
                    .iter()
                    .filter(move |kind| !self.entries.contains_key(&(*service, **kind)))
                    .map(move |kind| format!("{}.{}", service, kind))
            })
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AuditError::IncompleteProfileMatrix { missing })
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn applicability(&self, service: ServiceType, kind: DimensionKind) -> Applicability {
        self.entries
            .get(&(service, kind))
            .copied()
            .unwrap_or(Applicability::NotApplicable)
    }

    pub fn dimensions_with(
        &self,
        service: ServiceType,
        applicability: Applicability,
    ) -> Vec<DimensionKind> {
        DimensionKind::ALL
            .into_iter()
            .filter(|kind| self.applicability(service, *kind) == applicability)
            .collect()
    }
}

impl Default for ProfileMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The dimensions one repository is held to, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPlan {
    pub service_type: ServiceType,
    pub dimensions: Vec<(DimensionKind, Applicability)>,
}

#[derive(Debug, Clone)]
pub struct ProfileResolver {
    catalog: Arc<DimensionCatalog>,
    matrix: Arc<ProfileMatrix>,
    ecosystem: Arc<EcosystemConfig>,
}

impl ProfileResolver {
    pub fn new(catalog: DimensionCatalog, matrix: ProfileMatrix, ecosystem: EcosystemConfig) -> Self {
        Self {
            catalog: Arc::new(catalog),
            matrix: Arc::new(matrix),
            ecosystem: Arc::new(ecosystem),
        }
    }

    pub fn catalog(&self) -> &DimensionCatalog {
        &self.catalog
    }

    pub fn matrix(&self) -> &ProfileMatrix {
        &self.matrix
    }

    pub fn ecosystem(&self) -> &EcosystemConfig {
        &self.ecosystem
    }

    pub fn service_type(&self, repository: &Repository) -> Result<ServiceType> {
        repository
            .service_type
            .as_deref()
            .and_then(|declared| declared.parse::<ServiceType>().ok())
            .ok_or_else(|| AuditError::UnknownServiceType {
                repository: repository.id.clone(),
                declared: repository.service_type.clone(),
            })
    }

    fn effective(&self, spec: &DimensionSpec, base: Applicability, repository: &Repository) -> Applicability {
        if spec.requires_domain && !repository.has_domain() {
            Applicability::NotApplicable
        } else {
            base
        }
    }

    pub fn plan(&self, repository: &Repository) -> Result<AuditPlan> {
        let service_type = self.service_type(repository)?;
        let dimensions = self
            .catalog
            .entries
            .iter()
            .map(|spec| {
                let base = self.matrix.applicability(service_type, spec.kind);
                (spec.kind, self.effective(spec, base, repository))
            })
            .collect();
        Ok(AuditPlan {
            service_type,
            dimensions,
        })
    }

    /// Probe URLs for the plan's applicable, probe-backed dimensions.
    pub fn probe_requests(
        &self,
        repository: &Repository,
        facts: &RepoFactSheet,
        plan: &AuditPlan,
    ) -> Vec<(DimensionKind, String)> {
        plan.dimensions
            .iter()
            .filter(|(_, applicability)| *applicability != Applicability::NotApplicable)
            .filter(|(kind, _)| self.catalog.get(*kind).is_some_and(|spec| spec.requires_probe))
            .filter_map(|(kind, _)| {
                dimensions::probe_url(*kind, repository, facts, &self.ecosystem)
                    .map(|url| (*kind, url))
            })
            .collect()
    }

    pub fn resolve(
        &self,
        repository: &Repository,
        facts: &RepoFactSheet,
        probes: &BTreeMap<DimensionKind, ProbeOutcome>,
    ) -> Result<ComplianceReport> {
        let plan = self.plan(repository)?;
        let ctx = EvaluationContext {
            repository,
            facts,
            ecosystem: &self.ecosystem,
            probes,
        };

        let results = plan
            .dimensions
            .iter()
            .filter_map(|(kind, applicability)| {
                self.catalog
                    .get(*kind)
                    .map(|spec| dimensions::evaluate_dimension(spec, *applicability, &ctx))
            })
            .collect();

        Ok(self.report(repository, plan.service_type, results))
    }

    /// Report for a repository whose facts could not be gathered: every
    /// applicable dimension is `Unknown`.
    pub fn unavailable(&self, repository: &Repository, reason: &str) -> Result<ComplianceReport> {
        let plan = self.plan(repository)?;
        let results = plan
            .dimensions
            .iter()
            .map(|(kind, applicability)| match applicability {
                Applicability::NotApplicable => DimensionResult::not_applicable(*kind),
                _ => DimensionResult {
                    dimension: *kind,
                    applicability: *applicability,
                    verdict: Verdict::Unknown,
                    evidence: vec![format!("fact sheet unavailable: {}", reason)],
                    remediation: "Regenerate the repository fact sheet and rerun the audit"
                        .to_string(),
                },
            })
            .collect();
        Ok(self.report(repository, plan.service_type, results))
    }

    fn report(
        &self,
        repository: &Repository,
        service_type: ServiceType,
        results: Vec<DimensionResult>,
    ) -> ComplianceReport {
        let overall = OverallVerdict::fold(&results);
        ComplianceReport {
            repository: repository.id.clone(),
            service_type,
            tier: repository.tier,
            catalog_version: self.catalog.version.to_string(),
            matrix_version: self.matrix.version().to_string(),
            results,
            overall,
        }
    }
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::new(
            DimensionCatalog::builtin(),
            ProfileMatrix::builtin(),
            EcosystemConfig::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_matrix_is_complete() {
        let matrix = ProfileMatrix::builtin();
        assert!(matrix.ensure_complete().is_ok());
        assert_eq!(matrix.entries.len(), 35);
    }

    #[test]
    fn test_required_dimensions_per_service_type() {
        use DimensionKind::*;
        let matrix = ProfileMatrix::builtin();
        assert_eq!(
            matrix.dimensions_with(ServiceType::CloudflareWorker, Applicability::Required),
            DimensionKind::ALL.to_vec()
        );
        assert_eq!(
            matrix.dimensions_with(ServiceType::NpmPackage, Applicability::Required),
            vec![Connect, Canon, TrustChain]
        );
        assert_eq!(
            matrix.dimensions_with(ServiceType::Tool, Applicability::Required),
            vec![Connect, Canon]
        );
        assert_eq!(
            matrix.dimensions_with(ServiceType::Documentation, Applicability::Required),
            vec![Canon]
        );
        assert_eq!(
            matrix.dimensions_with(ServiceType::ClientSdk, Applicability::Required),
            vec![Connect, Canon, TrustChain]
        );
    }

    #[test]
    fn test_incomplete_matrix_is_rejected() {
        let entries = vec![(
            (ServiceType::Tool, DimensionKind::Canon),
            Applicability::Required,
        )];
        let err = ProfileMatrix::from_entries("partial", entries).unwrap_err();
        match err {
            AuditError::IncompleteProfileMatrix { missing } => assert_eq!(missing.len(), 34),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_override_row_must_be_complete() {
        let mut row = BTreeMap::new();
        row.insert(DimensionKind::Connect, Applicability::Optional);
        let mut overrides = BTreeMap::new();
        overrides.insert(ServiceType::Documentation, row);

        let err = ProfileMatrix::builtin()
            .with_overrides("custom", &overrides)
            .unwrap_err();
        assert!(matches!(err, AuditError::IncompleteProfileMatrix { .. }));

        let full_row: BTreeMap<_, _> = DimensionKind::ALL
            .into_iter()
            .map(|k| (k, Applicability::Optional))
            .collect();
        overrides.insert(ServiceType::Documentation, full_row);
        let matrix = ProfileMatrix::builtin()
            .with_overrides("custom", &overrides)
            .unwrap();
        assert_eq!(matrix.version(), "custom");
        assert_eq!(
            matrix.applicability(ServiceType::Documentation, DimensionKind::Canon),
            Applicability::Optional
        );
    }

    #[test]
    fn test_unknown_service_type_fails_fast() {
        let resolver = ProfileResolver::default();
        let repo = Repository::new("acme/widget", "lambda");
        assert!(matches!(
            resolver.plan(&repo),
            Err(AuditError::UnknownServiceType { .. })
        ));

        let undeclared = Repository {
            service_type: None,
            ..repo
        };
        assert!(matches!(
            resolver.resolve(&undeclared, &RepoFactSheet::default(), &BTreeMap::new()),
            Err(AuditError::UnknownServiceType { declared: None, .. })
        ));
    }

    #[test]
    fn test_domain_conditional_dimensions() {
        let resolver = ProfileResolver::default();
        let no_domain = Repository::new("chittyos/worker", "cloudflare-worker");
        let plan = resolver.plan(&no_domain).unwrap();
        let applicability: BTreeMap<_, _> = plan.dimensions.into_iter().collect();
        assert_eq!(
            applicability[&DimensionKind::RouteRegistration],
            Applicability::NotApplicable
        );
        assert_eq!(
            applicability[&DimensionKind::HealthEndpoint],
            Applicability::NotApplicable
        );

        let with_domain = no_domain.with_domain("worker.chitty.cc");
        let plan = resolver.plan(&with_domain).unwrap();
        assert!(plan
            .dimensions
            .iter()
            .all(|(_, a)| *a == Applicability::Required));
    }

    #[test]
    fn test_unavailable_report_is_indeterminate() {
        let resolver = ProfileResolver::default();
        let repo = Repository::new("chittyos/docs", "documentation");
        let report = resolver.unavailable(&repo, "connection refused").unwrap();
        assert_eq!(report.overall, OverallVerdict::Indeterminate);
        assert_eq!(report.results.len(), 7);
        assert_eq!(report.verdict_of(DimensionKind::Canon), Some(Verdict::Unknown));
        assert_eq!(
            report.verdict_of(DimensionKind::Connect),
            Some(Verdict::NotApplicable)
        );
    }
}
