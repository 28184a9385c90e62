use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    CloudflareWorker,
    NpmPackage,
    Tool,
    Documentation,
    ClientSdk,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::CloudflareWorker,
        ServiceType::NpmPackage,
        ServiceType::Tool,
        ServiceType::Documentation,
        ServiceType::ClientSdk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::CloudflareWorker => "cloudflare-worker",
            ServiceType::NpmPackage => "npm-package",
            ServiceType::Tool => "tool",
            ServiceType::Documentation => "documentation",
            ServiceType::ClientSdk => "client-sdk",
        }
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ServiceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| format!("unrecognized service type '{}'", s))
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository as declared in the ecosystem configuration.
///
/// `service_type` stays a raw string: profile resolution is where an absent or
/// unrecognized declaration turns into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub service_type: Option<String>,
    #[serde(default)]
    pub tier: u8,
    pub domain: Option<String>,
}

impl Repository {
    pub fn new(id: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            service_type: Some(service_type.into()),
            tier: 0,
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_tier(mut self, tier: u8) -> Self {
        self.tier = tier;
        self
    }

    /// Name part of `org/name`, used as the registry service name.
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }

    pub fn has_domain(&self) -> bool {
        self.domain.as_deref().is_some_and(|d| !d.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DimensionKind {
    Connect,
    Monitoring,
    Canon,
    ServiceRegistration,
    RouteRegistration,
    TrustChain,
    HealthEndpoint,
}

impl DimensionKind {
    pub const ALL: [DimensionKind; 7] = [
        DimensionKind::Connect,
        DimensionKind::Monitoring,
        DimensionKind::Canon,
        DimensionKind::ServiceRegistration,
        DimensionKind::RouteRegistration,
        DimensionKind::TrustChain,
        DimensionKind::HealthEndpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DimensionKind::Connect => "connect",
            DimensionKind::Monitoring => "monitoring",
            DimensionKind::Canon => "canon",
            DimensionKind::ServiceRegistration => "service-registration",
            DimensionKind::RouteRegistration => "route-registration",
            DimensionKind::TrustChain => "trust-chain",
            DimensionKind::HealthEndpoint => "health-endpoint",
        }
    }
}

impl FromStr for DimensionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().replace('_', "-");
        DimensionKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unrecognized dimension '{}'", s))
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Applicability {
    Required,
    Optional,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
    NotApplicable,
    /// The check could not complete; distinct from a proven failure.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: DimensionKind,
    pub applicability: Applicability,
    pub verdict: Verdict,
    pub evidence: Vec<String>,
    pub remediation: String,
}

impl DimensionResult {
    pub fn not_applicable(dimension: DimensionKind) -> Self {
        Self {
            dimension,
            applicability: Applicability::NotApplicable,
            verdict: Verdict::NotApplicable,
            evidence: Vec::new(),
            remediation: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverallVerdict {
    Compliant,
    Indeterminate,
    NonCompliant,
}

impl OverallVerdict {
    /// Folds results: any required `Fail` wins, then any required `Unknown`.
    pub fn fold(results: &[DimensionResult]) -> Self {
        let required = results
            .iter()
            .filter(|r| r.applicability == Applicability::Required);

        let mut overall = OverallVerdict::Compliant;
        for result in required {
            match result.verdict {
                Verdict::Fail => return OverallVerdict::NonCompliant,
                Verdict::Unknown => overall = OverallVerdict::Indeterminate,
                Verdict::Pass | Verdict::NotApplicable => {}
            }
        }
        overall
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            OverallVerdict::Compliant => 0,
            OverallVerdict::NonCompliant => 1,
            OverallVerdict::Indeterminate => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub repository: String,
    pub service_type: ServiceType,
    pub tier: u8,
    pub catalog_version: String,
    pub matrix_version: String,
    pub results: Vec<DimensionResult>,
    pub overall: OverallVerdict,
}

impl ComplianceReport {
    pub fn result(&self, dimension: DimensionKind) -> Option<&DimensionResult> {
        self.results.iter().find(|r| r.dimension == dimension)
    }

    pub fn verdict_of(&self, dimension: DimensionKind) -> Option<Verdict> {
        self.result(dimension).map(|r| r.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(applicability: Applicability, verdict: Verdict) -> DimensionResult {
        DimensionResult {
            dimension: DimensionKind::Canon,
            applicability,
            verdict,
            evidence: vec![],
            remediation: String::new(),
        }
    }

    #[test]
    fn test_service_type_parsing() {
        assert_eq!(
            "cloudflare-worker".parse::<ServiceType>().unwrap(),
            ServiceType::CloudflareWorker
        );
        assert!("lambda".parse::<ServiceType>().is_err());
        for t in ServiceType::ALL {
            assert_eq!(t.as_str().parse::<ServiceType>().unwrap(), t);
        }
    }

    #[test]
    fn test_fold_fail_beats_unknown() {
        let results = vec![
            result(Applicability::Required, Verdict::Unknown),
            result(Applicability::Required, Verdict::Fail),
        ];
        assert_eq!(OverallVerdict::fold(&results), OverallVerdict::NonCompliant);
    }

    #[test]
    fn test_fold_unknown_is_indeterminate() {
        let results = vec![
            result(Applicability::Required, Verdict::Pass),
            result(Applicability::Required, Verdict::Unknown),
        ];
        assert_eq!(OverallVerdict::fold(&results), OverallVerdict::Indeterminate);
    }

    #[test]
    fn test_fold_ignores_optional_failures() {
        let results = vec![
            result(Applicability::Required, Verdict::Pass),
            result(Applicability::Optional, Verdict::Fail),
            result(Applicability::NotApplicable, Verdict::NotApplicable),
        ];
        assert_eq!(OverallVerdict::fold(&results), OverallVerdict::Compliant);
    }

    #[test]
    fn test_repository_name() {
        let repo = Repository::new("chittyos/chittyid", "cloudflare-worker");
        assert_eq!(repo.name(), "chittyid");
        assert!(!repo.has_domain());
        assert!(repo.with_domain("id.chitty.cc").has_domain());
    }
}
