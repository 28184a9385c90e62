use crate::domain::model::DimensionKind;
use serde::Serialize;

/// One entry of the dimension catalog. Evaluation iterates these in order, so a
/// new dimension is a new entry plus its check, not a change to control flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionSpec {
    pub kind: DimensionKind,
    pub title: &'static str,
    /// Backed by a live network probe; honours `--skip-runtime`.
    pub requires_probe: bool,
    /// Only meaningful when the repository declares a production domain.
    pub requires_domain: bool,
    pub remediation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionCatalog {
    pub version: &'static str,
    pub entries: Vec<DimensionSpec>,
}

impl DimensionCatalog {
    pub const VERSION: &'static str = "2025.1";

    pub fn builtin() -> Self {
        Self {
            version: Self::VERSION,
            entries: vec![
                DimensionSpec {
                    kind: DimensionKind::Connect,
                    title: "Connect integration",
                    requires_probe: false,
                    requires_domain: false,
                    remediation: "Add a valid .chittyconnect.yml and a scheduled .github/workflows/chittyconnect-sync.yml",
                },
                DimensionSpec {
                    kind: DimensionKind::Monitoring,
                    title: "Monitoring",
                    requires_probe: false,
                    requires_domain: false,
                    remediation: "Add @chittyos/chittybeacon to package.json dependencies or commit a .chittybeacon.json marker",
                },
                DimensionSpec {
                    kind: DimensionKind::Canon,
                    title: "Canon compliance",
                    requires_probe: false,
                    requires_domain: false,
                    remediation: "Commit CHARTER.md, CHITTY.md and CODEOWNERS; protect the default branch with required reviews and no force pushes",
                },
                DimensionSpec {
                    kind: DimensionKind::ServiceRegistration,
                    title: "Service registration",
                    requires_probe: true,
                    requires_domain: false,
                    remediation: "Add a registry heartbeat step to the deploy workflow and redeploy so the service registers",
                },
                DimensionSpec {
                    kind: DimensionKind::RouteRegistration,
                    title: "Route registration",
                    requires_probe: true,
                    requires_domain: true,
                    remediation: "Register the production domain with the routing service",
                },
                DimensionSpec {
                    kind: DimensionKind::TrustChain,
                    title: "Trust chain",
                    requires_probe: false,
                    requires_domain: false,
                    remediation: "Declare every required credential under onboarding.provisions and the expected onboarding.auth_provider in .chittyconnect.yml",
                },
                DimensionSpec {
                    kind: DimensionKind::HealthEndpoint,
                    title: "Health endpoint",
                    requires_probe: true,
                    requires_domain: true,
                    remediation: "Serve GET /health on the production domain returning {\"status\": \"ok\"}",
                },
            ],
        }
    }

    pub fn get(&self, kind: DimensionKind) -> Option<&DimensionSpec> {
        self.entries.iter().find(|spec| spec.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DimensionKind> + '_ {
        self.entries.iter().map(|spec| spec.kind)
    }
}

impl Default for DimensionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
