//! Per-dimension compliance checks.
//!
//! Every check is a pure function of the fact sheet, the ecosystem settings and
//! whatever probe outcomes the orchestrator already gathered. Checks never reach
//! the network themselves.

use crate::core::catalog::DimensionSpec;
use crate::domain::ecosystem::EcosystemConfig;
use crate::domain::facts::{RepoFactSheet, WORKFLOW_DIR};
use crate::domain::model::{Applicability, DimensionKind, DimensionResult, Repository, Verdict};
use crate::domain::ports::ProbeOutcome;
use std::collections::BTreeMap;

pub const CONNECT_CONFIG: &str = ".chittyconnect.yml";
pub const CONNECT_SYNC_WORKFLOW: &str = ".github/workflows/chittyconnect-sync.yml";
pub const HEARTBEAT_PACKAGE: &str = "@chittyos/chittybeacon";
pub const HEARTBEAT_MARKER_FILE: &str = ".chittybeacon.json";
pub const CANON_FILES: [&str; 2] = ["CHARTER.md", "CHITTY.md"];
pub const CODEOWNERS_LOCATIONS: [&str; 3] = ["CODEOWNERS", ".github/CODEOWNERS", "docs/CODEOWNERS"];

const UNKNOWN_REMEDIATION: &str =
    "Could not verify; rerun with runtime probes enabled once the endpoint is reachable";

pub struct EvaluationContext<'a> {
    pub repository: &'a Repository,
    pub facts: &'a RepoFactSheet,
    pub ecosystem: &'a EcosystemConfig,
    pub probes: &'a BTreeMap<DimensionKind, ProbeOutcome>,
}

struct CheckOutcome {
    verdict: Verdict,
    evidence: Vec<String>,
}

impl CheckOutcome {
    fn new(verdict: Verdict, evidence: Vec<String>) -> Self {
        Self { verdict, evidence }
    }
}

pub fn evaluate_dimension(
    spec: &DimensionSpec,
    applicability: Applicability,
    ctx: &EvaluationContext<'_>,
) -> DimensionResult {
    if applicability == Applicability::NotApplicable {
        return DimensionResult::not_applicable(spec.kind);
    }

    let outcome = match spec.kind {
        DimensionKind::Connect => check_connect(ctx.facts),
        DimensionKind::Monitoring => check_monitoring(ctx.facts),
        DimensionKind::Canon => check_canon(ctx.facts),
        DimensionKind::ServiceRegistration => check_service_registration(ctx),
        DimensionKind::RouteRegistration => check_route_registration(ctx),
        DimensionKind::TrustChain => check_trust_chain(ctx.facts, ctx.ecosystem),
        DimensionKind::HealthEndpoint => check_health(ctx),
    };

    let remediation = match outcome.verdict {
        Verdict::Fail => spec.remediation.to_string(),
        Verdict::Unknown => UNKNOWN_REMEDIATION.to_string(),
        Verdict::Pass | Verdict::NotApplicable => String::new(),
    };

    DimensionResult {
        dimension: spec.kind,
        applicability,
        verdict: outcome.verdict,
        evidence: outcome.evidence,
        remediation,
    }
}

/// URL a probe-backed dimension needs checked, or `None` when the dimension has
/// no probe or its static preconditions already fail.
pub fn probe_url(
    kind: DimensionKind,
    repository: &Repository,
    facts: &RepoFactSheet,
    ecosystem: &EcosystemConfig,
) -> Option<String> {
    let domain = repository.domain.as_deref().filter(|_| repository.has_domain());
    match kind {
        DimensionKind::ServiceRegistration => heartbeat_step_present(facts, ecosystem)
            .ok()
            .map(|_| ecosystem.service_lookup_url(repository.name())),
        DimensionKind::RouteRegistration => domain.map(|d| ecosystem.route_lookup_url(d)),
        DimensionKind::HealthEndpoint => domain.map(|d| ecosystem.health_url(d)),
        _ => None,
    }
}

fn parse_yaml_mapping(contents: &str) -> Result<serde_yaml::Value, String> {
    match serde_yaml::from_str::<serde_yaml::Value>(contents) {
        Ok(value @ serde_yaml::Value::Mapping(_)) => Ok(value),
        Ok(_) => Err("document is not a YAML mapping".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn check_connect(facts: &RepoFactSheet) -> CheckOutcome {
    let mut evidence = Vec::new();
    let mut ok = true;

    match facts.file(CONNECT_CONFIG) {
        None => {
            ok = false;
            evidence.push(format!("missing {}", CONNECT_CONFIG));
        }
        Some(contents) => match parse_yaml_mapping(contents) {
            Ok(_) => evidence.push(format!("found well-formed {}", CONNECT_CONFIG)),
            Err(e) => {
                ok = false;
                evidence.push(format!("malformed {}: {}", CONNECT_CONFIG, e));
            }
        },
    }

    match facts.file(CONNECT_SYNC_WORKFLOW) {
        None => {
            ok = false;
            evidence.push(format!("missing {}", CONNECT_SYNC_WORKFLOW));
        }
        Some(contents) => {
            let scheduled = parse_yaml_mapping(contents)
                .ok()
                .and_then(|wf| wf.get("on").and_then(|on| on.get("schedule")).cloned())
                .and_then(|schedule| schedule.as_sequence().map(|s| !s.is_empty()))
                .unwrap_or(false);
            if scheduled {
                evidence.push(format!("{} runs on a schedule", CONNECT_SYNC_WORKFLOW));
            } else {
                ok = false;
                evidence.push(format!(
                    "{} does not declare an on.schedule trigger",
                    CONNECT_SYNC_WORKFLOW
                ));
            }
        }
    }

    CheckOutcome::new(if ok { Verdict::Pass } else { Verdict::Fail }, evidence)
}

fn check_monitoring(facts: &RepoFactSheet) -> CheckOutcome {
    let declared_in = facts.manifest().and_then(|manifest| {
        ["dependencies", "devDependencies"]
            .into_iter()
            .find(|section| manifest.get(*section).and_then(|deps| deps.get(HEARTBEAT_PACKAGE)).is_some())
    });

    if let Some(section) = declared_in {
        return CheckOutcome::new(
            Verdict::Pass,
            vec![format!("package.json {} includes {}", section, HEARTBEAT_PACKAGE)],
        );
    }
    if facts.has_file(HEARTBEAT_MARKER_FILE) {
        return CheckOutcome::new(
            Verdict::Pass,
            vec![format!("found heartbeat marker {}", HEARTBEAT_MARKER_FILE)],
        );
    }

    CheckOutcome::new(
        Verdict::Fail,
        vec![
            format!("no {} dependency in package.json", HEARTBEAT_PACKAGE),
            format!("missing {}", HEARTBEAT_MARKER_FILE),
        ],
    )
}

fn check_canon(facts: &RepoFactSheet) -> CheckOutcome {
    let mut evidence = Vec::new();
    let mut failed = false;

    for file in CANON_FILES {
        if facts.has_file(file) {
            evidence.push(format!("found {}", file));
        } else {
            failed = true;
            evidence.push(format!("missing {}", file));
        }
    }

    match CODEOWNERS_LOCATIONS.iter().find(|path| facts.has_file(path)) {
        Some(path) => evidence.push(format!("found {}", path)),
        None => {
            failed = true;
            evidence.push("missing CODEOWNERS".to_string());
        }
    }

    let protection_known = match &facts.branch_protection {
        None => {
            evidence.push("branch protection facts unavailable".to_string());
            false
        }
        Some(bp) => {
            if bp.required_reviews >= 1 {
                evidence.push(format!(
                    "{} requires {} review(s)",
                    bp.branch, bp.required_reviews
                ));
            } else {
                failed = true;
                evidence.push(format!("{} does not require reviews", bp.branch));
            }
            if bp.allow_force_pushes {
                failed = true;
                evidence.push(format!("{} allows force pushes", bp.branch));
            } else {
                evidence.push(format!("{} blocks force pushes", bp.branch));
            }
            true
        }
    };

    let verdict = if failed {
        Verdict::Fail
    } else if !protection_known {
        Verdict::Unknown
    } else {
        Verdict::Pass
    };
    CheckOutcome::new(verdict, evidence)
}

/// Path of the first deploy workflow carrying the heartbeat marker, or the
/// reason none qualifies.
fn heartbeat_step_present(
    facts: &RepoFactSheet,
    ecosystem: &EcosystemConfig,
) -> Result<String, String> {
    let deploy_workflows: Vec<(&str, &str)> = facts
        .workflows()
        .filter(|(path, _)| {
            path.trim_start_matches(WORKFLOW_DIR)
                .to_ascii_lowercase()
                .contains("deploy")
        })
        .collect();

    if deploy_workflows.is_empty() {
        return Err("no deploy workflow under .github/workflows/".to_string());
    }

    deploy_workflows
        .iter()
        .find(|(_, contents)| contents.contains(&ecosystem.registry_heartbeat_marker))
        .map(|(path, _)| path.to_string())
        .ok_or_else(|| {
            format!(
                "deploy workflow has no registry heartbeat step ({})",
                ecosystem.registry_heartbeat_marker
            )
        })
}

/// Registry and router answers: `{"registered": bool}`. Anything else is an
/// inconclusive probe.
fn registration_from_probe(probe: Option<&ProbeOutcome>, subject: &str) -> CheckOutcome {
    let Some(probe) = probe else {
        return CheckOutcome::new(Verdict::Unknown, vec!["runtime probe was not run".to_string()]);
    };

    match probe.json_object() {
        Some(body) => match body.get("registered").and_then(|v| v.as_bool()) {
            Some(true) => CheckOutcome::new(Verdict::Pass, vec![format!("{} is registered", subject)]),
            Some(false) => CheckOutcome::new(
                Verdict::Fail,
                vec![format!("{} is not registered", subject)],
            ),
            None => CheckOutcome::new(
                Verdict::Unknown,
                vec![format!("{} lookup answered without a 'registered' field", subject)],
            ),
        },
        None => CheckOutcome::new(
            Verdict::Unknown,
            vec![format!("{} lookup inconclusive: {}", subject, probe.describe())],
        ),
    }
}

fn check_service_registration(ctx: &EvaluationContext<'_>) -> CheckOutcome {
    let workflow = match heartbeat_step_present(ctx.facts, ctx.ecosystem) {
        Ok(path) => path,
        Err(reason) => return CheckOutcome::new(Verdict::Fail, vec![reason]),
    };

    let mut outcome = registration_from_probe(
        ctx.probes.get(&DimensionKind::ServiceRegistration),
        &format!("service '{}'", ctx.repository.name()),
    );
    outcome
        .evidence
        .insert(0, format!("{} contains the registry heartbeat step", workflow));
    outcome
}

fn check_route_registration(ctx: &EvaluationContext<'_>) -> CheckOutcome {
    let Some(domain) = ctx.repository.domain.as_deref().filter(|_| ctx.repository.has_domain())
    else {
        return CheckOutcome::new(
            Verdict::NotApplicable,
            vec!["no production domain declared".to_string()],
        );
    };
    registration_from_probe(
        ctx.probes.get(&DimensionKind::RouteRegistration),
        &format!("route '{}'", domain),
    )
}

fn provision_kind(item: &serde_yaml::Value) -> Option<String> {
    match item {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Mapping(_) => item
            .get("kind")
            .or_else(|| item.get("type"))
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

fn check_trust_chain(facts: &RepoFactSheet, ecosystem: &EcosystemConfig) -> CheckOutcome {
    let Some(contents) = facts.file(CONNECT_CONFIG) else {
        return CheckOutcome::new(Verdict::Fail, vec![format!("missing {}", CONNECT_CONFIG)]);
    };
    let config = match parse_yaml_mapping(contents) {
        Ok(config) => config,
        Err(e) => {
            return CheckOutcome::new(
                Verdict::Fail,
                vec![format!("malformed {}: {}", CONNECT_CONFIG, e)],
            )
        }
    };

    let onboarding = config.get("onboarding");
    let provisions: Vec<String> = onboarding
        .and_then(|o| o.get("provisions"))
        .and_then(|p| p.as_sequence())
        .map(|items| items.iter().filter_map(provision_kind).collect())
        .unwrap_or_default();

    let mut evidence = Vec::new();
    let mut ok = true;
    for required in &ecosystem.required_provisions {
        if provisions.iter().any(|p| p == required) {
            evidence.push(format!("provisions {}", required));
        } else {
            ok = false;
            evidence.push(format!("onboarding.provisions lacks {}", required));
        }
    }

    match onboarding
        .and_then(|o| o.get("auth_provider"))
        .and_then(|v| v.as_str())
    {
        Some(provider) if provider == ecosystem.auth_provider => {
            evidence.push(format!("auth provider is {}", provider));
        }
        Some(provider) => {
            ok = false;
            evidence.push(format!(
                "auth provider is {}, expected {}",
                provider, ecosystem.auth_provider
            ));
        }
        None => {
            ok = false;
            evidence.push("onboarding.auth_provider is not declared".to_string());
        }
    }

    CheckOutcome::new(if ok { Verdict::Pass } else { Verdict::Fail }, evidence)
}

/// A reachable host that answers anything but a 2xx `{"status": "ok"}` fails;
/// only an unreachable or skipped probe is inconclusive.
fn check_health(ctx: &EvaluationContext<'_>) -> CheckOutcome {
    let Some(domain) = ctx.repository.domain.as_deref().filter(|_| ctx.repository.has_domain())
    else {
        return CheckOutcome::new(
            Verdict::NotApplicable,
            vec!["no production domain declared".to_string()],
        );
    };
    let url = ctx.ecosystem.health_url(domain);

    match ctx.probes.get(&DimensionKind::HealthEndpoint) {
        None => CheckOutcome::new(Verdict::Unknown, vec!["runtime probe was not run".to_string()]),
        Some(ProbeOutcome::Response { status, body }) => {
            if !(200..300).contains(status) {
                return CheckOutcome::new(Verdict::Fail, vec![format!("{} returned HTTP {}", url, status)]);
            }
            let reported = body
                .as_ref()
                .and_then(|b| b.as_object())
                .and_then(|b| b.get("status"))
                .and_then(|s| s.as_str());
            match reported {
                Some("ok") => CheckOutcome::new(Verdict::Pass, vec![format!("{} reports status ok", url)]),
                Some(other) => CheckOutcome::new(
                    Verdict::Fail,
                    vec![format!("{} reports status '{}'", url, other)],
                ),
                None => CheckOutcome::new(
                    Verdict::Fail,
                    vec![format!("{} did not return a JSON object with a status field", url)],
                ),
            }
        }
        Some(other) => CheckOutcome::new(
            Verdict::Unknown,
            vec![format!("{} {}", url, other.describe())],
        ),
    }
}
