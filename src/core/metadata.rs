//! Document metadata (frontmatter) validation.
//!
//! Validation reports every problem it finds as a value; it never rewrites the
//! metadata it was given.

use crate::core::canon_uri::{self, CanonError, CanonUri, Namespace, DOC_TYPES, NAMESPACES};
use crate::utils::error::{AuditError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

pub const REQUIRED_FIELDS: [&str; 6] = ["uri", "namespace", "type", "version", "status", "title"];
pub const CERTIFICATION_FIELDS: [&str; 2] = ["registered_with", "certifier"];

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .expect("semver pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleStatus {
    Draft,
    Pending,
    Certified,
    Canonical,
    Deprecated,
    Archived,
}

impl LifecycleStatus {
    pub const ALL: [LifecycleStatus; 6] = [
        LifecycleStatus::Draft,
        LifecycleStatus::Pending,
        LifecycleStatus::Certified,
        LifecycleStatus::Canonical,
        LifecycleStatus::Deprecated,
        LifecycleStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Draft => "DRAFT",
            LifecycleStatus::Pending => "PENDING",
            LifecycleStatus::Certified => "CERTIFIED",
            LifecycleStatus::Canonical => "CANONICAL",
            LifecycleStatus::Deprecated => "DEPRECATED",
            LifecycleStatus::Archived => "ARCHIVED",
        }
    }

    /// Position on the promotion track; `None` for the retirement states.
    fn rank(&self) -> Option<u8> {
        match self {
            LifecycleStatus::Draft => Some(0),
            LifecycleStatus::Pending => Some(1),
            LifecycleStatus::Certified => Some(2),
            LifecycleStatus::Canonical => Some(3),
            LifecycleStatus::Deprecated | LifecycleStatus::Archived => None,
        }
    }

    pub fn requires_certification(&self) -> bool {
        matches!(self, LifecycleStatus::Certified | LifecycleStatus::Canonical)
    }

    /// DRAFT → PENDING → CERTIFIED → CANONICAL only moves forward. DEPRECATED and
    /// ARCHIVED are reachable from anywhere; DEPRECATED may only move on to
    /// ARCHIVED, and ARCHIVED is terminal.
    pub fn can_transition_to(&self, next: LifecycleStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self.rank(), next) {
            (_, LifecycleStatus::Archived) => *self != LifecycleStatus::Archived,
            (Some(_), LifecycleStatus::Deprecated) => true,
            (Some(from), to) => to.rank().is_some_and(|to| to >= from),
            (None, _) => false,
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LifecycleStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unrecognized lifecycle status '{}'", s))
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    #[error("field '{field}' is required when status is {status}")]
    MissingConditionalField {
        field: String,
        status: LifecycleStatus,
    },

    #[error("field '{}' has value '{}', expected one of {{{}}}", .field, .value, .expected.join(", "))]
    InvalidEnum {
        field: String,
        value: String,
        expected: Vec<String>,
    },

    #[error("version '{value}' is not a valid semantic version")]
    InvalidSemver { value: String },

    #[error(transparent)]
    InvalidUri(#[from] CanonError),

    #[error("status cannot move from {from} to {to}")]
    LifecycleViolation {
        from: LifecycleStatus,
        to: LifecycleStatus,
    },
}

pub fn is_semver(value: &str) -> bool {
    SEMVER_RE.is_match(value)
}

fn field<'a>(fields: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn expected(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn validate_metadata(
    fields: &BTreeMap<String, String>,
    previous_status: Option<LifecycleStatus>,
) -> Vec<MetadataError> {
    let mut errors = Vec::new();

    for name in REQUIRED_FIELDS {
        if field(fields, name).is_none() {
            errors.push(MetadataError::MissingField {
                field: name.to_string(),
            });
        }
    }

    let uri = field(fields, "uri").and_then(|raw| match canon_uri::validate(raw) {
        Ok(uri) => Some(uri),
        Err(e) => {
            errors.push(MetadataError::InvalidUri(e));
            None
        }
    });

    if let Some(namespace) = field(fields, "namespace") {
        match Namespace::parse(namespace) {
            None => errors.push(MetadataError::InvalidEnum {
                field: "namespace".to_string(),
                value: namespace.to_string(),
                expected: expected(&NAMESPACES),
            }),
            Some(ns) => {
                if let Some(uri) = &uri {
                    if uri.namespace() != ns {
                        errors.push(MetadataError::InvalidEnum {
                            field: "namespace".to_string(),
                            value: namespace.to_string(),
                            expected: vec![uri.namespace().to_string()],
                        });
                    }
                }
            }
        }
    }

    if let Some(doc_type) = field(fields, "type") {
        if !DOC_TYPES.contains(&doc_type) {
            errors.push(MetadataError::InvalidEnum {
                field: "type".to_string(),
                value: doc_type.to_string(),
                expected: expected(&DOC_TYPES),
            });
        } else if let Some((_, uri_type, _)) = uri.as_ref().and_then(|u| u.doc_parts()) {
            if uri_type != doc_type {
                errors.push(MetadataError::InvalidEnum {
                    field: "type".to_string(),
                    value: doc_type.to_string(),
                    expected: vec![uri_type.to_string()],
                });
            }
        }
    }

    if let Some(version) = field(fields, "version") {
        if !is_semver(version) {
            errors.push(MetadataError::InvalidSemver {
                value: version.to_string(),
            });
        }
    }

    if let Some(raw_status) = field(fields, "status") {
        match raw_status.parse::<LifecycleStatus>() {
            Err(_) => errors.push(MetadataError::InvalidEnum {
                field: "status".to_string(),
                value: raw_status.to_string(),
                expected: LifecycleStatus::ALL
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            }),
            Ok(status) => {
                if status.requires_certification() {
                    for name in CERTIFICATION_FIELDS {
                        if field(fields, name).is_none() {
                            errors.push(MetadataError::MissingConditionalField {
                                field: name.to_string(),
                                status,
                            });
                        }
                    }
                }
                if let Some(previous) = previous_status {
                    if !previous.can_transition_to(status) {
                        errors.push(MetadataError::LifecycleViolation {
                            from: previous,
                            to: status,
                        });
                    }
                }
            }
        }
    }

    errors
}

/// Typed view of metadata that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub uri: CanonUri,
    pub namespace: Namespace,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub version: String,
    pub status: LifecycleStatus,
    pub title: String,
    pub registered_with: Option<String>,
    pub certifier: Option<String>,
}

impl DocumentMetadata {
    pub fn from_fields(
        fields: &BTreeMap<String, String>,
        previous_status: Option<LifecycleStatus>,
    ) -> std::result::Result<Self, Vec<MetadataError>> {
        let errors = validate_metadata(fields, previous_status);
        if !errors.is_empty() {
            return Err(errors);
        }

        // Validation guarantees every required field parses below.
        let get = |name: &str| field(fields, name).unwrap_or_default().to_string();
        let uri = canon_uri::validate(&get("uri")).map_err(|e| vec![MetadataError::from(e)])?;
        let status = get("status").parse::<LifecycleStatus>().map_err(|_| {
            vec![MetadataError::MissingField {
                field: "status".to_string(),
            }]
        })?;

        Ok(Self {
            namespace: uri.namespace(),
            uri,
            doc_type: get("type"),
            version: get("version"),
            status,
            title: get("title"),
            registered_with: field(fields, "registered_with").map(str::to_string),
            certifier: field(fields, "certifier").map(str::to_string),
        })
    }
}

/// Extracts a leading `---` delimited YAML block. Documents without one yield an
/// empty map.
pub fn parse_frontmatter(text: &str) -> Result<BTreeMap<String, String>> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.lines();
    if lines.next().map(str::trim_end) != Some("---") {
        return Ok(BTreeMap::new());
    }

    let mut block = Vec::new();
    let mut closed = false;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            closed = true;
            break;
        }
        block.push(line);
    }
    if !closed {
        return Err(AuditError::ValidationError {
            message: "frontmatter block is not closed with '---'".to_string(),
        });
    }

    let value: serde_yaml::Value = serde_yaml::from_str(&block.join("\n"))?;
    let mapping = match value {
        serde_yaml::Value::Mapping(mapping) => mapping,
        serde_yaml::Value::Null => return Ok(BTreeMap::new()),
        _ => {
            return Err(AuditError::ValidationError {
                message: "frontmatter must be a YAML mapping".to_string(),
            })
        }
    };

    let mut fields = BTreeMap::new();
    for (key, value) in mapping {
        let Some(key) = scalar_to_string(&key) else {
            continue;
        };
        let value = match scalar_to_string(&value) {
            Some(v) => v,
            None => serde_yaml::to_string(&value)?.trim().to_string(),
        };
        fields.insert(key, value);
    }
    Ok(fields)
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn valid_draft() -> BTreeMap<String, String> {
        fields(&[
            ("uri", "chitty://docs/tech/architecture/chittyid"),
            ("namespace", "docs"),
            ("type", "architecture"),
            ("version", "1.2.0"),
            ("status", "DRAFT"),
            ("title", "ChittyID Architecture"),
        ])
    }

    #[test]
    fn test_valid_draft_has_no_errors() {
        assert!(validate_metadata(&valid_draft(), None).is_empty());
        let typed = DocumentMetadata::from_fields(&valid_draft(), None).unwrap();
        assert_eq!(typed.status, LifecycleStatus::Draft);
        assert_eq!(typed.namespace, Namespace::Docs);
    }

    #[test]
    fn test_missing_fields_are_listed_individually() {
        let errors = validate_metadata(&fields(&[("title", "x")]), None);
        let missing: Vec<_> = errors
            .iter()
            .filter_map(|e| match e {
                MetadataError::MissingField { field } => Some(field.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["uri", "namespace", "type", "version", "status"]);
    }

    #[test]
    fn test_certified_requires_conditional_fields() {
        let mut meta = valid_draft();
        meta.insert("status".to_string(), "CERTIFIED".to_string());
        let errors = validate_metadata(&meta, None);
        assert_eq!(
            errors,
            vec![
                MetadataError::MissingConditionalField {
                    field: "registered_with".to_string(),
                    status: LifecycleStatus::Certified,
                },
                MetadataError::MissingConditionalField {
                    field: "certifier".to_string(),
                    status: LifecycleStatus::Certified,
                },
            ]
        );

        meta.insert("registered_with".to_string(), "chittyregistry".to_string());
        meta.insert("certifier".to_string(), "chittycert".to_string());
        assert!(validate_metadata(&meta, None).is_empty());
    }

    #[test]
    fn test_invalid_enum_and_semver() {
        let mut meta = valid_draft();
        meta.insert("status".to_string(), "FINAL".to_string());
        meta.insert("version".to_string(), "1.2".to_string());
        let errors = validate_metadata(&meta, None);
        assert!(errors.contains(&MetadataError::InvalidSemver {
            value: "1.2".to_string()
        }));
        assert!(errors.iter().any(|e| matches!(
            e,
            MetadataError::InvalidEnum { field, .. } if field == "status"
        )));
    }

    #[test]
    fn test_namespace_must_agree_with_uri() {
        let mut meta = valid_draft();
        meta.insert("namespace".to_string(), "core".to_string());
        let errors = validate_metadata(&meta, None);
        assert_eq!(
            errors,
            vec![MetadataError::InvalidEnum {
                field: "namespace".to_string(),
                value: "core".to_string(),
                expected: vec!["docs".to_string()],
            }]
        );
    }

    #[test]
    fn test_invalid_uri_is_surfaced() {
        let mut meta = valid_draft();
        meta.insert("uri".to_string(), "chitty://docs/space/spec/x".to_string());
        let errors = validate_metadata(&meta, None);
        assert!(matches!(errors[0], MetadataError::InvalidUri(_)));
    }

    #[test]
    fn test_lifecycle_transitions() {
        use LifecycleStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Canonical));
        assert!(Canonical.can_transition_to(Deprecated));
        assert!(Draft.can_transition_to(Archived));
        assert!(Deprecated.can_transition_to(Archived));
        assert!(!Canonical.can_transition_to(Draft));
        assert!(!Certified.can_transition_to(Pending));
        assert!(!Deprecated.can_transition_to(Canonical));
        assert!(!Archived.can_transition_to(Draft));
    }

    #[test]
    fn test_downgrade_is_flagged_not_corrected() {
        let meta = valid_draft();
        let errors = validate_metadata(&meta, Some(LifecycleStatus::Canonical));
        assert_eq!(
            errors,
            vec![MetadataError::LifecycleViolation {
                from: LifecycleStatus::Canonical,
                to: LifecycleStatus::Draft,
            }]
        );
        assert_eq!(meta.get("status").unwrap(), "DRAFT");
    }

    #[test]
    fn test_semver_forms() {
        assert!(is_semver("0.1.0"));
        assert!(is_semver("1.0.0-rc.1+build.5"));
        assert!(!is_semver("01.0.0"));
        assert!(!is_semver("v1.0.0"));
    }

    #[test]
    fn test_parse_frontmatter() {
        let doc = "---\nuri: chitty://core/identity\nversion: 1.0.0\ntitle: Identity\ntags: [a, b]\n---\n# Identity\n";
        let parsed = parse_frontmatter(doc).unwrap();
        assert_eq!(parsed.get("uri").unwrap(), "chitty://core/identity");
        assert_eq!(parsed.get("version").unwrap(), "1.0.0");
        assert!(parsed.contains_key("tags"));

        assert!(parse_frontmatter("# No frontmatter").unwrap().is_empty());
        assert!(parse_frontmatter("---\ntitle: open\n").is_err());
    }
}
