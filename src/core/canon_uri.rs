//! Canon URIs: `chitty://{namespace}/{path...}`.
//!
//! Namespace and every path segment match `[a-z][a-z0-9-]*`. The `docs`
//! namespace has a fixed shape, `docs/{domain}/{type}/{identifier}`. Errors name
//! the exact segment that failed and what was expected there, so remediation text
//! can point at it directly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

pub const CANON_SCHEME: &str = "chitty";
pub const NAMESPACES: [&str; 5] = ["core", "docs", "legal", "gov", "rel"];
pub const DOC_DOMAINS: [&str; 5] = ["tech", "legal", "ops", "exec", "gov"];
pub const DOC_TYPES: [&str; 7] = [
    "registry",
    "architecture",
    "spec",
    "policy",
    "catalog",
    "summary",
    "procedure",
];

const SEGMENT_PATTERN: &str = "[a-z][a-z0-9-]*";

static SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("segment pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Core,
    Docs,
    Legal,
    Gov,
    Rel,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Core => "core",
            Namespace::Docs => "docs",
            Namespace::Legal => "legal",
            Namespace::Gov => "gov",
            Namespace::Rel => "rel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "core" => Some(Namespace::Core),
            "docs" => Some(Namespace::Docs),
            "legal" => Some(Namespace::Legal),
            "gov" => Some(Namespace::Gov),
            "rel" => Some(Namespace::Rel),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UriSegment {
    Scheme,
    Namespace,
    Path(usize),
    Domain,
    DocType,
    Identifier,
}

impl fmt::Display for UriSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UriSegment::Scheme => f.write_str("scheme"),
            UriSegment::Namespace => f.write_str("namespace"),
            UriSegment::Path(index) => write!(f, "path[{}]", index),
            UriSegment::Domain => f.write_str("domain"),
            UriSegment::DocType => f.write_str("type"),
            UriSegment::Identifier => f.write_str("identifier"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonError {
    #[error("invalid canon URI '{input}': {segment} is '{found}', expected {expected}")]
    InvalidUri {
        input: String,
        segment: UriSegment,
        found: String,
        expected: String,
    },
}

impl CanonError {
    pub fn segment(&self) -> &UriSegment {
        match self {
            CanonError::InvalidUri { segment, .. } => segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonUri {
    namespace: Namespace,
    segments: Vec<String>,
}

impl CanonUri {
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `(domain, type, identifier)` for `docs` URIs.
    pub fn doc_parts(&self) -> Option<(&str, &str, &str)> {
        match (self.namespace, self.segments.as_slice()) {
            (Namespace::Docs, [domain, doc_type, identifier]) => {
                Some((domain.as_str(), doc_type.as_str(), identifier.as_str()))
            }
            _ => None,
        }
    }
}

fn one_of(set: &[&str]) -> String {
    format!("one of {{{}}}", set.join(", "))
}

pub fn validate(input: &str) -> Result<CanonUri, CanonError> {
    let invalid = |segment: UriSegment, found: &str, expected: String| CanonError::InvalidUri {
        input: input.to_string(),
        segment,
        found: found.to_string(),
        expected,
    };

    let (scheme, rest) = input
        .split_once("://")
        .ok_or_else(|| invalid(UriSegment::Scheme, input, format!("'{}://'", CANON_SCHEME)))?;
    if scheme != CANON_SCHEME {
        return Err(invalid(UriSegment::Scheme, scheme, format!("'{}'", CANON_SCHEME)));
    }

    let mut parts = rest.split('/');
    let namespace_raw = parts.next().unwrap_or_default();
    let namespace = Namespace::parse(namespace_raw)
        .ok_or_else(|| invalid(UriSegment::Namespace, namespace_raw, one_of(&NAMESPACES)))?;

    let segments: Vec<&str> = parts.collect();
    if segments.is_empty() {
        return Err(invalid(
            UriSegment::Path(0),
            "",
            "at least one path segment".to_string(),
        ));
    }

    if namespace == Namespace::Docs {
        validate_docs_path(&segments, &invalid)?;
    }

    for (index, segment) in segments.iter().enumerate() {
        if !SEGMENT_RE.is_match(segment) {
            let which = match (namespace, index) {
                (Namespace::Docs, 2) => UriSegment::Identifier,
                _ => UriSegment::Path(index),
            };
            return Err(invalid(which, segment, format!("a segment matching {}", SEGMENT_PATTERN)));
        }
    }

    Ok(CanonUri {
        namespace,
        segments: segments.into_iter().map(str::to_string).collect(),
    })
}

fn validate_docs_path(
    segments: &[&str],
    invalid: &impl Fn(UriSegment, &str, String) -> CanonError,
) -> Result<(), CanonError> {
    let domain = segments.first().copied().unwrap_or_default();
    if !DOC_DOMAINS.contains(&domain) {
        return Err(invalid(UriSegment::Domain, domain, one_of(&DOC_DOMAINS)));
    }

    let doc_type = segments.get(1).copied().unwrap_or_default();
    if !DOC_TYPES.contains(&doc_type) {
        return Err(invalid(UriSegment::DocType, doc_type, one_of(&DOC_TYPES)));
    }

    match segments.get(2) {
        None => Err(invalid(
            UriSegment::Identifier,
            "",
            format!("a segment matching {}", SEGMENT_PATTERN),
        )),
        Some(_) if segments.len() > 3 => Err(invalid(
            UriSegment::Path(3),
            segments[3],
            "no further segments after docs/{domain}/{type}/{identifier}".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

impl fmt::Display for CanonUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}/{}",
            CANON_SCHEME,
            self.namespace,
            self.segments.join("/")
        )
    }
}

impl FromStr for CanonUri {
    type Err = CanonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

impl Serialize for CanonUri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CanonUri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        validate(&raw).map_err(serde::de::Error::custom)
    }
}
