use crate::core::audit::{
    AuditSettings, DEFAULT_CONCURRENCY, DEFAULT_DEADLINE_SECONDS, DEFAULT_PROBE_TIMEOUT_SECONDS,
};
use crate::core::catalog::DimensionCatalog;
use crate::core::profile::{ProfileMatrix, ProfileResolver};
use crate::domain::ecosystem::EcosystemConfig;
use crate::domain::model::{Applicability, DimensionKind, Repository, ServiceType};
use crate::utils::error::{AuditError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "canon-audit.toml";
pub const MAX_PROBE_TIMEOUT_SECONDS: u64 = 300;
pub const MAX_TIER: u8 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub audit: AuditSection,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub facts: FactsConfig,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    /// `[profile.<service-type>]` rows replacing the built-in matrix rows.
    #[serde(default)]
    pub profile: BTreeMap<String, BTreeMap<String, Applicability>>,
    pub bundles: Option<BundlesConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSection {
    pub name: Option<String>,
    pub catalog_version: Option<String>,
    pub matrix_version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub registry_url: Option<String>,
    pub router_url: Option<String>,
    pub probe_timeout_seconds: Option<u64>,
    pub deadline_seconds: Option<u64>,
    pub concurrency: Option<usize>,
    pub registry_heartbeat_marker: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    pub required_provisions: Option<Vec<String>>,
    pub auth_provider: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactsConfig {
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlesConfig {
    /// Path of the export YAML.
    pub config: String,
}

impl AuditConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(AuditError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| AuditError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| AuditError::ConfigError {
            message: format!("environment pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn ecosystem(&self) -> EcosystemConfig {
        let defaults = EcosystemConfig::default();
        EcosystemConfig {
            registry_url: self.runtime.registry_url.clone().unwrap_or(defaults.registry_url),
            router_url: self.runtime.router_url.clone().unwrap_or(defaults.router_url),
            registry_heartbeat_marker: self
                .runtime
                .registry_heartbeat_marker
                .clone()
                .unwrap_or(defaults.registry_heartbeat_marker),
            required_provisions: self
                .trust
                .required_provisions
                .clone()
                .unwrap_or(defaults.required_provisions),
            auth_provider: self.trust.auth_provider.clone().unwrap_or(defaults.auth_provider),
        }
    }

    pub fn audit_settings(&self) -> AuditSettings {
        AuditSettings {
            concurrency: self.runtime.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            probe_timeout: Duration::from_secs(
                self.runtime
                    .probe_timeout_seconds
                    .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECONDS),
            ),
            deadline: Duration::from_secs(
                self.runtime.deadline_seconds.unwrap_or(DEFAULT_DEADLINE_SECONDS),
            ),
            skip_runtime: false,
        }
    }

    fn profile_overrides(&self) -> Result<BTreeMap<ServiceType, BTreeMap<DimensionKind, Applicability>>> {
        self.profile
            .iter()
            .map(|(service, row)| {
                let service_type = service.parse::<ServiceType>().map_err(|reason| {
                    AuditError::InvalidConfigValueError {
                        field: "profile".to_string(),
                        value: service.clone(),
                        reason,
                    }
                })?;
                let row = row
                    .iter()
                    .map(|(dimension, applicability)| {
                        dimension
                            .parse::<DimensionKind>()
                            .map(|kind| (kind, *applicability))
                            .map_err(|reason| AuditError::InvalidConfigValueError {
                                field: format!("profile.{}", service),
                                value: dimension.clone(),
                                reason,
                            })
                    })
                    .collect::<Result<BTreeMap<_, _>>>()?;
                Ok((service_type, row))
            })
            .collect()
    }

    /// Built-in matrix with any configured rows applied, re-checked for completeness.
    pub fn profile_matrix(&self) -> Result<ProfileMatrix> {
        let builtin = ProfileMatrix::builtin();
        let overrides = self.profile_overrides()?;
        if overrides.is_empty() && self.audit.matrix_version.is_none() {
            return Ok(builtin);
        }
        let version = self
            .audit
            .matrix_version
            .clone()
            .unwrap_or_else(|| ProfileMatrix::VERSION.to_string());
        builtin.with_overrides(version, &overrides)
    }

    pub fn resolver(&self) -> Result<ProfileResolver> {
        Ok(ProfileResolver::new(
            DimensionCatalog::builtin(),
            self.profile_matrix()?,
            self.ecosystem(),
        ))
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(version) = &self.audit.catalog_version {
            if version != DimensionCatalog::VERSION {
                return Err(AuditError::InvalidConfigValueError {
                    field: "audit.catalog_version".to_string(),
                    value: version.clone(),
                    reason: format!("This build ships catalog {}", DimensionCatalog::VERSION),
                });
            }
        }

        if let Some(url) = &self.runtime.registry_url {
            validation::validate_url("runtime.registry_url", url)?;
        }
        if let Some(url) = &self.runtime.router_url {
            validation::validate_url("runtime.router_url", url)?;
        }
        if let Some(timeout) = self.runtime.probe_timeout_seconds {
            validation::validate_range(
                "runtime.probe_timeout_seconds",
                timeout,
                1,
                MAX_PROBE_TIMEOUT_SECONDS,
            )?;
        }
        if let Some(deadline) = self.runtime.deadline_seconds {
            validation::validate_positive_number("runtime.deadline_seconds", deadline as usize, 1)?;
        }
        if let Some(concurrency) = self.runtime.concurrency {
            validation::validate_positive_number("runtime.concurrency", concurrency, 1)?;
        }
        if let Some(marker) = &self.runtime.registry_heartbeat_marker {
            validation::validate_non_empty_string("runtime.registry_heartbeat_marker", marker)?;
        }
        if let Some(provider) = &self.trust.auth_provider {
            validation::validate_non_empty_string("trust.auth_provider", provider)?;
        }
        if let Some(directory) = &self.facts.directory {
            validation::validate_path("facts.directory", directory)?;
        }
        if let Some(bundles) = &self.bundles {
            validation::validate_path("bundles.config", &bundles.config)?;
        }

        let mut seen = HashSet::new();
        for repository in &self.repositories {
            validation::validate_repository_id("repositories.id", &repository.id)?;
            validation::validate_range("repositories.tier", repository.tier, 0, MAX_TIER)?;
            if !seen.insert(repository.id.as_str()) {
                return Err(AuditError::InvalidConfigValueError {
                    field: "repositories.id".to_string(),
                    value: repository.id.clone(),
                    reason: "Repository is declared more than once".to_string(),
                });
            }
        }

        self.profile_matrix()?;
        Ok(())
    }
}

impl Validate for AuditConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
