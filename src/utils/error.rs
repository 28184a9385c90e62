use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Unknown service type {declared:?} for repository {repository}")]
    UnknownServiceType {
        repository: String,
        declared: Option<String>,
    },

    #[error("Fact sheet unavailable for {repository}: {reason}")]
    FactSheetUnavailable { repository: String, reason: String },

    #[error("Profile matrix is incomplete, missing: {}", .missing.join(", "))]
    IncompleteProfileMatrix { missing: Vec<String> },

    #[error("Conflict resolution error: {0}")]
    ConflictError(#[from] crate::core::conflict::ConflictError),

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Configuration,
    Profile,
    Conflict,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AuditError::HttpError(_) => ErrorCategory::Network,
            AuditError::IoError(_) => ErrorCategory::Io,
            AuditError::CsvError(_)
            | AuditError::SerializationError(_)
            | AuditError::YamlError(_)
            | AuditError::FactSheetUnavailable { .. } => ErrorCategory::Data,
            AuditError::ConfigError { .. }
            | AuditError::ConfigValidationError { .. }
            | AuditError::InvalidConfigValueError { .. }
            | AuditError::MissingConfigError { .. } => ErrorCategory::Configuration,
            AuditError::UnknownServiceType { .. } | AuditError::IncompleteProfileMatrix { .. } => {
                ErrorCategory::Profile
            }
            AuditError::ConflictError(_) => ErrorCategory::Conflict,
            AuditError::ValidationError { .. } => ErrorCategory::Validation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AuditError::HttpError(_) | AuditError::FactSheetUnavailable { .. } => {
                ErrorSeverity::Medium
            }
            AuditError::ConflictError(_) | AuditError::ValidationError { .. } => ErrorSeverity::High,
            AuditError::UnknownServiceType { .. } => ErrorSeverity::High,
            AuditError::CsvError(_)
            | AuditError::SerializationError(_)
            | AuditError::YamlError(_) => ErrorSeverity::High,
            AuditError::IoError(_)
            | AuditError::ConfigError { .. }
            | AuditError::ConfigValidationError { .. }
            | AuditError::InvalidConfigValueError { .. }
            | AuditError::MissingConfigError { .. }
            | AuditError::IncompleteProfileMatrix { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            AuditError::HttpError(_) => {
                "Check network connectivity or rerun with --skip-runtime".to_string()
            }
            AuditError::IoError(_) => "Check that the path exists and is readable".to_string(),
            AuditError::CsvError(_) => "Re-export the bundle to regenerate its CSV files".to_string(),
            AuditError::SerializationError(_) | AuditError::YamlError(_) => {
                "Fix the syntax of the input document".to_string()
            }
            AuditError::ConfigError { .. }
            | AuditError::ConfigValidationError { .. }
            | AuditError::InvalidConfigValueError { .. } => {
                "Review the configuration file against the documented keys".to_string()
            }
            AuditError::MissingConfigError { field } => {
                format!("Add '{}' to the configuration file", field)
            }
            AuditError::UnknownServiceType { .. } => format!(
                "Declare service_type as one of: {}",
                crate::domain::model::ServiceType::ALL
                    .iter()
                    .map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            AuditError::FactSheetUnavailable { .. } => {
                "Regenerate the repository fact sheet and rerun the audit".to_string()
            }
            AuditError::IncompleteProfileMatrix { .. } => {
                "Define every dimension for every service type in [profile]".to_string()
            }
            AuditError::ConflictError(_) => {
                "Resolve the remaining conflict regions by hand".to_string()
            }
            AuditError::ValidationError { .. } => "Correct the reported fields".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Io => format!("File access problem: {}", self),
            ErrorCategory::Data => format!("Input data problem: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Profile => format!("Compliance profile problem: {}", self),
            ErrorCategory::Conflict => format!("Merge conflict problem: {}", self),
            ErrorCategory::Validation => format!("Validation problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
