use crate::utils::error::{AuditError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AuditError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// Repository identifiers are `org/name` with both parts non-empty.
pub fn validate_repository_id(field_name: &str, id: &str) -> Result<()> {
    let mut parts = id.split('/');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(org), Some(name), None) if !org.trim().is_empty() && !name.trim().is_empty()
    );
    if !valid {
        return Err(AuditError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: id.to_string(),
            reason: "Repository id must have the form org/name".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("runtime.registry_url", "https://registry.example.com").is_ok());
        assert!(validate_url("runtime.registry_url", "http://localhost:8080").is_ok());
        assert!(validate_url("runtime.registry_url", "").is_err());
        assert!(validate_url("runtime.registry_url", "invalid-url").is_err());
        assert!(validate_url("runtime.registry_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("runtime.concurrency", 5, 1).is_ok());
        assert!(validate_positive_number("runtime.concurrency", 0, 1).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("repositories.tier", 3u8, 0, 5).is_ok());
        assert!(validate_range("repositories.tier", 6u8, 0, 5).is_err());
    }

    #[test]
    fn test_validate_repository_id() {
        assert!(validate_repository_id("id", "chittyos/chittyid").is_ok());
        assert!(validate_repository_id("id", "chittyid").is_err());
        assert!(validate_repository_id("id", "chittyos/").is_err());
        assert!(validate_repository_id("id", "a/b/c").is_err());
    }
}
